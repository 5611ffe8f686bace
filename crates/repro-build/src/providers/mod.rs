//! Binary providers
//!
//! A provider turns a testcase and its job definition into a directory holding
//! the binary to run. [`DownloadedBinary`] unpacks the prebuilt archive
//! attached to the testcase; [`SourceBuilder`] checks out the testcase's
//! commit and builds it with the job's [`Recipe`].

mod downloaded;
pub mod recipe;
mod source;

pub use downloaded::{gsutil_url, DownloadedBinary};
pub use recipe::Recipe;
pub use source::SourceBuilder;

use crate::checkout::Confirmer;
use crate::command::CommandRunner;
use crate::error::{BuildError, BuildResult};
use crate::gn_args::ArgsEditor;
use crate::options::{BuildMode, BuildOptions};
use crate::revision::Fetcher;
use crate::testcase::Testcase;
use repro_config::{Definition, ReproDirs};
use std::path::PathBuf;
use std::sync::Arc;

/// External collaborators a provider drives
#[derive(Clone)]
pub struct Services {
    pub runner: Arc<dyn CommandRunner>,
    pub fetcher: Arc<dyn Fetcher>,
    pub confirmer: Arc<dyn Confirmer>,
    pub editor: Arc<dyn ArgsEditor>,
}

impl Services {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        fetcher: Arc<dyn Fetcher>,
        confirmer: Arc<dyn Confirmer>,
        editor: Arc<dyn ArgsEditor>,
    ) -> Self {
        Self {
            runner,
            fetcher,
            confirmer,
            editor,
        }
    }
}

/// Produces the binary for one reproduction attempt
pub trait BinaryProvider {
    /// Directory holding the binary; downloads or builds on first call
    fn build_directory(&mut self) -> BuildResult<PathBuf>;

    fn binary_name(&self) -> &str;

    fn binary_path(&mut self) -> BuildResult<PathBuf> {
        let dir = self.build_directory()?;
        Ok(dir.join(self.binary_name()))
    }
}

/// Binary name from the definition, else from the testcase's stack trace
pub fn resolve_binary_name(definition: &Definition, testcase: &Testcase) -> BuildResult<String> {
    definition
        .configured_binary_name()
        .map(str::to_string)
        .or_else(|| testcase.binary_name_from_stacktrace())
        .ok_or(BuildError::MinimizationNotFinished)
}

/// Provider selected for the build mode
pub enum Provider {
    Downloaded(DownloadedBinary),
    Source(Box<SourceBuilder>),
}

impl Provider {
    /// Pick the provider for `options.mode`
    pub fn select(
        testcase: &Testcase,
        definition: &Definition,
        options: &BuildOptions,
        dirs: &ReproDirs,
        services: &Services,
    ) -> BuildResult<Self> {
        let binary_name = resolve_binary_name(definition, testcase)?;
        match options.mode {
            BuildMode::Download => {
                let url = testcase.build_url().ok_or_else(|| {
                    BuildError::artifact(
                        format!("testcase {}", testcase.id),
                        "it has no prebuilt build to download",
                    )
                })?;
                Ok(Self::Downloaded(DownloadedBinary::new(
                    testcase.id,
                    url,
                    binary_name,
                    dirs.clone(),
                    services.runner.clone(),
                )))
            }
            BuildMode::Source => Ok(Self::Source(Box::new(SourceBuilder::new(
                testcase.clone(),
                definition.clone(),
                binary_name,
                options.clone(),
                dirs.clone(),
                services.clone(),
            )))),
        }
    }

    fn inner(&mut self) -> &mut dyn BinaryProvider {
        match self {
            Self::Downloaded(provider) => provider,
            Self::Source(provider) => provider.as_mut(),
        }
    }
}

impl BinaryProvider for Provider {
    fn build_directory(&mut self) -> BuildResult<PathBuf> {
        self.inner().build_directory()
    }

    fn binary_name(&self) -> &str {
        match self {
            Self::Downloaded(provider) => provider.binary_name(),
            Self::Source(provider) => provider.binary_name(),
        }
    }
}
