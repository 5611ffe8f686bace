use super::BinaryProvider;
use crate::archive;
use crate::command::{CommandRunner, CommandSpec};
use crate::error::{BuildError, BuildResult};
use repro_config::ReproDirs;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Browser-facing object storage prefix gsutil cannot read
const STORAGE_WEB_PREFIX: &str = "https://storage.cloud.google.com/";

/// `gs://` form of an object-storage URL
pub fn gsutil_url(build_url: &str) -> String {
    match build_url.strip_prefix(STORAGE_WEB_PREFIX) {
        Some(path) => format!("gs://{}", path),
        None => build_url.to_string(),
    }
}

/// A prebuilt binary fetched from object storage
pub struct DownloadedBinary {
    testcase_id: u64,
    build_url: String,
    binary_name: String,
    dirs: ReproDirs,
    runner: Arc<dyn CommandRunner>,
    build_directory: Option<PathBuf>,
}

impl DownloadedBinary {
    pub fn new(
        testcase_id: u64,
        build_url: impl Into<String>,
        binary_name: impl Into<String>,
        dirs: ReproDirs,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            testcase_id,
            build_url: build_url.into(),
            binary_name: binary_name.into(),
            dirs,
            runner,
            build_directory: None,
        }
    }

    /// `<builds>/<id>_build`
    pub fn build_dir_name(&self) -> PathBuf {
        self.dirs.testcase_build_dir(self.testcase_id)
    }

    /// Download and unpack the archive unless it is already unpacked
    pub fn download_build_data(&self) -> BuildResult<PathBuf> {
        let build_dir = self.build_dir_name();
        if build_dir.exists() {
            debug!(dir = %build_dir.display(), "using cached build");
            return Ok(build_dir);
        }

        info!(url = self.build_url.as_str(), "downloading build data");
        for dir in [&self.dirs.cache_dir, &self.dirs.builds_dir] {
            fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;
        }

        let remote = gsutil_url(&self.build_url);
        let filename = remote
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| BuildError::artifact(&self.build_url, "URL has no file name"))?
            .to_string();
        let copy = CommandSpec::new("gsutil", &self.dirs.cache_dir).args(["cp", remote.as_str(), "."]);
        self.runner.run(&copy)?;

        let saved = self.dirs.cache_dir.join(&filename);
        if !saved.is_file() {
            return Err(BuildError::artifact(
                &self.build_url,
                format!("{} was not downloaded", saved.display()),
            ));
        }
        let top_level = archive::extract_zip(&saved, &self.dirs.builds_dir)?;

        info!("cleaning up");
        fs::remove_file(&saved).map_err(|e| BuildError::io(&saved, e))?;
        let extracted = archive::extracted_root(&saved, &self.dirs.builds_dir, &top_level)
            .ok_or_else(|| {
                BuildError::artifact(&self.build_url, "archive has no single top-level directory")
            })?;

        // An existing <id>_build counts as a complete cache, so only a tree
        // holding the binary may be moved into place.
        if let Err(err) = self.prepare_binary(&extracted) {
            let _ = fs::remove_dir_all(&extracted);
            return Err(err);
        }
        fs::rename(&extracted, &build_dir).map_err(|e| BuildError::io(&extracted, e))?;
        Ok(build_dir)
    }

    fn prepare_binary(&self, extracted: &Path) -> BuildResult<()> {
        let binary = extracted.join(&self.binary_name);
        if !binary.is_file() {
            return Err(BuildError::artifact(
                &self.build_url,
                format!("archive has no {}", self.binary_name),
            ));
        }
        archive::make_executable(&binary)
    }
}

impl BinaryProvider for DownloadedBinary {
    fn build_directory(&mut self) -> BuildResult<PathBuf> {
        if let Some(dir) = &self.build_directory {
            return Ok(dir.clone());
        }
        let dir = self.download_build_data()?;
        self.build_directory = Some(dir.clone());
        Ok(dir)
    }

    fn binary_name(&self) -> &str {
        &self.binary_name
    }
}
