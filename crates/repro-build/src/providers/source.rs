use super::recipe::{Recipe, StepContext};
use super::{BinaryProvider, DownloadedBinary, Services};
use crate::checkout::{self, CheckoutState};
use crate::cleaner::ThirdPartyCleaner;
use crate::command::CommandSpec;
use crate::error::{BuildError, BuildResult};
use crate::gn_args::{self, GnArgs, GnArgsComposer, ARGS_GN_FILENAME};
use crate::goma::GomaPolicy;
use crate::options::BuildOptions;
use crate::testcase::Testcase;
use crate::transform::Transform;
use repro_config::{Definition, ReproDirs};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Builds a binary from the local checkout of a project.
///
/// Resolved values (commit, source and build directories, gn args) are
/// computed on first use and kept for the life of the builder.
pub struct SourceBuilder {
    testcase: Testcase,
    definition: Definition,
    options: BuildOptions,
    dirs: ReproDirs,
    services: Services,
    recipe: Recipe,
    binary_name: String,
    target: String,
    git_sha: Option<String>,
    source_directory: Option<PathBuf>,
    build_directory: Option<PathBuf>,
    gn_args: Option<GnArgs>,
    built: bool,
}

impl SourceBuilder {
    pub fn new(
        testcase: Testcase,
        definition: Definition,
        binary_name: impl Into<String>,
        options: BuildOptions,
        dirs: ReproDirs,
        services: Services,
    ) -> Self {
        let binary_name = binary_name.into();
        let target = definition
            .target
            .clone()
            .unwrap_or_else(|| binary_name.clone());
        let recipe = Recipe::for_definition(&definition);
        Self {
            testcase,
            definition,
            options,
            dirs,
            services,
            recipe,
            binary_name,
            target,
            git_sha: None,
            source_directory: None,
            build_directory: None,
            gn_args: None,
            built: false,
        }
    }

    /// Use `dir` instead of reading the definition's source variable
    pub fn with_source_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_directory = Some(dir.into());
        self
    }

    /// Build into `dir` instead of `out/clusterfuzz_<id>`
    pub fn with_build_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_directory = Some(dir.into());
        self
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Commit the testcase revision resolves to
    pub fn git_sha(&mut self) -> BuildResult<String> {
        if let Some(sha) = &self.git_sha {
            return Ok(sha.clone());
        }
        let sha = self
            .recipe
            .revision
            .resolve(self.services.fetcher.as_ref(), self.testcase.revision)?;
        info!(revision = self.testcase.revision, sha = sha.as_str(), "resolved revision");
        self.git_sha = Some(sha.clone());
        Ok(sha)
    }

    /// Checkout named by the definition's source variable
    pub fn source_directory(&mut self) -> BuildResult<PathBuf> {
        if let Some(dir) = &self.source_directory {
            return Ok(dir.clone());
        }
        let var = &self.definition.source_var;
        let dir = env::var_os(var)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| BuildError::MissingSourceDirectory { var: var.clone() })?;
        self.source_directory = Some(dir.clone());
        Ok(dir)
    }

    /// `<source>/out/clusterfuzz_<testcase id>`
    pub fn out_dir_name(&mut self) -> BuildResult<PathBuf> {
        if let Some(dir) = &self.build_directory {
            return Ok(dir.clone());
        }
        let id = self.options.testcase_id.unwrap_or(self.testcase.id);
        let dir = self
            .source_directory()?
            .join("out")
            .join(format!("clusterfuzz_{}", id));
        self.build_directory = Some(dir.clone());
        Ok(dir)
    }

    /// Put the checkout at the testcase's commit unless building the current tree
    pub fn download_build_data(&mut self) -> BuildResult<Option<CheckoutState>> {
        if self.options.current {
            info!("building the current checkout");
            return Ok(None);
        }
        let source_dir = self.source_directory()?;
        let sha = self.git_sha()?;
        let state = checkout::reconcile(
            self.services.runner.as_ref(),
            self.services.confirmer.as_ref(),
            &source_dir,
            self.testcase.revision,
            &sha,
        )?;
        if state == CheckoutState::Synced {
            info!(
                dir = %source_dir.display(),
                revision = self.testcase.revision,
                "checkout is already at the revision"
            );
        }
        Ok(Some(state))
    }

    /// Composed gn args for this build
    pub fn gn_args(&mut self) -> BuildResult<GnArgs> {
        if let Some(args) = &self.gn_args {
            return Ok(args.clone());
        }

        let composer = GnArgsComposer::new()
            .with_pinned(self.testcase.gn_args.clone())
            .with_overrides(self.recipe.gn.extra_args.clone())
            .with_goma_dir(self.options.goma_dir.clone())
            .with_sanitizer(self.definition.sanitizer)
            .with_debug_symbols(self.options.enable_debug);
        let composer = if composer.needs_file_args() {
            composer.with_file_args(Some(self.downloaded_gn_args()?))
        } else {
            composer
        };

        let args = composer.compose();
        self.gn_args = Some(args.clone());
        Ok(args)
    }

    /// args.gn of the testcase's prebuilt build, downloading it if needed
    fn downloaded_gn_args(&self) -> BuildResult<GnArgs> {
        let path = self
            .dirs
            .testcase_build_dir(self.testcase.id)
            .join(ARGS_GN_FILENAME);
        if !path.is_file() {
            let url = self.testcase.build_url().ok_or_else(|| {
                BuildError::artifact(
                    path.display().to_string(),
                    "the testcase pins no gn args and has no prebuilt build to read them from",
                )
            })?;
            warn!(url, "testcase pins no gn args; reading them from its prebuilt build");
            DownloadedBinary::new(
                self.testcase.id,
                url,
                &self.binary_name,
                self.dirs.clone(),
                self.services.runner.clone(),
            )
            .download_build_data()?;
        }
        GnArgs::read_from(&path)
    }

    /// Write args.gn (through the edit step) and run `gn gen`
    pub fn gn_gen(&mut self) -> BuildResult<PathBuf> {
        let args = self.gn_args()?;
        let source_dir = self.source_directory()?;
        let build_dir = self.out_dir_name()?;

        let (path, written) = gn_args::write_args_gn(
            &args,
            &build_dir,
            self.services.editor.as_ref(),
            self.options.edit_mode,
        )?;
        self.gn_args = Some(written);

        self.services
            .runner
            .run(&self.recipe.gn_gen(&source_dir, &build_dir))?;
        Ok(path)
    }

    /// `gclient sync`, hooks and toolchain install, unless deps are skipped
    pub fn setup_all_deps(&mut self) -> BuildResult<()> {
        if self.options.skip_deps {
            info!("skipping dependency setup");
            return Ok(());
        }
        let source_dir = self.source_directory()?;
        let gn_args = self.gn_args()?;
        let runner = self.services.runner.as_ref();

        runner.run(
            &CommandSpec::new("gclient", &source_dir).args(["sync", "--no-history", "--shallow"]),
        )?;
        let ctx = StepContext {
            runner,
            source_dir: &source_dir,
            gn_args: &gn_args,
        };
        self.recipe.hooks.run_hooks(&ctx)?;
        self.recipe.installer.install(&ctx)
    }

    pub fn goma_policy(&self) -> GomaPolicy {
        GomaPolicy::new(self.options.goma_threads, self.options.goma_load)
    }

    pub(crate) fn ninja(&self, source_dir: &Path, build_dir: &Path, policy: GomaPolicy) -> CommandSpec {
        CommandSpec::new("ninja", source_dir)
            .args(["-w", "dupbuild=err", "-C"])
            .arg(build_dir.display().to_string())
            .args(["-j".to_string(), policy.cores().to_string()])
            .args(["-l".to_string(), policy.load().to_string()])
            .arg(self.target.as_str())
            .streamed(Transform::Ninja)
    }

    /// Run every build step in order, stopping at the first failure
    pub fn build_target(&mut self) -> BuildResult<()> {
        self.build_target_with(self.goma_policy())
    }

    /// [`build_target`](Self::build_target) with explicit parallelism
    pub fn build_target_with(&mut self, policy: GomaPolicy) -> BuildResult<()> {
        if let Some(goma_dir) = self.options.goma_dir() {
            if !goma_dir.is_dir() {
                return Err(BuildError::GomaNotInstalled {
                    dir: goma_dir.to_path_buf(),
                });
            }
        }

        let source_dir = self.source_directory()?;
        if self.options.clean_third_party {
            let cleaned = ThirdPartyCleaner::new(self.services.runner.as_ref()).clean(&source_dir)?;
            info!(cleaned, "reset third-party checkouts");
        }

        self.gn_args()?;
        self.setup_all_deps()?;
        self.gn_gen()?;

        let build_dir = self.out_dir_name()?;
        info!(target = self.target.as_str(), dir = %build_dir.display(), "building");
        self.services
            .runner
            .run(&self.ninja(&source_dir, &build_dir, policy))?;
        Ok(())
    }
}

impl BinaryProvider for SourceBuilder {
    fn build_directory(&mut self) -> BuildResult<PathBuf> {
        if self.built {
            return self.out_dir_name();
        }
        self.download_build_data()?;
        self.build_target()?;
        self.built = true;
        self.out_dir_name()
    }

    fn binary_name(&self) -> &str {
        &self.binary_name
    }
}
