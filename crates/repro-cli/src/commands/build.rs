//! Build command - produce the binary for a testcase

use crate::prompt::{EditorArgsEditor, TerminalConfirmer};
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use repro_build::{
    BinaryProvider, BuildMode, BuildOptions, HttpFetcher, Provider, Services, SystemRunner,
    Testcase,
};
use repro_config::{ConfigLoader, GlobalConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Where the binary comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BuildKind {
    /// Unpack the testcase's prebuilt archive
    Download,
    /// Build from the local checkout
    Source,
}

impl From<BuildKind> for BuildMode {
    fn from(kind: BuildKind) -> Self {
        match kind {
            BuildKind::Download => BuildMode::Download,
            BuildKind::Source => BuildMode::Source,
        }
    }
}

/// Build command arguments
#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Testcase descriptor (JSON with id, revision, build_url, gn_args, stacktrace_lines)
    pub testcase: PathBuf,

    /// Job type, e.g. linux_asan_d8
    #[arg(long = "job")]
    pub job_type: String,

    /// Download the prebuilt binary or build from source
    #[arg(long, value_enum, default_value_t = BuildKind::Source)]
    pub build: BuildKind,

    /// Number of ninja jobs (default: 50 per CPU)
    #[arg(long)]
    pub goma_threads: Option<u32>,

    /// Ninja load limit (default: 2 per CPU)
    #[arg(long)]
    pub goma_load: Option<u32>,

    /// Goma installation directory
    #[arg(long, conflicts_with = "disable_goma")]
    pub goma_dir: Option<PathBuf>,

    /// Build without goma even if one is configured
    #[arg(long)]
    pub disable_goma: bool,

    /// Skip gclient sync, hooks and toolchain installs
    #[arg(long)]
    pub skip_deps: bool,

    /// Edit args.gn before building
    #[arg(long)]
    pub edit_mode: bool,

    /// Build the current checkout instead of the testcase's revision
    #[arg(long)]
    pub current: bool,

    /// Build with full debug symbols
    #[arg(long)]
    pub enable_debug: bool,

    /// Reset third_party checkouts before building
    #[arg(long)]
    pub clean_third_party: bool,

    /// Testcase id used for the build directory name
    #[arg(long)]
    pub testcase_id: Option<u64>,

    /// Answer yes to checkout prompts
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl BuildArgs {
    /// Merge flags over the global configuration; flags win
    fn options(&self, global: &GlobalConfig) -> BuildOptions {
        let goma_dir = if self.disable_goma {
            None
        } else {
            self.goma_dir
                .clone()
                .or_else(|| global.goma_dir().map(|dir| dir.to_path_buf()))
        };

        BuildOptions::new(self.build.into())
            .with_goma_threads(self.goma_threads.or(global.goma_threads()))
            .with_goma_load(self.goma_load.or(global.goma_load()))
            .with_goma_dir(goma_dir)
            .with_skip_deps(self.skip_deps || global.skip_deps())
            .with_edit_mode(self.edit_mode)
            .with_current(self.current)
            .with_enable_debug(self.enable_debug || global.enable_debug())
            .with_clean_third_party(self.clean_third_party)
            .with_testcase_id(self.testcase_id)
    }
}

/// Run the build command
pub fn run(args: BuildArgs) -> Result<()> {
    let config = ConfigLoader::new()
        .load()
        .context("Failed to load configuration")?;
    let definition = config.catalog.get(&args.job_type)?;
    let testcase = Testcase::from_file(&args.testcase)
        .with_context(|| format!("Failed to read testcase {}", args.testcase.display()))?;
    let options = args.options(&config.global);

    let services = Services::new(
        Arc::new(SystemRunner::new()),
        Arc::new(HttpFetcher::new()?),
        Arc::new(TerminalConfirmer::new(args.yes)),
        Arc::new(EditorArgsEditor::from_env()),
    );

    info!(
        testcase = testcase.id,
        job = args.job_type.as_str(),
        mode = ?options.mode,
        "preparing binary"
    );
    let mut provider = Provider::select(&testcase, definition, &options, &config.dirs, &services)?;
    let binary = provider.binary_path()?;
    println!("{}", binary.display());
    Ok(())
}
