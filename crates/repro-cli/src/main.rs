use anyhow::Result;
use clap::{Parser, Subcommand};
use repro_build::BuildError;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;
mod prompt;

/// Reproduce a fuzzer crash locally.
///
/// Fetches the prebuilt binary a testcase crashed with, or checks out the
/// testcase's revision and builds it, then prints the binary's path.
///
/// EXAMPLES:
///     repro build testcase.json --job linux_asan_d8
///     repro build testcase.json --job linux_msan_chrome --goma-dir ~/goma
///     repro build testcase.json --job linux_asan_pdfium --build download
///     repro supported-job-types --json
///
/// ENVIRONMENT VARIABLES:
///     REPRO_HOME          State directory (default ~/.clusterfuzz)
///     GOMA_DIR            Goma installation to build with
///     REPRO_JOB_CATALOG   Extra job-type catalog (TOML)
///     V8_SRC, CHROMIUM_SRC, PDFIUM_SRC   Source checkouts
#[derive(Parser)]
#[command(name = "repro")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Log filter (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "REPRO_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce the binary for a testcase and print its path
    Build(commands::build::BuildArgs),

    /// List the job types this tool can build
    SupportedJobTypes {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build(args) => commands::build::run(args),
        Commands::SupportedJobTypes { json } => commands::jobs::run(json),
    }
}

/// Exit code the polling daemon keys on
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<BuildError>())
        .map_or(1, |build_err| u8::try_from(build_err.exit_code()).unwrap_or(1))
}
