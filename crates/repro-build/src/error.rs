//! Build layer error types
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to resolve revision via {url}: {reason}")]
    Resolution { url: String, reason: String },

    #[error(
        "We can't run the checkout command because {} has uncommitted changes.\n\
         Please commit or stash these changes and re-run this tool.",
        .source_dir.display()
    )]
    DirtyRepo { source_dir: PathBuf },

    #[error("`{command}` failed with the return code {exit_code} in {}", .cwd.display())]
    ToolInvocation {
        command: String,
        cwd: PathBuf,
        exit_code: i32,
        stderr: String,
    },

    #[error(
        "{binary} is not found. Please install it or ensure the path is correct.\n\
         Most of the time you can install it with `apt-get install {binary}`."
    )]
    ToolNotInstalled { binary: String },

    #[error("Build artifact {url} is unavailable: {reason}")]
    ArtifactUnavailable { url: String, reason: String },

    #[error("The source directory is unknown: set ${var} to the path of your checkout")]
    MissingSourceDirectory { var: String },

    #[error(
        "The testcase hasn't been minimized yet or cannot be minimized, \
         so the binary name cannot be inferred from its stack trace."
    )]
    MinimizationNotFinished,

    #[error(
        "Either goma is not installed, or {} does not exist. \
         Please set up goma before continuing, or re-run with --disable-goma.",
        .dir.display()
    )]
    GomaNotInstalled { dir: PathBuf },

    #[error("Invalid args.gn line: '{line}' (expected `name = value`)")]
    InvalidGnArgs { line: String },

    #[error("Configuration error: {0}")]
    Config(#[from] repro_config::ConfigError),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a resolution error
    pub fn resolution(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Resolution {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an artifact error
    pub fn artifact(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::ArtifactUnavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Process exit code reported to the caller (the polling daemon keys on these)
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MinimizationNotFinished => 42,
            Self::GomaNotInstalled { .. } => 46,
            Self::ToolNotInstalled { binary } if binary == "gsutil" => 49,
            Self::ToolNotInstalled { .. } => 48,
            Self::DirtyRepo { .. } => 52,
            Self::ToolInvocation { .. } => 53,
            Self::Resolution { .. } => 59,
            Self::ArtifactUnavailable { .. } => 60,
            _ => 1,
        }
    }
}
