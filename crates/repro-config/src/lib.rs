//! Repro Configuration System
//!
//! Provides configuration for the crash reproduction tool:
//! - Global user configuration (~/.clusterfuzz/config.toml)
//! - On-disk directory layout (cache and builds roots)
//! - Job-type catalog describing how each job's binary is produced
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config (~/.clusterfuzz/config.toml)
//! 3. Environment variables (GOMA_DIR, REPRO_*)
//! 4. CLI flags (handled by the caller)
//!
//! # Example
//!
//! ```no_run
//! use repro_config::ConfigLoader;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load().unwrap();
//! let definition = config.catalog.get("linux_asan_d8").unwrap();
//! assert_eq!(definition.source_var, "V8_SRC");
//! ```

pub mod definition;
pub mod global;
pub mod layout;
pub mod loader;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error(
        "Unfortunately, the job {0} is not yet supported. \
         Run `repro supported-job-types` to list the supported ones."
    )]
    UnknownJobType(String),

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use definition::{Arch, Definition, JobCatalog, Project, Sanitizer};
pub use global::GlobalConfig;
pub use layout::ReproDirs;
pub use loader::{Config, ConfigLoader};
