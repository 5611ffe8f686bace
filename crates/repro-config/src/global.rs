//! Global Configuration (~/.clusterfuzz/config.toml)
//!
//! Handles user-level defaults for remote compilation and build steps.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.clusterfuzz/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Remote compilation (goma) settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goma: Option<GomaConfig>,

    /// Build step defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildDefaults>,
}

/// Remote compilation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GomaConfig {
    /// Goma client directory; presence enables remote compilation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Ninja parallelism (-j)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<u32>,

    /// Ninja load limit (-l)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<u32>,
}

/// Build step defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BuildDefaults {
    /// Skip gclient sync/runhooks and toolchain updates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_deps: Option<bool>,

    /// Build with full debug symbols
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_debug: Option<bool>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(goma) = &self.goma {
            validate_positive("goma.threads", goma.threads)?;
            validate_positive("goma.load", goma.load)?;
        }
        Ok(())
    }

    pub fn goma_dir(&self) -> Option<&Path> {
        self.goma.as_ref().and_then(|g| g.dir.as_deref())
    }

    pub fn goma_threads(&self) -> Option<u32> {
        self.goma.as_ref().and_then(|g| g.threads)
    }

    pub fn goma_load(&self) -> Option<u32> {
        self.goma.as_ref().and_then(|g| g.load)
    }

    pub fn skip_deps(&self) -> bool {
        self.build.as_ref().and_then(|b| b.skip_deps).unwrap_or(false)
    }

    pub fn enable_debug(&self) -> bool {
        self.build
            .as_ref()
            .and_then(|b| b.enable_debug)
            .unwrap_or(false)
    }

    /// Mutable goma section, created on first use
    pub fn goma_mut(&mut self) -> &mut GomaConfig {
        self.goma.get_or_insert_with(GomaConfig::default)
    }

    /// Merge another global config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &GlobalConfig) {
        if let Some(goma) = &other.goma {
            let ours = self.goma_mut();
            if goma.dir.is_some() {
                ours.dir = goma.dir.clone();
            }
            if goma.threads.is_some() {
                ours.threads = goma.threads;
            }
            if goma.load.is_some() {
                ours.load = goma.load;
            }
        }
        if other.build.is_some() {
            self.build = other.build.clone();
        }
    }
}

fn validate_positive(field: &str, value: Option<u32>) -> ConfigResult<()> {
    if value == Some(0) {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
