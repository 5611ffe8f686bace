//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::definition::JobCatalog;
use crate::global::GlobalConfig;
use crate::layout::ReproDirs;
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Overrides the state directory (~/.clusterfuzz)
pub const ENV_HOME: &str = "REPRO_HOME";
/// Goma client directory
pub const ENV_GOMA_DIR: &str = "GOMA_DIR";
pub const ENV_GOMA_THREADS: &str = "REPRO_GOMA_THREADS";
pub const ENV_GOMA_LOAD: &str = "REPRO_GOMA_LOAD";
/// Extra job catalog merged over the built-in one
pub const ENV_JOB_CATALOG: &str = "REPRO_JOB_CATALOG";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Built-in defaults - lowest priority
/// 2. Global config (~/.clusterfuzz/config.toml) - overrides defaults
/// 3. Environment variables (GOMA_DIR, REPRO_*) - overrides global config
/// 4. CLI flags - highest priority (handled by caller)
pub struct ConfigLoader {
    /// Explicit state directory, bypassing REPRO_HOME and the home directory
    root: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Global configuration with environment overrides applied
    pub global: GlobalConfig,

    /// State directory layout
    pub dirs: ReproDirs,

    /// Built-in catalog merged with the user's catalog
    pub catalog: JobCatalog,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Use `root` as the state directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Load and merge all configuration sources
    pub fn load(&mut self) -> ConfigResult<Config> {
        let dirs = self.resolve_dirs()?;

        // Global config is optional - if it doesn't exist, use defaults
        let config_file = dirs.config_file();
        let global = if config_file.exists() {
            GlobalConfig::load_from_file(&config_file)?
        } else {
            GlobalConfig::default()
        };
        let global = self.apply_env_overrides(global)?;

        let catalog = self.load_catalog(&dirs)?;

        Ok(Config {
            global,
            dirs,
            catalog,
        })
    }

    fn resolve_dirs(&self) -> ConfigResult<ReproDirs> {
        if let Some(root) = &self.root {
            return Ok(ReproDirs::under(root));
        }
        match env::var(ENV_HOME) {
            Ok(root) if !root.is_empty() => Ok(ReproDirs::under(root)),
            _ => ReproDirs::default_location(),
        }
    }

    fn load_catalog(&self, dirs: &ReproDirs) -> ConfigResult<JobCatalog> {
        let mut catalog = JobCatalog::builtin()?;

        let user_catalog = match env::var(ENV_JOB_CATALOG) {
            Ok(path) if !path.is_empty() => Some(PathBuf::from(path)),
            _ => Some(dirs.jobs_file()).filter(|p| p.exists()),
        };
        if let Some(path) = user_catalog {
            catalog.merge(JobCatalog::load_from_file(&path)?);
        }

        Ok(catalog)
    }

    /// Apply environment variable overrides to the global config
    fn apply_env_overrides(&self, mut config: GlobalConfig) -> ConfigResult<GlobalConfig> {
        if let Ok(dir) = env::var(ENV_GOMA_DIR) {
            if !dir.is_empty() {
                config.goma_mut().dir = Some(PathBuf::from(dir));
            }
        }

        if let Some(threads) = read_count(ENV_GOMA_THREADS)? {
            config.goma_mut().threads = Some(threads);
        }

        if let Some(load) = read_count(ENV_GOMA_LOAD)? {
            config.goma_mut().load = Some(load);
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// State directory root
    pub fn root(&self) -> &Path {
        self.dirs.root()
    }
}

fn read_count(var: &str) -> ConfigResult<Option<u32>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                field: var.to_string(),
                reason: format!("expected a positive integer, got '{}': {}", value, e),
            }),
        _ => Ok(None),
    }
}
