//! On-disk layout of the state directory

use crate::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};

/// Name of the state directory under the user's home
pub const STATE_DIR_NAME: &str = ".clusterfuzz";

/// Directories shared by every reproduction attempt.
///
/// `cache_dir` receives downloaded archives, `builds_dir` holds the extracted
/// prebuilt binaries (one `<testcase-id>_build` directory per testcase).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReproDirs {
    pub root: PathBuf,
    pub cache_dir: PathBuf,
    pub builds_dir: PathBuf,
}

impl ReproDirs {
    /// Lay out the state directories under `root`
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            cache_dir: root.join("cache"),
            builds_dir: root.join("builds"),
            root,
        }
    }

    /// Default layout (~/.clusterfuzz)
    pub fn default_location() -> ConfigResult<Self> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(Self::under(home.join(STATE_DIR_NAME)))
    }

    /// Directory holding the extracted prebuilt build of a testcase
    pub fn testcase_build_dir(&self, testcase_id: u64) -> PathBuf {
        self.builds_dir.join(format!("{}_build", testcase_id))
    }

    /// Global configuration file
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// User job catalog file
    pub fn jobs_file(&self) -> PathBuf {
        self.root.join("jobs.toml")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
