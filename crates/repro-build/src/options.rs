//! Per-invocation build options

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the binary comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Prebuilt archive from the testcase
    Download,
    /// Build from the local checkout
    #[default]
    Source,
}

/// User knobs for one reproduction attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub mode: BuildMode,
    /// Explicit ninja `-j`
    pub goma_threads: Option<u32>,
    /// Explicit ninja `-l`
    pub goma_load: Option<u32>,
    /// Goma installation; its presence enables goma
    pub goma_dir: Option<PathBuf>,
    /// Skip `gclient sync`, `gclient runhooks` and toolchain installs
    pub skip_deps: bool,
    /// Open args.gn in an editor before `gn gen`
    pub edit_mode: bool,
    /// Build whatever is checked out
    pub current: bool,
    /// Build with full symbols
    pub enable_debug: bool,
    /// Reset nested third_party checkouts before building
    pub clean_third_party: bool,
    /// Testcase id used in the build directory name
    pub testcase_id: Option<u64>,
}

impl BuildOptions {
    pub fn new(mode: BuildMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_goma_threads(mut self, threads: Option<u32>) -> Self {
        self.goma_threads = threads;
        self
    }

    pub fn with_goma_load(mut self, load: Option<u32>) -> Self {
        self.goma_load = load;
        self
    }

    pub fn with_goma_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.goma_dir = dir;
        self
    }

    pub fn with_skip_deps(mut self, skip: bool) -> Self {
        self.skip_deps = skip;
        self
    }

    pub fn with_edit_mode(mut self, edit: bool) -> Self {
        self.edit_mode = edit;
        self
    }

    pub fn with_current(mut self, current: bool) -> Self {
        self.current = current;
        self
    }

    pub fn with_enable_debug(mut self, enable: bool) -> Self {
        self.enable_debug = enable;
        self
    }

    pub fn with_clean_third_party(mut self, clean: bool) -> Self {
        self.clean_third_party = clean;
        self
    }

    pub fn with_testcase_id(mut self, id: Option<u64>) -> Self {
        self.testcase_id = id;
        self
    }

    pub fn goma_dir(&self) -> Option<&Path> {
        self.goma_dir.as_deref()
    }
}
