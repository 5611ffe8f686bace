//! Testcase descriptor

use crate::error::{BuildError, BuildResult};
use crate::gn_args::GnArgs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Marker preceding the binary path in a stack trace
const RUNNING_COMMAND: &str = "Running command: ";

/// A crash report to reproduce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Testcase {
    pub id: u64,
    /// Commit position the crash was found at
    pub revision: u64,
    /// Prebuilt archive URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_url: Option<String>,
    /// gn args the crashing build used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gn_args: Option<GnArgs>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stacktrace_lines: Vec<String>,
}

impl Testcase {
    pub fn new(id: u64, revision: u64) -> Self {
        Self {
            id,
            revision,
            build_url: None,
            gn_args: None,
            stacktrace_lines: Vec::new(),
        }
    }

    pub fn with_build_url(mut self, url: impl Into<String>) -> Self {
        self.build_url = Some(url.into());
        self
    }

    pub fn with_gn_args(mut self, args: GnArgs) -> Self {
        self.gn_args = Some(args);
        self
    }

    pub fn with_stacktrace_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stacktrace_lines = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Load a testcase from a JSON file
    pub fn from_file(path: &Path) -> BuildResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            BuildError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    /// Artifact URL, treating an empty string as absent
    pub fn build_url(&self) -> Option<&str> {
        self.build_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn binary_name_from_stacktrace(&self) -> Option<String> {
        binary_name_from_stacktrace(&self.stacktrace_lines)
    }
}

/// File name of the binary in the first `Running command: <path> ...` line
pub fn binary_name_from_stacktrace<S: AsRef<str>>(lines: &[S]) -> Option<String> {
    lines.iter().find_map(|line| {
        let (_, command) = line.as_ref().split_once(RUNNING_COMMAND)?;
        let path = command.split_whitespace().next()?;
        Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
    })
}
