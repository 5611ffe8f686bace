//! Job-type definitions
//!
//! A job type names a fuzzing configuration (e.g. `linux_asan_d8`). Its
//! [`Definition`] tells the build layer which project to build, where the
//! source checkout lives and which variant (sanitizer, architecture) to
//! produce. The catalog is a TOML table:
//!
//! ```toml
//! [jobs.linux_msan_d8]
//! project = "v8"
//! source_var = "V8_SRC"
//! binary_name = "d8"
//! sanitizer = "MSAN"
//! ```

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Catalog shipped with the tool
const BUILTIN_CATALOG: &str = include_str!("default_jobs.toml");

/// Project whose binary is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Project {
    V8,
    Chromium,
    Pdfium,
}

impl Project {
    /// Binary produced when the definition does not name one.
    ///
    /// Chromium has no fixed binary; it is inferred from the testcase.
    pub fn default_binary_name(&self) -> Option<&'static str> {
        match self {
            Self::V8 => Some("d8"),
            Self::Chromium => None,
            Self::Pdfium => Some("pdfium_test"),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::V8 => "v8",
            Self::Chromium => "chromium",
            Self::Pdfium => "pdfium",
        }
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compile-time instrumentation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sanitizer {
    Asan,
    Msan,
    Tsan,
    Ubsan,
    Cfi,
}

impl Sanitizer {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Asan => "ASAN",
            Self::Msan => "MSAN",
            Self::Tsan => "TSAN",
            Self::Ubsan => "UBSAN",
            Self::Cfi => "CFI",
        }
    }
}

impl fmt::Display for Sanitizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Target architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    #[default]
    X64,
    X86,
}

/// Static metadata for one job type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Definition {
    /// Project to build
    pub project: Project,

    /// Environment variable holding the source checkout path
    pub source_var: String,

    /// Binary file name; `None` means "infer from the stack trace"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_name: Option<String>,

    /// Ninja target; defaults to the binary name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanitizer: Option<Sanitizer>,

    #[serde(default)]
    pub arch: Arch,
}

impl Definition {
    /// Create a definition for a project with no variant
    pub fn new(project: Project, source_var: impl Into<String>) -> Self {
        Self {
            project,
            source_var: source_var.into(),
            binary_name: None,
            target: None,
            sanitizer: None,
            arch: Arch::X64,
        }
    }

    pub fn with_binary_name(mut self, binary_name: impl Into<String>) -> Self {
        self.binary_name = Some(binary_name.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = Some(sanitizer);
        self
    }

    pub fn with_arch(mut self, arch: Arch) -> Self {
        self.arch = arch;
        self
    }

    /// Configured binary name, falling back to the project default
    pub fn configured_binary_name(&self) -> Option<&str> {
        self.binary_name
            .as_deref()
            .or_else(|| self.project.default_binary_name())
    }

    fn validate(&self, job: &str) -> ConfigResult<()> {
        if self.source_var.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("jobs.{}.source_var", job),
                reason: "must name an environment variable".to_string(),
            });
        }
        if matches!(self.binary_name.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: format!("jobs.{}.binary_name", job),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Job-type name to [`Definition`] table
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobCatalog {
    #[serde(default)]
    jobs: BTreeMap<String, Definition>,
}

impl JobCatalog {
    /// Catalog shipped with the tool
    pub fn builtin() -> ConfigResult<Self> {
        Self::parse(BUILTIN_CATALOG, Path::new("<builtin>"))
    }

    /// Load a catalog from a TOML file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, origin: &Path) -> ConfigResult<Self> {
        let catalog: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: origin.to_path_buf(),
            error: e,
        })?;
        for (job, definition) in &catalog.jobs {
            definition.validate(job)?;
        }
        Ok(catalog)
    }

    /// Look up a job type
    pub fn get(&self, job_type: &str) -> ConfigResult<&Definition> {
        self.jobs
            .get(job_type)
            .ok_or_else(|| ConfigError::UnknownJobType(job_type.to_string()))
    }

    pub fn insert(&mut self, job_type: impl Into<String>, definition: Definition) {
        self.jobs.insert(job_type.into(), definition);
    }

    /// Job-type names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Definition)> {
        self.jobs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge another catalog into this one; entries of `other` win
    pub fn merge(&mut self, other: JobCatalog) {
        self.jobs.extend(other.jobs);
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
