//! gn build arguments
//!
//! An args set is a `name -> value` map rendered one `name = value` line per
//! entry in sorted order. Values are kept as gn source text (`true`, `2`,
//! `"/home/u/goma"`), so quoting is the caller's business.

use crate::error::{BuildError, BuildResult};
use repro_config::Sanitizer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Name of the args file inside a build directory
pub const ARGS_GN_FILENAME: &str = "args.gn";

/// Sorted gn argument set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GnArgs(BTreeMap<String, String>);

impl GnArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse args.gn text. Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> BuildResult<Self> {
        let mut args = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, value) = line
                .split_once('=')
                .map(|(n, v)| (n.trim(), v.trim()))
                .filter(|(n, v)| !n.is_empty() && !v.is_empty())
                .ok_or_else(|| BuildError::InvalidGnArgs {
                    line: line.to_string(),
                })?;
            args.insert(name, value);
        }
        Ok(args)
    }

    /// Read an args file
    pub fn read_from(path: &Path) -> BuildResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        Self::parse(&text)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    /// Overlay `other`; its values win
    pub fn merge(&mut self, other: &GnArgs) {
        for (name, value) in &other.0 {
            self.0.insert(name.clone(), value.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for GnArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{} = {}", name, value)?;
        }
        Ok(())
    }
}

impl FromStr for GnArgs {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for GnArgs {
    type Error = BuildError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GnArgs> for String {
    fn from(args: GnArgs) -> Self {
        args.to_string()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for GnArgs {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Enable or disable goma in `args`
pub fn apply_goma(args: &mut GnArgs, goma_dir: Option<&Path>) {
    match goma_dir {
        Some(dir) => {
            args.insert("use_goma", "true");
            args.insert("goma_dir", format!("\"{}\"", dir.display()));
        }
        None => {
            args.insert("use_goma", "false");
            args.remove("goma_dir");
        }
    }
}

/// Request full symbols. MSan builds keep `is_debug` as is.
pub fn apply_debug_symbols(args: &mut GnArgs, sanitizer: Option<Sanitizer>, enabled: bool) {
    if !enabled {
        return;
    }
    args.insert("symbol_level", "2");
    args.insert("sanitizer_keep_symbols", "true");
    if sanitizer != Some(Sanitizer::Msan) {
        args.insert("is_debug", "true");
    }
}

/// Layers the sources of a build's gn args in a fixed order
#[derive(Debug, Clone, Default)]
pub struct GnArgsComposer {
    pinned: Option<GnArgs>,
    file: Option<GnArgs>,
    overrides: GnArgs,
    goma_dir: Option<PathBuf>,
    sanitizer: Option<Sanitizer>,
    debug_symbols: bool,
}

impl GnArgsComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Args pinned by the testcase
    pub fn with_pinned(mut self, pinned: Option<GnArgs>) -> Self {
        self.pinned = pinned;
        self
    }

    /// Args read from an on-disk args file
    pub fn with_file_args(mut self, file: Option<GnArgs>) -> Self {
        self.file = file;
        self
    }

    pub fn with_overrides(mut self, overrides: GnArgs) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_goma_dir(mut self, goma_dir: Option<PathBuf>) -> Self {
        self.goma_dir = goma_dir;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Option<Sanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn with_debug_symbols(mut self, enabled: bool) -> Self {
        self.debug_symbols = enabled;
        self
    }

    /// Whether the base set still has to come from a file
    pub fn needs_file_args(&self) -> bool {
        self.pinned.as_ref().map_or(true, GnArgs::is_empty)
    }

    /// Base args, overrides, goma, debug symbols; later stages win
    pub fn compose(&self) -> GnArgs {
        let mut args = match &self.pinned {
            Some(pinned) if !pinned.is_empty() => pinned.clone(),
            _ => self.file.clone().unwrap_or_default(),
        };
        args.merge(&self.overrides);
        apply_goma(&mut args, self.goma_dir.as_deref());
        apply_debug_symbols(&mut args, self.sanitizer, self.debug_symbols);
        args
    }
}

/// Lets the user adjust args text before it is written
pub trait ArgsEditor {
    /// Return the final text; only edit when `should_edit`
    fn edit(&self, text: &str, should_edit: bool) -> BuildResult<String>;
}

/// Returns text unchanged
#[derive(Debug, Default)]
pub struct PassthroughEditor;

impl ArgsEditor for PassthroughEditor {
    fn edit(&self, text: &str, _should_edit: bool) -> BuildResult<String> {
        Ok(text.to_string())
    }
}

/// Write `args` to `<build_dir>/args.gn` through `editor`.
///
/// The edited text is what lands on disk; its parsed form is returned.
pub fn write_args_gn(
    args: &GnArgs,
    build_dir: &Path,
    editor: &dyn ArgsEditor,
    should_edit: bool,
) -> BuildResult<(PathBuf, GnArgs)> {
    fs::create_dir_all(build_dir).map_err(|e| BuildError::io(build_dir, e))?;
    let path = build_dir.join(ARGS_GN_FILENAME);
    if path.exists() {
        fs::remove_file(&path).map_err(|e| BuildError::io(&path, e))?;
    }

    let text = editor.edit(&args.to_string(), should_edit)?;
    fs::write(&path, &text).map_err(|e| BuildError::io(&path, e))?;
    info!(path = %path.display(), "wrote gn args");
    let written = GnArgs::parse(&text)?;
    Ok((path, written))
}
