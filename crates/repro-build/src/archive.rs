//! Prebuilt archive extraction

use crate::error::{BuildError, BuildResult};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use zip::ZipArchive;

/// Extract `archive` into `output_dir`.
///
/// Returns the archive's top-level entry names. Entries that would escape
/// `output_dir` are rejected.
pub fn extract_zip(archive: &Path, output_dir: &Path) -> BuildResult<BTreeSet<String>> {
    let origin = archive.display().to_string();
    let file = File::open(archive).map_err(|e| BuildError::artifact(&origin, e))?;
    let mut zip = ZipArchive::new(file)
        .map_err(|e| BuildError::artifact(&origin, format!("not a zip archive: {}", e)))?;

    fs::create_dir_all(output_dir).map_err(|e| BuildError::io(output_dir, e))?;

    let mut top_level = BTreeSet::new();
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| BuildError::artifact(&origin, format!("bad entry {}: {}", i, e)))?;

        let relative = entry.enclosed_name().map(Path::to_path_buf).ok_or_else(|| {
            BuildError::artifact(&origin, format!("unsafe entry path: {}", entry.name()))
        })?;
        if let Some(Component::Normal(first)) = relative.components().next() {
            top_level.insert(first.to_string_lossy().to_string());
        }

        let out_path = output_dir.join(&relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| BuildError::io(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        let mut out_file = File::create(&out_path).map_err(|e| BuildError::io(&out_path, e))?;
        io::copy(&mut entry, &mut out_file).map_err(|e| BuildError::io(&out_path, e))?;
        if let Some(mode) = entry.unix_mode() {
            set_mode(&out_path, mode)?;
        }
    }

    Ok(top_level)
}

/// Restore the permission bits an entry was archived with
#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> BuildResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
        .map_err(|e| BuildError::io(path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> BuildResult<()> {
    Ok(())
}

/// Directory an archive extracted into: `<output_dir>/<archive stem>` when
/// present, otherwise the archive's single top-level directory
pub fn extracted_root(
    archive: &Path,
    output_dir: &Path,
    top_level: &BTreeSet<String>,
) -> Option<PathBuf> {
    let by_stem = archive
        .file_stem()
        .map(|stem| output_dir.join(stem))
        .filter(|dir| dir.is_dir());
    by_stem.or_else(|| match top_level.iter().collect::<Vec<_>>().as_slice() {
        [only] => Some(output_dir.join(only)).filter(|dir| dir.is_dir()),
        _ => None,
    })
}

/// Add the owner-execute bit
#[cfg(unix)]
pub fn make_executable(path: &Path) -> BuildResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)
        .map_err(|e| BuildError::io(path, e))?
        .permissions();
    permissions.set_mode(permissions.mode() | 0o100);
    fs::set_permissions(path, permissions).map_err(|e| BuildError::io(path, e))
}

#[cfg(not(unix))]
pub fn make_executable(path: &Path) -> BuildResult<()> {
    fs::metadata(path)
        .map(|_| ())
        .map_err(|e| BuildError::io(path, e))
}
