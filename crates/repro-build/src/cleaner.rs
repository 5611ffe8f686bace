//! Third-party checkout sweep

use crate::checkout::Git;
use crate::command::CommandRunner;
use crate::error::{BuildError, BuildResult};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

const THIRD_PARTY_DIR: &str = "third_party";
const GIT_MARKER: &str = ".git";

/// Resets every git checkout under `<source>/third_party`
pub struct ThirdPartyCleaner<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> ThirdPartyCleaner<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Checkouts under `third_party`, deepest first.
    ///
    /// A checkout's own subtree is not searched.
    pub fn find_checkouts(source_root: &Path) -> BuildResult<Vec<PathBuf>> {
        let third_party = source_root.join(THIRD_PARTY_DIR);
        if !third_party.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        let mut walker = WalkDir::new(&third_party).min_depth(1).into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&third_party).to_path_buf();
                BuildError::io(path, io::Error::from(e))
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            if entry.file_name() == GIT_MARKER {
                walker.skip_current_dir();
                continue;
            }
            if entry.path().join(GIT_MARKER).exists() {
                found.push((entry.depth(), entry.into_path()));
                walker.skip_current_dir();
            }
        }

        found.sort_by(|(da, pa), (db, pb)| db.cmp(da).then_with(|| pa.cmp(pb)));
        Ok(found.into_iter().map(|(_, path)| path).collect())
    }

    /// Force-checkout `HEAD` and wipe untracked files in every checkout.
    /// Returns how many checkouts were reset.
    pub fn clean(&self, source_root: &Path) -> BuildResult<usize> {
        let checkouts = Self::find_checkouts(source_root)?;
        for dir in &checkouts {
            info!(dir = %dir.display(), "resetting third-party checkout");
            let git = Git::new(self.runner, dir);
            git.reset_hard()?;
            git.clean_untracked()?;
        }
        Ok(checkouts.len())
    }
}
