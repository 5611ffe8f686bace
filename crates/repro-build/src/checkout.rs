//! Working-tree reconciliation
//!
//! Before building from source the checkout must sit at the testcase's commit.
//! Uncommitted work is never discarded without the user's explicit consent.

use crate::command::{CommandRunner, CommandSpec};
use crate::error::{BuildError, BuildResult};
use std::path::{Path, PathBuf};
use tracing::info;

/// Asks the user a yes/no question
pub trait Confirmer {
    fn confirm(&self, message: &str) -> BuildResult<bool>;
}

/// Message shown before a checkout that would touch a dirty tree
pub fn checkout_message(revision: u64, command: &str, source_dir: &Path) -> String {
    format!(
        "We want to checkout to the revision {}.\n\
         If you wouldn't like to perform the checkout, please re-run with --current.\n\
         Shall we proceed with the following command:\n\
         {} in {}?",
        revision,
        command,
        source_dir.display()
    )
}

/// Git operations on one checkout
pub struct Git<'a> {
    runner: &'a dyn CommandRunner,
    dir: PathBuf,
}

impl<'a> Git<'a> {
    pub fn new(runner: &'a dyn CommandRunner, dir: impl AsRef<Path>) -> Self {
        Self {
            runner,
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn git<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new("git", &self.dir).args(args)
    }

    /// Sha of `HEAD`
    pub fn current_sha(&self) -> BuildResult<String> {
        let output = self.runner.run(&self.git(["rev-parse", "HEAD"]))?;
        Ok(output.stdout.trim().to_string())
    }

    /// Whether the tree differs from the index
    pub fn is_dirty(&self) -> BuildResult<bool> {
        let output = self.runner.run(&self.git(["diff"]))?;
        Ok(!output.stdout.trim().is_empty())
    }

    /// Whether the object `sha` is present locally
    pub fn sha_exists(&self, sha: &str) -> BuildResult<bool> {
        let spec = self.git(["cat-file", "-e", sha]).tolerate_failure();
        Ok(self.runner.run(&spec)?.success())
    }

    /// Fetch `sha` from origin unless it is already present
    pub fn ensure_sha(&self, sha: &str) -> BuildResult<()> {
        if self.sha_exists(sha)? {
            return Ok(());
        }
        info!(sha, dir = %self.dir.display(), "fetching missing commit");
        self.runner.run(&self.git(["fetch", "origin", sha]))?;
        Ok(())
    }

    pub fn checkout_spec(&self, sha: &str) -> CommandSpec {
        self.git(["checkout", sha])
    }

    pub fn checkout(&self, sha: &str) -> BuildResult<()> {
        self.runner.run(&self.checkout_spec(sha))?;
        Ok(())
    }

    /// `git checkout -f HEAD`
    pub fn reset_hard(&self) -> BuildResult<()> {
        self.runner.run(&self.git(["checkout", "-f", "HEAD"]))?;
        Ok(())
    }

    /// `git clean -ffddx`
    pub fn clean_untracked(&self) -> BuildResult<()> {
        self.runner.run(&self.git(["clean", "-ffddx"]))?;
        Ok(())
    }
}

/// Snapshot of a checkout relative to a target commit. Never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutState {
    Synced,
    WrongRevision { current: String, dirty: bool },
}

/// Bring `source_dir` to `target_sha`.
///
/// A synced tree is left alone. A clean tree at another commit is checked out
/// directly. A dirty tree is only checked out once `confirmer` agrees; a
/// declined prompt fails with [`BuildError::DirtyRepo`] and mutates nothing.
pub fn reconcile(
    runner: &dyn CommandRunner,
    confirmer: &dyn Confirmer,
    source_dir: &Path,
    revision: u64,
    target_sha: &str,
) -> BuildResult<CheckoutState> {
    let git = Git::new(runner, source_dir);
    let current = git.current_sha()?;
    if current == target_sha {
        return Ok(CheckoutState::Synced);
    }

    let dirty = git.is_dirty()?;
    if dirty {
        let command = git.checkout_spec(target_sha).command_line();
        let message = checkout_message(revision, &command, source_dir);
        if !confirmer.confirm(&message)? {
            return Err(BuildError::DirtyRepo {
                source_dir: source_dir.to_path_buf(),
            });
        }
    }

    info!(
        from = current.as_str(),
        to = target_sha,
        dir = %source_dir.display(),
        "checking out"
    );
    git.ensure_sha(target_sha)?;
    git.checkout(target_sha)?;
    Ok(CheckoutState::WrongRevision { current, dirty })
}
