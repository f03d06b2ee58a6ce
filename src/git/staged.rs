//! Scoped "only staged changes are visible" guard
//!
//! While the guard lives, unstaged modifications to tracked files are saved
//! as a patch and the working tree matches the index. Dropping the guard
//! re-applies the patch, on every exit path including unwinding. The patch
//! file is kept in the git dir so the changes survive even if restoring
//! fails.

use git2::build::CheckoutBuilder;
use git2::{ApplyLocation, Diff, DiffOptions, Repository};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::repository::patch_bytes;
use super::{GitRepo, Result, VcsError, VersionControl};

struct Stash {
    path: PathBuf,
    patch: Vec<u8>,
}

pub struct StagedFilesOnly {
    root: PathBuf,
    stash: Option<Stash>,
}

impl StagedFilesOnly {
    /// Stash unstaged changes of `git` into a patch under `patch_dir`
    pub fn acquire(git: &GitRepo, patch_dir: &Path) -> Result<Self> {
        let repo = git.repository();
        let mut opts = DiffOptions::new();
        opts.show_binary(true).ignore_submodules(true);
        let diff = repo.diff_index_to_workdir(None, Some(&mut opts))?;

        let root = git.root().to_path_buf();
        if diff.deltas().len() == 0 {
            return Ok(Self { root, stash: None });
        }

        let patch = patch_bytes(&diff)?;
        std::fs::create_dir_all(patch_dir).map_err(|e| VcsError::io(patch_dir, e))?;
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let path = patch_dir.join(format!("patch{timestamp}"));
        std::fs::write(&path, &patch).map_err(|e| VcsError::io(&path, e))?;

        tracing::warn!("Unstaged files detected.");
        tracing::info!("Stashing unstaged files to {}.", path.display());
        checkout_index(repo)?;

        Ok(Self {
            root,
            stash: Some(Stash { path, patch }),
        })
    }

    /// Whether unstaged changes were hidden
    pub fn is_stashed(&self) -> bool {
        self.stash.is_some()
    }

    fn restore(&self) -> Result<()> {
        let Some(stash) = &self.stash else {
            return Ok(());
        };

        let repo = Repository::open(&self.root)?;
        let diff = Diff::from_buffer(&stash.patch)?;
        if repo.apply(&diff, ApplyLocation::WorkDir, None).is_err() {
            tracing::warn!("Stashed changes conflicted with hook auto-fixes... Rolling back fixes...");
            checkout_index(&repo)?;
            repo.apply(&diff, ApplyLocation::WorkDir, None)?;
        }

        tracing::info!("Restored changes from {}.", stash.path.display());
        Ok(())
    }
}

impl Drop for StagedFilesOnly {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            let saved = self
                .stash
                .as_ref()
                .map(|s| s.path.display().to_string())
                .unwrap_or_default();
            tracing::error!("Failed to restore unstaged changes: {e}. They are saved in {saved}");
        }
    }
}

fn checkout_index(repo: &Repository) -> Result<()> {
    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_index(None, Some(&mut checkout))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::repository::tests::{commit_index, init_repo, stage, write};
    use std::fs;

    #[test]
    fn test_unstaged_changes_hidden_and_restored() {
        let (dir, repo) = init_repo();
        write(&dir, "a.py", "staged\n");
        stage(&repo, &["a.py"]);
        commit_index(&repo, "initial");
        write(&dir, "a.py", "staged\nplus local edits\n");

        let git = GitRepo::open(dir.path()).unwrap();
        {
            let guard = git.hide_unstaged_changes().unwrap().unwrap();
            assert!(guard.is_stashed());
            assert_eq!(fs::read_to_string(dir.path().join("a.py")).unwrap(), "staged\n");
        }
        assert_eq!(
            fs::read_to_string(dir.path().join("a.py")).unwrap(),
            "staged\nplus local edits\n"
        );
    }

    #[test]
    fn test_clean_tree_stashes_nothing() {
        let (dir, repo) = init_repo();
        write(&dir, "a.py", "clean\n");
        stage(&repo, &["a.py"]);
        commit_index(&repo, "initial");

        let git = GitRepo::open(dir.path()).unwrap();
        let guard = git.hide_unstaged_changes().unwrap().unwrap();
        assert!(!guard.is_stashed());
        assert!(!dir.path().join(".git/prehook").exists());
    }

    #[test]
    fn test_conflicting_hook_edits_are_rolled_back() {
        let (dir, repo) = init_repo();
        write(&dir, "a.py", "line\n");
        stage(&repo, &["a.py"]);
        commit_index(&repo, "initial");
        write(&dir, "a.py", "user change\n");

        let git = GitRepo::open(dir.path()).unwrap();
        {
            let _guard = git.hide_unstaged_changes().unwrap().unwrap();
            // a fixer rewrites the file while changes are hidden
            write(&dir, "a.py", "hook rewrote this\n");
        }
        assert_eq!(
            fs::read_to_string(dir.path().join("a.py")).unwrap(),
            "user change\n"
        );
    }

    #[test]
    fn test_patch_file_kept_in_git_dir() {
        let (dir, repo) = init_repo();
        write(&dir, "a.py", "one\n");
        stage(&repo, &["a.py"]);
        commit_index(&repo, "initial");
        write(&dir, "a.py", "one\ntwo\n");

        let git = GitRepo::open(dir.path()).unwrap();
        let guard = git.hide_unstaged_changes().unwrap().unwrap();
        let patches: Vec<_> = fs::read_dir(dir.path().join(".git/prehook"))
            .unwrap()
            .collect();
        assert_eq!(patches.len(), 1);
        drop(guard);
    }
}
