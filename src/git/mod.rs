//! Version control integration for prehook
//!
//! Everything the hook engine needs to know about the working tree goes
//! through the [`VersionControl`] trait. Two backends implement it:
//!
//! - [`GitRepo`] - a real git repository, driven through git2
//! - [`FilesystemTree`] - a bare directory tree with no staging concept,
//!   where change detection is done by hashing file contents
//!
//! The backend is picked once by [`open`]; nothing downstream branches on it.

pub mod filesystem;
pub mod repository;
pub mod staged;
pub mod tree;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use filesystem::FilesystemTree;
pub use repository::GitRepo;
pub use staged::StagedFilesOnly;
pub use tree::TreeWalker;

/// Errors raised by a version control backend
#[derive(Debug, Error)]
pub enum VcsError {
    /// A git-only operation was requested from the filesystem backend
    #[error("`{operation}` is not supported without git")]
    UnsupportedInMode { operation: &'static str },

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },
}

impl VcsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VcsError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, VcsError>;

/// Working tree state at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffSnapshot {
    /// Unstaged diff text as produced by git; only compared for equality
    Text(Vec<u8>),
    /// Filename to hex SHA-384 digest of the full contents
    Digests(BTreeMap<String, String>),
}

/// Keys that differ between two digest snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileChanges {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl FileChanges {
    /// Three-way classification of `before` against `after`
    pub fn between(before: &BTreeMap<String, String>, after: &BTreeMap<String, String>) -> Self {
        let mut changes = FileChanges::default();
        for (name, digest) in before {
            match after.get(name) {
                Some(other) if other != digest => changes.changed.push(name.clone()),
                Some(_) => {}
                None => changes.removed.push(name.clone()),
            }
        }
        changes.added = after
            .keys()
            .filter(|name| !before.contains_key(*name))
            .cloned()
            .collect();
        changes
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Result of comparing the run-start checkpoint against the current tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointDiff {
    Files(FileChanges),
    Text { checkpoint: Vec<u8>, current: Vec<u8> },
}

impl CheckpointDiff {
    pub fn is_empty(&self) -> bool {
        match self {
            CheckpointDiff::Files(changes) => changes.is_empty(),
            CheckpointDiff::Text {
                checkpoint,
                current,
            } => checkpoint == current,
        }
    }
}

/// Capability interface over a git repository or a plain directory tree.
///
/// Paths handed out are relative to [`VersionControl::root`], using `/` as
/// separator.
pub trait VersionControl {
    /// Directory hooks run in and all paths are relative to
    fn root(&self) -> &Path;

    /// Every file known to the backend
    fn all_files(&self) -> Result<Vec<String>>;

    /// Files staged for the next commit
    fn staged_files(&self) -> Result<Vec<String>>;

    /// Files changed between the merge base of `origin` and `source`, and `origin`
    fn changed_files(&self, origin: &str, source: &str) -> Result<Vec<String>>;

    /// Files involved in an in-progress merge
    fn conflicted_files(&self) -> Result<Vec<String>>;

    fn is_in_merge_conflict(&self) -> Result<bool>;

    fn has_unmerged_paths(&self) -> Result<bool>;

    /// Whether the hook configuration file has modifications that are not staged
    fn has_unstaged_config(&self, config_file: &Path) -> Result<bool>;

    /// Fresh snapshot of the current working tree
    fn diff(&self) -> Result<DiffSnapshot>;

    /// Capture the run-start checkpoint
    fn set_diff_checkpoint(&mut self) -> Result<()>;

    /// Compare the checkpoint with a fresh snapshot. Requires a checkpoint.
    fn checkpointed_diff(&self) -> Result<CheckpointDiff>;

    fn has_checkpointed_diff(&self) -> Result<bool> {
        Ok(!self.checkpointed_diff()?.is_empty())
    }

    /// Human readable rendering of [`VersionControl::checkpointed_diff`]
    fn print_checkpointed_diff(&self, out: &mut dyn Write, use_color: bool) -> anyhow::Result<()>;

    /// Hide unstaged changes until the returned guard is dropped.
    ///
    /// `None` when there is nothing that could be hidden.
    fn hide_unstaged_changes(&self) -> Result<Option<StagedFilesOnly>>;

    fn git_dir(&self) -> Result<PathBuf>;

    /// Path of `name` inside the git directory
    fn git_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.git_dir()?.join(name))
    }

    fn remote_url(&self, remote: &str) -> Result<String>;

    /// Files added with `git add --intent-to-add`
    fn intent_to_add_files(&self) -> Result<Vec<String>>;

    /// Revision `HEAD` points at on `remote`
    fn head_rev(&self, remote: &str) -> Result<String>;

    fn commit(&self, message: &str) -> Result<()>;
}

/// Pick a backend. `without_git` selects the filesystem backend rooted at
/// `root` (default: current directory); otherwise the enclosing repository
/// is discovered from `root`.
pub fn open(without_git: bool, root: Option<&Path>) -> Result<Box<dyn VersionControl>> {
    let root = match root {
        // the CLI changes into the root afterwards
        Some(root) => std::path::absolute(root).map_err(|e| VcsError::io(root, e))?,
        None => std::env::current_dir().map_err(|e| VcsError::io(".", e))?,
    };

    if without_git {
        tracing::info!("Running without git in {}", root.display());
        Ok(Box::new(FilesystemTree::new(root)))
    } else {
        let repo = GitRepo::discover(&root)?;
        tracing::info!("Using git repository at {}", repo.root().display());
        Ok(Box::new(repo))
    }
}

/// Conflicted filenames listed in a `MERGE_MSG` file
pub fn parse_merge_msg_for_conflicts(merge_msg: &[u8]) -> Vec<String> {
    merge_msg
        .split(|b| *b == b'\n')
        // '#\t' since git 2.4.1
        .filter(|line| line.starts_with(b"\t") || line.starts_with(b"#\t"))
        .map(|line| {
            let line = String::from_utf8_lossy(line);
            line.trim_start_matches('#').trim().to_string()
        })
        .collect()
}
