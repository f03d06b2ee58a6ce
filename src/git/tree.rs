//! Recursive directory enumeration for the filesystem backend
//!
//! Roughly `find ROOT [-type d|f] -print`: never follows symbolic links,
//! visits directories top-down so pruned directories are never entered, and
//! filters every candidate against an optional gitignore-style file.

use ignore::gitignore::Gitignore;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::VcsError;

/// Builder-style walker over a filesystem tree
#[derive(Debug, Clone)]
pub struct TreeWalker {
    root: PathBuf,
    dirs: bool,
    files: bool,
    ignore_file: Option<PathBuf>,
    invert: bool,
    prune: HashSet<OsString>,
    sort: bool,
}

impl TreeWalker {
    /// Walk `root`, listing files only, sorted
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            dirs: false,
            files: true,
            ignore_file: None,
            invert: false,
            prune: HashSet::new(),
            sort: true,
        }
    }

    pub fn dirs(mut self, yes: bool) -> Self {
        self.dirs = yes;
        self
    }

    pub fn files(mut self, yes: bool) -> Self {
        self.files = yes;
        self
    }

    /// Match candidates against the patterns in this file.
    ///
    /// A missing file matches nothing.
    pub fn ignore_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.ignore_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Keep only ignored paths instead of only non-ignored ones
    pub fn invert(mut self, yes: bool) -> Self {
        self.invert = yes;
        self
    }

    /// Never descend into directories with this name
    pub fn prune<S: Into<OsString>>(mut self, name: S) -> Self {
        self.prune.insert(name.into());
        self
    }

    pub fn sort(mut self, yes: bool) -> Self {
        self.sort = yes;
        self
    }

    /// Enumerate the tree. Returned paths are prefixed with the root.
    pub fn walk(&self) -> Result<Vec<PathBuf>, VcsError> {
        let matcher = self.load_matcher();
        // Without an ignore file there is nothing to invert against.
        let invert = self.invert && matcher.is_some();

        let mut paths = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir() && self.prune.contains(entry.file_name()))
            });

        for entry in walker {
            let entry = entry?;
            let is_dir = is_directory(&entry);
            if (is_dir && !self.dirs) || (!is_dir && !self.files) {
                continue;
            }

            let ignored = matcher
                .as_ref()
                .is_some_and(|gi| is_ignored(gi, entry.path(), is_dir));
            if ignored == invert {
                paths.push(entry.into_path());
            }
        }

        if self.sort {
            paths.sort();
        }
        tracing::debug!("Walked {} entries under {}", paths.len(), self.root.display());
        Ok(paths)
    }

    fn load_matcher(&self) -> Option<Gitignore> {
        let path = self.ignore_file.as_ref()?;
        if !path.is_file() {
            return None;
        }
        let (matcher, err) = Gitignore::new(path);
        if let Some(err) = err {
            tracing::warn!("Problem reading {}: {}", path.display(), err);
        }
        Some(matcher)
    }
}

/// Symlinks to directories count as directories but are never descended into
fn is_directory(entry: &walkdir::DirEntry) -> bool {
    if entry.path_is_symlink() {
        return std::fs::metadata(entry.path()).is_ok_and(|m| m.is_dir());
    }
    entry.file_type().is_dir()
}

fn is_ignored(matcher: &Gitignore, path: &Path, is_dir: bool) -> bool {
    // Patterns are anchored at the ignore file's directory; anything outside
    // it cannot match.
    if !path.starts_with(matcher.path()) {
        return false;
    }
    matcher.matched_path_or_any_parents(path, is_dir).is_ignore()
}
