//! Filesystem backend: a directory tree without git
//!
//! There is no index here, so staged/changed/conflicted queries are empty and
//! change detection hashes every file with SHA-384. Operations that only make
//! sense inside a repository fail with [`VcsError::UnsupportedInMode`].

use sha2::{Digest, Sha384};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::{
    CheckpointDiff, DiffSnapshot, FileChanges, Result, StagedFilesOnly, TreeWalker, VcsError,
    VersionControl,
};

const BUFFER_SIZE: usize = 8 * 1024;

/// Directory never descended into when listing files
const METADATA_DIR: &str = ".git";

const IGNORE_FILE: &str = ".gitignore";

#[derive(Debug)]
pub struct FilesystemTree {
    root: PathBuf,
    checkpoint: Option<BTreeMap<String, String>>,
}

impl FilesystemTree {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            checkpoint: None,
        }
    }

    /// Digest of every file currently listed by [`VersionControl::all_files`].
    ///
    /// TODO: short-circuit on unchanged size+mtime before rehashing; this runs
    /// twice per hook.
    fn digests(&self) -> Result<BTreeMap<String, String>> {
        self.all_files()?
            .into_iter()
            .map(|name| {
                let digest = hash_file(&self.root.join(&name))?;
                Ok((name, digest))
            })
            .collect()
    }

    fn changes_since_checkpoint(&self) -> Result<FileChanges> {
        let current = self.digests()?;
        let checkpoint = self.checkpoint.as_ref().unwrap_or(&current);
        Ok(FileChanges::between(checkpoint, &current))
    }

    fn unsupported<T>(operation: &'static str) -> Result<T> {
        Err(VcsError::UnsupportedInMode { operation })
    }
}

/// Hex SHA-384 of the full file contents
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| VcsError::io(path, e))?;
    let mut hasher = Sha384::new();
    let mut buffer = [0_u8; BUFFER_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| VcsError::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

impl VersionControl for FilesystemTree {
    fn root(&self) -> &Path {
        &self.root
    }

    fn all_files(&self) -> Result<Vec<String>> {
        let paths = TreeWalker::new(&self.root)
            .prune(METADATA_DIR)
            .ignore_file(self.root.join(IGNORE_FILE))
            .walk()?;

        Ok(paths
            .iter()
            .filter_map(|path| path.strip_prefix(&self.root).ok())
            .map(|rel| rel.to_string_lossy().into_owned())
            .collect())
    }

    fn staged_files(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn changed_files(&self, _origin: &str, _source: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn conflicted_files(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn is_in_merge_conflict(&self) -> Result<bool> {
        Ok(false)
    }

    fn has_unmerged_paths(&self) -> Result<bool> {
        Ok(false)
    }

    fn has_unstaged_config(&self, _config_file: &Path) -> Result<bool> {
        Ok(false)
    }

    fn diff(&self) -> Result<DiffSnapshot> {
        Ok(DiffSnapshot::Digests(self.digests()?))
    }

    fn set_diff_checkpoint(&mut self) -> Result<()> {
        self.checkpoint = Some(self.digests()?);
        Ok(())
    }

    fn checkpointed_diff(&self) -> Result<CheckpointDiff> {
        Ok(CheckpointDiff::Files(self.changes_since_checkpoint()?))
    }

    fn print_checkpointed_diff(&self, out: &mut dyn Write, use_color: bool) -> anyhow::Result<()> {
        let changes = self.changes_since_checkpoint()?;

        let sections = [
            ("added", &changes.added, console::Color::Green),
            ("removed", &changes.removed, console::Color::Red),
            ("changed", &changes.changed, console::Color::Yellow),
        ];
        for (label, names, color) in sections {
            if names.is_empty() {
                continue;
            }
            writeln!(out, "{label}:")?;
            for name in names {
                let styled = console::style(name).fg(color).force_styling(use_color);
                writeln!(out, "    {styled}")?;
            }
        }
        Ok(())
    }

    fn hide_unstaged_changes(&self) -> Result<Option<StagedFilesOnly>> {
        Ok(None)
    }

    fn git_dir(&self) -> Result<PathBuf> {
        Self::unsupported("git_dir")
    }

    fn git_path(&self, _name: &str) -> Result<PathBuf> {
        Self::unsupported("git_path")
    }

    fn remote_url(&self, _remote: &str) -> Result<String> {
        Self::unsupported("remote_url")
    }

    fn intent_to_add_files(&self) -> Result<Vec<String>> {
        Self::unsupported("intent_to_add_files")
    }

    fn head_rev(&self, _remote: &str) -> Result<String> {
        Self::unsupported("head_rev")
    }

    fn commit(&self, _message: &str) -> Result<()> {
        Self::unsupported("commit")
    }
}
