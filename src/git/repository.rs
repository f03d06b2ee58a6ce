//! Git backend built on git2
//!
//! Queries go through libgit2. The two operations that talk to remotes or
//! need the user's git configuration (`ls-remote`, `commit`) shell out to the
//! system git.

use git2::{Diff, DiffFormat, DiffOptions, ErrorCode, IndexEntryExtendedFlag, Repository, Status};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{
    CheckpointDiff, DiffSnapshot, Result, StagedFilesOnly, VcsError, VersionControl,
    parse_merge_msg_for_conflicts,
};

/// Subdirectory of the git dir holding stashed patches
const PATCH_DIR: &str = "prehook";

pub struct GitRepo {
    repo: Repository,
    root: PathBuf,
    checkpoint: Option<Vec<u8>>,
}

impl GitRepo {
    /// Find the repository enclosing `path`
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_repository(Repository::discover(path)?)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_repository(Repository::open(path)?)
    }

    fn from_repository(repo: Repository) -> Result<Self> {
        let root = repo
            .workdir()
            .ok_or_else(|| git2::Error::from_str("Repository has no working directory"))?
            .to_path_buf();
        Ok(Self {
            repo,
            root,
            checkpoint: None,
        })
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Unstaged changes to tracked files as a binary-safe patch
    fn unstaged_patch(&self) -> Result<Vec<u8>> {
        let mut opts = DiffOptions::new();
        opts.show_binary(true).ignore_submodules(true);
        let diff = self.repo.diff_index_to_workdir(None, Some(&mut opts))?;
        patch_bytes(&diff)
    }

    fn head_tree(&self) -> Result<Option<git2::Tree<'_>>> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_tree()?)),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    fn run_git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| VcsError::io("git", e))?;

        if !output.status.success() {
            return Err(VcsError::Command {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Render a diff as patch text, including binary hunks
pub(crate) fn patch_bytes(diff: &Diff<'_>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            buf.push(line.origin() as u8);
        }
        buf.extend_from_slice(line.content());
        true
    })?;
    Ok(buf)
}

/// New-side paths of every delta that is not a deletion
fn surviving_paths(diff: &Diff<'_>) -> Vec<String> {
    diff.deltas()
        .filter(|delta| delta.status() != git2::Delta::Deleted)
        .filter_map(|delta| delta.new_file().path())
        .map(|path| path.to_string_lossy().into_owned())
        .collect()
}

impl VersionControl for GitRepo {
    fn root(&self) -> &Path {
        &self.root
    }

    fn all_files(&self) -> Result<Vec<String>> {
        let index = self.repo.index()?;
        let mut files: Vec<String> = index
            .iter()
            .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
            .collect();
        // conflicted paths appear once per stage
        files.dedup();
        Ok(files)
    }

    fn staged_files(&self) -> Result<Vec<String>> {
        let head = self.head_tree()?;
        let mut opts = DiffOptions::new();
        opts.include_typechange(true).ignore_submodules(true);
        let diff = self
            .repo
            .diff_tree_to_index(head.as_ref(), None, Some(&mut opts))?;
        let files = surviving_paths(&diff);
        tracing::debug!("Found {} staged files", files.len());
        Ok(files)
    }

    fn changed_files(&self, origin: &str, source: &str) -> Result<Vec<String>> {
        let new = self.repo.revparse_single(origin)?.peel_to_commit()?;
        let old = self.repo.revparse_single(source)?.peel_to_commit()?;
        let base = self.repo.merge_base(old.id(), new.id())?;
        let base_tree = self.repo.find_commit(base)?.tree()?;

        let diff = self
            .repo
            .diff_tree_to_tree(Some(&base_tree), Some(&new.tree()?), None)?;
        Ok(surviving_paths(&diff))
    }

    fn conflicted_files(&self) -> Result<Vec<String>> {
        tracing::info!("Checking merge-conflict files only.");
        let merge_msg_path = self.repo.path().join("MERGE_MSG");
        let merge_msg =
            std::fs::read(&merge_msg_path).map_err(|e| VcsError::io(&merge_msg_path, e))?;
        let mut files = parse_merge_msg_for_conflicts(&merge_msg);

        // Changes made after the merge; also catches conflicts resolved by
        // mixing both sides.
        let mut index = self.repo.index()?;
        let index_tree = self.repo.find_tree(index.write_tree()?)?;
        let merge_head = self.repo.revparse_single("MERGE_HEAD")?.peel_to_tree()?;
        let parents = [self.head_tree()?, Some(merge_head)];
        for parent in parents.iter().flatten() {
            let diff = self
                .repo
                .diff_tree_to_tree(Some(parent), Some(&index_tree), None)?;
            files.extend(surviving_paths(&diff));
        }

        files.sort();
        files.dedup();
        Ok(files)
    }

    fn is_in_merge_conflict(&self) -> Result<bool> {
        let git_dir = self.repo.path();
        Ok(git_dir.join("MERGE_MSG").exists() && git_dir.join("MERGE_HEAD").exists())
    }

    fn has_unmerged_paths(&self) -> Result<bool> {
        Ok(self.repo.index()?.has_conflicts())
    }

    fn has_unstaged_config(&self, config_file: &Path) -> Result<bool> {
        let path = self.relative(config_file);
        // outside the work tree there is nothing git could stage
        if path.is_absolute() {
            return Ok(false);
        }
        match self.repo.status_file(path) {
            Ok(status) => Ok(status.intersects(
                Status::WT_MODIFIED | Status::WT_DELETED | Status::WT_TYPECHANGE | Status::WT_RENAMED,
            )),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn diff(&self) -> Result<DiffSnapshot> {
        Ok(DiffSnapshot::Text(self.unstaged_patch()?))
    }

    fn set_diff_checkpoint(&mut self) -> Result<()> {
        self.checkpoint = Some(self.unstaged_patch()?);
        Ok(())
    }

    fn checkpointed_diff(&self) -> Result<CheckpointDiff> {
        let current = self.unstaged_patch()?;
        let checkpoint = self.checkpoint.clone().unwrap_or_else(|| current.clone());
        Ok(CheckpointDiff::Text {
            checkpoint,
            current,
        })
    }

    fn print_checkpointed_diff(&self, out: &mut dyn Write, use_color: bool) -> anyhow::Result<()> {
        let patch = self.unstaged_patch()?;
        for line in String::from_utf8_lossy(&patch).lines() {
            let styled = console::style(line).force_styling(use_color);
            let styled = if line.starts_with("+++") || line.starts_with("---") {
                styled.bold()
            } else if line.starts_with('+') {
                styled.green()
            } else if line.starts_with('-') {
                styled.red()
            } else if line.starts_with("@@") {
                styled.cyan()
            } else if line.starts_with("diff ") {
                styled.bold()
            } else {
                styled
            };
            writeln!(out, "{styled}")?;
        }
        Ok(())
    }

    fn hide_unstaged_changes(&self) -> Result<Option<StagedFilesOnly>> {
        StagedFilesOnly::acquire(self, &self.repo.path().join(PATCH_DIR)).map(Some)
    }

    fn git_dir(&self) -> Result<PathBuf> {
        Ok(self.repo.path().to_path_buf())
    }

    fn remote_url(&self, remote: &str) -> Result<String> {
        let remote = self.repo.find_remote(remote)?;
        remote
            .url()
            .map(str::to_string)
            .ok_or_else(|| git2::Error::from_str("Remote URL is not valid UTF-8").into())
    }

    fn intent_to_add_files(&self) -> Result<Vec<String>> {
        let index = self.repo.index()?;
        Ok(index
            .iter()
            .filter(|entry| {
                entry.flags_extended & IndexEntryExtendedFlag::INTENT_TO_ADD.bits() != 0
            })
            .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
            .collect())
    }

    fn head_rev(&self, remote: &str) -> Result<String> {
        let stdout = self.run_git(&["ls-remote", "--exit-code", remote, "HEAD"])?;
        stdout
            .split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or_else(|| VcsError::Command {
                command: format!("git ls-remote --exit-code {remote} HEAD"),
                stderr: "no HEAD reported".to_string(),
            })
    }

    fn commit(&self, message: &str) -> Result<()> {
        self.run_git(&["commit", "--no-edit", "--no-gpg-sign", "-n", "-m", message])?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use git2::Signature;
    use std::fs;
    use tempfile::TempDir;

    pub(crate) fn init_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    pub(crate) fn write(dir: &TempDir, name: &str, content: &str) {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub(crate) fn stage(repo: &Repository, names: &[&str]) {
        let mut index = repo.index().unwrap();
        for name in names {
            index.add_path(Path::new(name)).unwrap();
        }
        index.write().unwrap();
    }

    pub(crate) fn commit_index(repo: &Repository, message: &str) -> git2::Oid {
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let mut index = repo.index().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    #[test]
    fn test_staged_files() {
        let (dir, repo) = init_repo();
        write(&dir, "a.py", "print(1)\n");
        write(&dir, "b.txt", "b\n");
        stage(&repo, &["a.py"]);

        let git = GitRepo::open(dir.path()).unwrap();
        assert_eq!(git.staged_files().unwrap(), vec!["a.py"]);
    }

    #[test]
    fn test_all_files_lists_index() {
        let (dir, repo) = init_repo();
        write(&dir, "a.py", "");
        write(&dir, "sub/b.rs", "");
        write(&dir, "untracked.txt", "");
        stage(&repo, &["a.py", "sub/b.rs"]);
        commit_index(&repo, "initial");

        let git = GitRepo::open(dir.path()).unwrap();
        assert_eq!(git.all_files().unwrap(), vec!["a.py", "sub/b.rs"]);
    }

    #[test]
    fn test_unstaged_diff_detects_modification() {
        let (dir, repo) = init_repo();
        write(&dir, "a.py", "one\n");
        stage(&repo, &["a.py"]);
        commit_index(&repo, "initial");

        let mut git = GitRepo::open(dir.path()).unwrap();
        git.set_diff_checkpoint().unwrap();
        let before = git.diff().unwrap();
        assert!(!git.has_checkpointed_diff().unwrap());

        write(&dir, "a.py", "two lines\n");
        assert_ne!(git.diff().unwrap(), before);
        assert!(git.has_checkpointed_diff().unwrap());

        let mut rendered = Vec::new();
        git.print_checkpointed_diff(&mut rendered, false).unwrap();
        let rendered = String::from_utf8(rendered).unwrap();
        assert!(rendered.contains("-one"));
        assert!(rendered.contains("+two lines"));
    }

    #[test]
    fn test_unstaged_config_detection() {
        let (dir, repo) = init_repo();
        write(&dir, ".prehook.yaml", "hooks: []\n");
        stage(&repo, &[".prehook.yaml"]);
        commit_index(&repo, "initial");

        let git = GitRepo::open(dir.path()).unwrap();
        let config = dir.path().join(".prehook.yaml");
        assert!(!git.has_unstaged_config(&config).unwrap());

        write(&dir, ".prehook.yaml", "fail_fast: true\n");
        assert!(git.has_unstaged_config(&config).unwrap());

        stage(&repo, &[".prehook.yaml"]);
        assert!(!git.has_unstaged_config(&config).unwrap());
    }

    #[test]
    fn test_changed_files_between_refs() {
        let (dir, repo) = init_repo();
        write(&dir, "base.txt", "base\n");
        stage(&repo, &["base.txt"]);
        let base = commit_index(&repo, "base");

        write(&dir, "feature.py", "x = 1\n");
        stage(&repo, &["feature.py"]);
        let feature = commit_index(&repo, "feature");

        let git = GitRepo::open(dir.path()).unwrap();
        let files = git
            .changed_files(&feature.to_string(), &base.to_string())
            .unwrap();
        assert_eq!(files, vec!["feature.py"]);
    }

    /// A merge of a branch that touched `b.txt`, stopped after resolving:
    /// the index holds our side and `MERGE_MSG` lists `c.txt`.
    pub(crate) fn merge_in_progress(dir: &TempDir, repo: &Repository) {
        write(dir, "a.txt", "base\n");
        write(dir, "b.txt", "base\n");
        stage(repo, &["a.txt", "b.txt"]);
        let base = commit_index(repo, "base");
        let base = repo.find_commit(base).unwrap();

        let sig = Signature::now("Test", "test@example.com").unwrap();
        let mut builder = repo.treebuilder(Some(&base.tree().unwrap())).unwrap();
        builder
            .insert("b.txt", repo.blob(b"theirs\n").unwrap(), 0o100644)
            .unwrap();
        let tree = repo.find_tree(builder.write().unwrap()).unwrap();
        let theirs = repo
            .commit(None, &sig, &sig, "theirs", &tree, &[&base])
            .unwrap();

        write(dir, "a.txt", "ours\n");
        stage(repo, &["a.txt"]);
        commit_index(repo, "ours");

        fs::write(repo.path().join("MERGE_HEAD"), format!("{theirs}\n")).unwrap();
        fs::write(
            repo.path().join("MERGE_MSG"),
            "Merge branch 'theirs'\n\n# Conflicts:\n#\tc.txt\n",
        )
        .unwrap();
    }

    #[test]
    fn test_conflicted_files_during_merge() {
        let (dir, repo) = init_repo();
        merge_in_progress(&dir, &repo);

        let git = GitRepo::open(dir.path()).unwrap();
        assert!(git.is_in_merge_conflict().unwrap());
        assert!(!git.has_unmerged_paths().unwrap());
        // c.txt from MERGE_MSG; a.txt and b.txt differ from MERGE_HEAD
        assert_eq!(git.conflicted_files().unwrap(), vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[test]
    fn test_config_outside_work_tree_is_never_unstaged() {
        let (dir, repo) = init_repo();
        write(&dir, "a", "a");
        stage(&repo, &["a"]);
        commit_index(&repo, "initial");

        let elsewhere = TempDir::new().unwrap();
        let config = elsewhere.path().join("cfg.yaml");
        fs::write(&config, "hooks: []\n").unwrap();

        let git = GitRepo::open(dir.path()).unwrap();
        assert!(!git.has_unstaged_config(&config).unwrap());
    }

    #[test]
    fn test_no_merge_conflict_in_clean_repo() {
        let (dir, repo) = init_repo();
        write(&dir, "a", "a");
        stage(&repo, &["a"]);
        commit_index(&repo, "initial");

        let git = GitRepo::open(dir.path()).unwrap();
        assert!(!git.is_in_merge_conflict().unwrap());
        assert!(!git.has_unmerged_paths().unwrap());
    }

    #[test]
    fn test_remote_url_and_git_dir() {
        let (dir, repo) = init_repo();
        repo.remote("origin", "https://example.com/repo.git").unwrap();

        let git = GitRepo::open(dir.path()).unwrap();
        assert_eq!(git.remote_url("origin").unwrap(), "https://example.com/repo.git");
        assert!(git.git_dir().unwrap().ends_with(".git"));
        assert!(git.git_path("MERGE_MSG").unwrap().ends_with(".git/MERGE_MSG"));
        assert!(git.remote_url("missing").is_err());
    }
}
