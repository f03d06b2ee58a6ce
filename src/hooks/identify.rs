//! File type tagging
//!
//! Maps a path to a set of tags hooks can select on through `types` and
//! `exclude_types`: the file mode (`file`, `directory`, `symlink`), the
//! `executable` bit, `text`/`binary` content, and language tags derived from
//! the extension, well-known filenames, or the shebang line.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Bytes inspected to decide between text and binary
const SNIFF_LEN: usize = 1024;

pub type Tags = BTreeSet<String>;

/// Source of tags for a path
pub trait TagOracle {
    fn tags_for(&self, path: &Path) -> Result<Tags>;
}

/// Tags derived from the file itself
#[derive(Debug, Default, Clone, Copy)]
pub struct FileIdentifier;

impl TagOracle for FileIdentifier {
    fn tags_for(&self, path: &Path) -> Result<Tags> {
        tags_from_path(path)
    }
}

pub fn tags_from_path(path: &Path) -> Result<Tags> {
    let metadata = std::fs::symlink_metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?;

    let file_type = metadata.file_type();
    if file_type.is_symlink() {
        return Ok(tag_set(&["symlink"]));
    }
    if file_type.is_dir() {
        return Ok(tag_set(&["directory"]));
    }

    let mut tags = tag_set(&["file"]);
    let executable = is_executable(&metadata);
    tags.insert(if executable { "executable" } else { "non-executable" }.to_string());

    let head = read_head(path)?;
    let text = !content_inspector::inspect(&head).is_binary();
    tags.insert(if text { "text" } else { "binary" }.to_string());

    let by_name = tags_from_filename(path);
    if !by_name.is_empty() {
        tags.extend(by_name);
    } else if executable && text {
        tags.extend(tags_from_shebang(&head));
    }

    Ok(tags)
}

fn tag_set(tags: &[&str]) -> Tags {
    tags.iter().map(|t| t.to_string()).collect()
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    false
}

fn read_head(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(head)
}

/// Tags implied by the filename or its extension
pub fn tags_from_filename(path: &Path) -> Tags {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let special: &[&str] = match name.as_str() {
        "Dockerfile" => &["dockerfile"],
        "Makefile" | "makefile" | "GNUmakefile" => &["makefile"],
        "Cargo.lock" => &["toml"],
        "Pipfile" => &["toml"],
        "Gemfile" => &["ruby"],
        ".gitignore" | ".dockerignore" => &["gitignore"],
        ".gitmodules" | ".gitattributes" => &["gitconfig"],
        "LICENSE" | "COPYING" => &["plain-text"],
        _ => &[],
    };
    if !special.is_empty() {
        return tag_set(special);
    }

    let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
        return Tags::new();
    };
    let by_ext: &[&str] = match ext.as_str() {
        "py" | "pyi" => &["python"],
        "pyx" => &["cython"],
        "rs" => &["rust"],
        "go" => &["go"],
        "c" => &["c"],
        "h" => &["header", "c"],
        "cc" | "cpp" | "cxx" => &["c++"],
        "hpp" => &["header", "c++"],
        "java" => &["java"],
        "kt" => &["kotlin"],
        "rb" => &["ruby"],
        "js" | "mjs" | "cjs" => &["javascript"],
        "jsx" => &["jsx"],
        "ts" => &["ts"],
        "tsx" => &["tsx"],
        "sh" | "bash" => &["shell", "bash"],
        "zsh" => &["shell", "zsh"],
        "yaml" | "yml" => &["yaml"],
        "toml" => &["toml"],
        "json" => &["json"],
        "xml" => &["xml"],
        "html" | "htm" => &["html"],
        "css" => &["css"],
        "scss" => &["scss"],
        "md" | "markdown" => &["markdown"],
        "rst" => &["rst"],
        "txt" => &["plain-text"],
        "ini" | "cfg" => &["ini"],
        "sql" => &["sql"],
        "lua" => &["lua"],
        "pl" | "pm" => &["perl"],
        "php" => &["php"],
        "png" => &["image", "png"],
        "jpg" | "jpeg" => &["image", "jpeg"],
        "gif" => &["image", "gif"],
        "svg" => &["image", "svg", "xml"],
        "zip" => &["zip"],
        "gz" | "tgz" => &["gzip"],
        _ => &[],
    };
    tag_set(by_ext)
}

/// Tags for the interpreter named in a `#!` line
pub fn tags_from_shebang(head: &[u8]) -> Tags {
    let Some(rest) = head.strip_prefix(b"#!") else {
        return Tags::new();
    };
    let line = String::from_utf8_lossy(rest);
    let line = line.lines().next().unwrap_or_default();

    let mut words = line.split_whitespace();
    let Some(mut interpreter) = words.next().map(basename) else {
        return Tags::new();
    };
    if interpreter == "env" {
        // skip flags such as `env -S`
        match words.find(|w| !w.starts_with('-')) {
            Some(word) => interpreter = basename(word),
            None => return Tags::new(),
        }
    }

    let trimmed = interpreter.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.');
    let tags: &[&str] = match trimmed {
        "python" | "pypy" => &["python"],
        "sh" | "dash" => &["shell", "sh"],
        "bash" => &["shell", "bash"],
        "zsh" => &["shell", "zsh"],
        "ruby" => &["ruby"],
        "node" | "nodejs" => &["javascript"],
        "perl" => &["perl"],
        "lua" => &["lua"],
        _ => &[],
    };
    tag_set(tags)
}

fn basename(word: &str) -> &str {
    word.rsplit('/').next().unwrap_or(word)
}
