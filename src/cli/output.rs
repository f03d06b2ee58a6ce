//! Terminal formatting for the hook report
//!
//! Every hook produces one line: its name, a run of dots and a colored
//! result, padded so the results line up in a single column.

use anyhow::{Context, Result};
use console::Color;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

pub const PASSED: &str = "Passed";
pub const FAILED: &str = "Failed";
pub const SKIPPED: &str = "Skipped";
pub const NO_FILES: &str = "(no files to check)";

/// Wrap `text` in the escape codes for `color` when `use_color` is set
pub fn paint(text: &str, color: Color, use_color: bool) -> String {
    console::style(text)
        .fg(color)
        .force_styling(use_color)
        .to_string()
}

fn width(text: &str) -> usize {
    text.chars().count()
}

/// `start` and the dots leading up to a result of `end_len` characters.
/// Written before a hook runs so slow hooks show what they are doing.
pub fn hook_start(start: &str, end_len: usize, cols: usize) -> String {
    let dots = cols.saturating_sub(width(start) + end_len + 1);
    format!("{start}{}", ".".repeat(dots))
}

/// A complete report line, newline included
pub fn hook_message(
    start: &str,
    postfix: &str,
    end_msg: &str,
    end_color: Color,
    use_color: bool,
    cols: usize,
) -> String {
    let dots = cols.saturating_sub(width(start) + width(postfix) + width(end_msg) + 1);
    format!(
        "{start}{}{postfix}{}\n",
        ".".repeat(dots),
        paint(end_msg, end_color, use_color)
    )
}

/// Write `line` to `out` and append it to `log_file` as well
pub fn write_line(out: &mut dyn Write, line: &[u8], log_file: Option<&Path>) -> Result<()> {
    out.write_all(line)?;
    out.write_all(b"\n")?;

    if let Some(path) = log_file {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        file.write_all(line)
            .and_then(|_| file.write_all(b"\n"))
            .with_context(|| format!("Failed to write log file {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hook_message_fills_columns() {
        let line = hook_message("Check", NO_FILES, SKIPPED, Color::Cyan, false, 80);
        assert_eq!(line.len(), 80);
        assert!(line.starts_with("Check....."));
        assert!(line.ends_with("...(no files to check)Skipped\n"));
    }

    #[test]
    fn test_hook_start_leaves_room_for_result() {
        let start = hook_start("Check", PASSED.len(), 80);
        assert_eq!(start.len() + PASSED.len() + 1, 80);
        assert!(start.ends_with('.'));
    }

    #[test]
    fn test_long_names_get_no_dots() {
        let name = "x".repeat(100);
        assert_eq!(hook_start(&name, 6, 80), name);
    }

    #[test]
    fn test_paint_respects_color_flag() {
        assert_eq!(paint(PASSED, Color::Green, false), "Passed");
        let colored = paint(PASSED, Color::Green, true);
        assert!(colored.contains("\u{1b}["));
        assert!(colored.contains("Passed"));
    }

    #[test]
    fn test_write_line_mirrors_to_log_file() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("hook.log");
        let mut out = Vec::new();

        write_line(&mut out, b"first", Some(&log)).unwrap();
        write_line(&mut out, b"second", Some(&log)).unwrap();
        write_line(&mut out, b"stdout only", None).unwrap();

        assert_eq!(out, b"first\nsecond\nstdout only\n");
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "first\nsecond\n");
    }
}
