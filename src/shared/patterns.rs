//! Pattern matching utilities
//!
//! Include/exclude filtering for candidate filenames. Both patterns are
//! regular expressions applied with search semantics: a match anywhere in the
//! path counts, nothing is anchored unless the pattern anchors itself.

use anyhow::{Context, Result};
use regex::Regex;

/// Keep the filenames matching `include` and not matching `exclude`.
///
/// The result preserves the input order.
pub fn filter_by_include_exclude<S: AsRef<str>>(
    names: &[S],
    include: &str,
    exclude: &str,
) -> Result<Vec<String>> {
    let include_re = Regex::new(include)
        .with_context(|| format!("Invalid include pattern: {include}"))?;
    let exclude_re = Regex::new(exclude)
        .with_context(|| format!("Invalid exclude pattern: {exclude}"))?;

    Ok(names
        .iter()
        .map(AsRef::<str>::as_ref)
        .filter(|name| include_re.is_match(name) && !exclude_re.is_match(name))
        .map(str::to_string)
        .collect())
}
