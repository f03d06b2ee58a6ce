//! Per-run file classification
//!
//! A [`Classifier`] is built once per run from the global candidate list and
//! shared by every hook. Tags are computed lazily and cached for the rest of
//! the run.

use anyhow::Result;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::Hook;
use super::identify::{FileIdentifier, TagOracle, Tags};
use crate::shared::patterns::filter_by_include_exclude;

pub struct Classifier {
    root: PathBuf,
    filenames: Vec<String>,
    oracle: Box<dyn TagOracle>,
    cache: RefCell<HashMap<String, Rc<Tags>>>,
}

impl Classifier {
    /// Keep the candidates that exist (symlinks included) under `root`
    pub fn new<P: AsRef<Path>>(root: P, filenames: Vec<String>) -> Self {
        Self::with_oracle(root, filenames, Box::new(FileIdentifier))
    }

    pub fn with_oracle<P: AsRef<Path>>(
        root: P,
        filenames: Vec<String>,
        oracle: Box<dyn TagOracle>,
    ) -> Self {
        let root = root.as_ref().to_path_buf();
        let filenames = filenames
            .into_iter()
            .filter(|name| std::fs::symlink_metadata(root.join(name)).is_ok())
            .collect();
        Self {
            root,
            filenames,
            oracle,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn filenames(&self) -> &[String] {
        &self.filenames
    }

    /// Tags of `filename`, asking the oracle at most once per file
    pub fn tags_for(&self, filename: &str) -> Result<Rc<Tags>> {
        if let Some(tags) = self.cache.borrow().get(filename) {
            return Ok(Rc::clone(tags));
        }
        let tags = Rc::new(self.oracle.tags_for(&self.root.join(filename))?);
        self.cache
            .borrow_mut()
            .insert(filename.to_string(), Rc::clone(&tags));
        Ok(tags)
    }

    /// Files whose tags include all of `types` and none of `exclude_types`
    pub fn by_types(
        &self,
        names: &[String],
        types: &[String],
        exclude_types: &[String],
    ) -> Result<Vec<String>> {
        let types: BTreeSet<&str> = types.iter().map(String::as_str).collect();
        let exclude_types: BTreeSet<&str> = exclude_types.iter().map(String::as_str).collect();

        let mut kept = Vec::new();
        for name in names {
            let tags = self.tags_for(name)?;
            let has_all = types.iter().all(|t| tags.contains(*t));
            let has_excluded = exclude_types.iter().any(|t| tags.contains(*t));
            if has_all && !has_excluded {
                kept.push(name.clone());
            }
        }
        Ok(kept)
    }

    /// The files `hook` should see
    pub fn filenames_for_hook(&self, hook: &Hook) -> Result<Vec<String>> {
        let names = filter_by_include_exclude(&self.filenames, &hook.files, &hook.exclude)?;
        self.by_types(&names, &hook.types, &hook.exclude_types)
    }
}
