//! Hook execution engine
//!
//! A run resolves the candidate files once, classifies them with a shared
//! [`Classifier`], then drives every selected [`Hook`] in order:
//!
//! - hooks listed in `SKIP` are reported as skipped and never invoked
//! - hooks with no matching files are skipped unless `always_run` is set
//! - a hook that leaves the tree different from how it found it fails, even
//!   when it exits 0
//!
//! ```yaml
//! fail_fast: false
//! hooks:
//!   - id: rustfmt
//!     entry: rustfmt --check
//!     types: [rust]
//!   - id: no-todo
//!     name: Forbid TODO files
//!     language: fail
//!     entry: TODO files are not allowed
//!     files: TODO
//! ```

pub mod classifier;
pub mod command;
pub mod identify;
pub mod runner;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{HookDefinition, Language, Stage};

pub use classifier::Classifier;
pub use command::CommandHook;
pub use runner::{RunOptions, run, run_hooks};

/// What a hook invocation produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookOutput {
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Environment variables handed to every hook of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookEnv {
    vars: Vec<(String, String)>,
}

impl HookEnv {
    /// `PRE_COMMIT_ORIGIN` / `PRE_COMMIT_SOURCE`, only when both refs are known
    pub fn for_refs(origin: Option<&str>, source: Option<&str>) -> Self {
        let vars = match (origin, source) {
            (Some(origin), Some(source)) => vec![
                ("PRE_COMMIT_ORIGIN".to_string(), origin.to_string()),
                ("PRE_COMMIT_SOURCE".to_string(), source.to_string()),
            ],
            _ => Vec::new(),
        };
        Self { vars }
    }

    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Something a hook can execute.
///
/// `Err` is reserved for environment faults (missing executable, spawn
/// failure); a failing check is reported through [`HookOutput::code`].
pub trait HookCommand {
    fn run(&self, filenames: &[String], env: &HookEnv) -> Result<HookOutput>;
}

/// A configured check, ready to run
#[derive(Clone)]
pub struct Hook {
    pub id: String,
    pub alias: String,
    pub name: String,
    pub files: String,
    pub exclude: String,
    pub types: Vec<String>,
    pub exclude_types: Vec<String>,
    pub always_run: bool,
    pub pass_filenames: bool,
    pub verbose: bool,
    pub stages: Vec<Stage>,
    pub language: Language,
    /// Where the hook came from, for messages
    pub src: String,
    pub log_file: Option<PathBuf>,
    command: Arc<dyn HookCommand>,
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

impl Hook {
    /// A hook with default filters: every file, every stage
    pub fn new(id: &str, name: &str, command: Arc<dyn HookCommand>) -> Self {
        Self {
            id: id.to_string(),
            alias: String::new(),
            name: name.to_string(),
            files: String::new(),
            exclude: "^$".to_string(),
            types: vec!["file".to_string()],
            exclude_types: Vec::new(),
            always_run: false,
            pass_filenames: true,
            verbose: false,
            stages: Stage::ALL.to_vec(),
            language: Language::System,
            src: "local".to_string(),
            log_file: None,
            command,
        }
    }

    /// Build a process-backed hook from its configuration
    pub fn from_definition(definition: &HookDefinition, src: &str, root: PathBuf) -> Self {
        let command = CommandHook::new(
            definition.language,
            &definition.entry,
            definition.args.clone(),
            root,
        );
        Self {
            id: definition.id.clone(),
            alias: definition.alias.clone(),
            name: definition.display_name().to_string(),
            files: definition.files.clone(),
            exclude: definition.exclude.clone(),
            types: definition.types.clone(),
            exclude_types: definition.exclude_types.clone(),
            always_run: definition.always_run,
            pass_filenames: definition.pass_filenames,
            verbose: definition.verbose,
            stages: definition.stages.clone(),
            language: definition.language,
            src: src.to_string(),
            log_file: definition
                .log_file
                .clone()
                .filter(|path| !path.as_os_str().is_empty()),
            command: Arc::new(command),
        }
    }

    /// Whether `selector` names this hook by id or alias
    pub fn is_named(&self, selector: &str) -> bool {
        self.id == selector || (!self.alias.is_empty() && self.alias == selector)
    }

    pub fn run(&self, filenames: &[String], env: &HookEnv) -> Result<HookOutput> {
        self.command.run(filenames, env)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_env_requires_both_refs() {
        assert!(HookEnv::for_refs(Some("a"), None).vars().is_empty());
        assert!(HookEnv::for_refs(None, Some("b")).vars().is_empty());

        let env = HookEnv::for_refs(Some("a"), Some("b"));
        assert_eq!(env.get("PRE_COMMIT_ORIGIN"), Some("a"));
        assert_eq!(env.get("PRE_COMMIT_SOURCE"), Some("b"));
    }

    #[test]
    fn test_hook_from_definition() {
        let definition: HookDefinition = serde_json::from_value(serde_json::json!({
            "id": "fmt",
            "alias": "format",
            "entry": "rustfmt --check",
            "types": ["rust"],
        }))
        .unwrap();

        let hook = Hook::from_definition(&definition, "local", PathBuf::from("."));
        assert_eq!(hook.name, "fmt");
        assert!(hook.is_named("fmt"));
        assert!(hook.is_named("format"));
        assert!(!hook.is_named(""));
        assert_eq!(hook.types, vec!["rust"]);
    }
}
