use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

pub const DEFAULT_CONFIG_FILE: &str = ".prehook.yaml";

/// Lifecycle point at which hooks may run
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Commit,
    MergeCommit,
    PrepareCommitMsg,
    CommitMsg,
    PostCheckout,
    PostCommit,
    PostMerge,
    PostRewrite,
    Push,
    Manual,
}

impl Stage {
    pub const ALL: [Stage; 10] = [
        Stage::Commit,
        Stage::MergeCommit,
        Stage::PrepareCommitMsg,
        Stage::CommitMsg,
        Stage::PostCheckout,
        Stage::PostCommit,
        Stage::PostMerge,
        Stage::PostRewrite,
        Stage::Push,
        Stage::Manual,
    ];

    fn all() -> Vec<Stage> {
        Self::ALL.to_vec()
    }

    /// Stages that operate on the commit message file instead of the tree
    pub fn is_message_stage(self) -> bool {
        matches!(self, Stage::PrepareCommitMsg | Stage::CommitMsg)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Commit => "commit",
            Stage::MergeCommit => "merge-commit",
            Stage::PrepareCommitMsg => "prepare-commit-msg",
            Stage::CommitMsg => "commit-msg",
            Stage::PostCheckout => "post-checkout",
            Stage::PostCommit => "post-commit",
            Stage::PostMerge => "post-merge",
            Stage::PostRewrite => "post-rewrite",
            Stage::Push => "push",
            Stage::Manual => "manual",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a hook's `entry` is turned into a process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Executable looked up on `PATH`
    #[default]
    System,
    /// Executable relative to the repository root
    Script,
    /// Always fails, printing `entry` and the offending files
    Fail,
}

/// One hook as written in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookDefinition {
    pub id: String,

    /// Display name, defaults to the id
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub alias: String,

    #[serde(default)]
    pub entry: String,

    #[serde(default)]
    pub language: Language,

    #[serde(default)]
    pub args: Vec<String>,

    /// Include pattern (regex, search semantics)
    #[serde(default)]
    pub files: String,

    /// Exclude pattern (regex, search semantics)
    #[serde(default = "default_exclude")]
    pub exclude: String,

    #[serde(default = "default_types")]
    pub types: Vec<String>,

    #[serde(default)]
    pub exclude_types: Vec<String>,

    #[serde(default)]
    pub always_run: bool,

    #[serde(default = "default_true")]
    pub pass_filenames: bool,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default = "Stage::all")]
    pub stages: Vec<Stage>,

    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

/// Run-level settings plus the configured hooks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Global exclude pattern applied before any hook filtering
    #[serde(default = "default_exclude")]
    pub exclude: String,

    /// Stop after the first failing hook
    #[serde(default)]
    pub fail_fast: bool,

    #[serde(default)]
    pub hooks: Vec<HookDefinition>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            exclude: default_exclude(),
            fail_fast: false,
            hooks: Vec::new(),
        }
    }
}

fn default_exclude() -> String {
    "^$".to_string()
}

fn default_types() -> Vec<String> {
    vec!["file".to_string()]
}

fn default_true() -> bool {
    true
}

impl RunConfig {
    /// Load `path` on top of the embedded defaults; `PREHOOK_*` environment
    /// variables override both.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("No configuration file found at {}", path.display());
        }

        tracing::debug!("Loading configuration from {}", path.display());
        Self::figment(path)
            .extract()
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    fn figment(path: &Path) -> Figment {
        let figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => figment.merge(Toml::file(path)),
        };

        // Environment variables always have highest priority
        figment.merge(Env::prefixed("PREHOOK_").only(&["exclude", "fail_fast"]))
    }
}

impl HookDefinition {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}
