use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::path::PathBuf;

use crate::config::{DEFAULT_CONFIG_FILE, Stage};
use crate::git;
use crate::hooks::{self, RunOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn enabled(self) -> bool {
        match self {
            ColorMode::Auto => console::colors_enabled(),
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Only run the hook with this id or alias
    pub hook: Option<String>,

    /// Lifecycle stage to run hooks for
    #[arg(long, value_enum, default_value_t = Stage::Commit)]
    pub hook_stage: Stage,

    /// Run on these files (relative to the root) instead of the staged ones
    #[arg(long, num_args = 1..)]
    pub files: Vec<String>,

    /// Run on every file in the tree
    #[arg(short, long)]
    pub all_files: bool,

    /// Run on the files changed between ORIGIN and SOURCE (requires --source)
    #[arg(short, long, value_name = "REF")]
    pub origin: Option<String>,

    #[arg(short, long, value_name = "REF")]
    pub source: Option<String>,

    /// Commit message file, for the message stages
    #[arg(long, value_name = "PATH")]
    pub commit_msg_filename: Option<String>,

    /// Print the changes hooks made when the run fails
    #[arg(long)]
    pub show_diff_on_failure: bool,

    #[arg(long, value_enum, default_value = "auto")]
    pub color: ColorMode,

    /// Treat the root as a plain directory tree, even inside a repository
    #[arg(long)]
    pub without_git: bool,

    /// Directory to run in (default: the current directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Hook configuration file (default: .prehook.yaml in the root)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

pub async fn execute(args: RunArgs, verbose: bool) -> Result<i32> {
    // Resolve against the invocation directory before moving to the root
    let config = args
        .config
        .as_deref()
        .map(std::path::absolute)
        .transpose()
        .context("Failed to resolve the configuration path")?;

    let mut vcs = git::open(args.without_git, args.root.as_deref())
        .context("Failed to open the working tree")?;
    let root = vcs.root().to_path_buf();
    std::env::set_current_dir(&root)
        .with_context(|| format!("Failed to change directory to {}", root.display()))?;

    let opts = RunOptions {
        hook: args.hook,
        hook_stage: args.hook_stage,
        files: args.files,
        all_files: args.all_files,
        origin: args.origin,
        source: args.source,
        commit_msg_filename: args.commit_msg_filename,
        verbose,
        color: args.color.enabled(),
        show_diff_on_failure: args.show_diff_on_failure,
        config: config.unwrap_or_else(|| root.join(DEFAULT_CONFIG_FILE)),
    };
    tracing::debug!("Run options: {opts:?}");

    let skip = std::env::var("SKIP").unwrap_or_default();
    let mut out = std::io::stdout().lock();
    hooks::run(&mut *vcs, &opts, &skip, &mut out)
}
