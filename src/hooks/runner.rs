//! Run orchestration: preflight checks, candidate resolution and the
//! sequential hook loop

use anyhow::{Context, Result, bail};
use console::Color;
use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use super::{Classifier, Hook, HookEnv};
use crate::cli::output::{
    FAILED, NO_FILES, PASSED, SKIPPED, hook_message, hook_start, paint, write_line,
};
use crate::config::{DEFAULT_CONFIG_FILE, RunConfig, Stage};
use crate::git::VersionControl;
use crate::shared::patterns::filter_by_include_exclude;

/// Room reserved on the hook line for `Passed` / `Failed`
const RESULT_LEN: usize = 6;

const MIN_COLS: usize = 80;

/// Everything a single invocation of `prehook run` was asked to do
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Only run the hook with this id or alias
    pub hook: Option<String>,
    pub hook_stage: Stage,
    pub files: Vec<String>,
    pub all_files: bool,
    pub origin: Option<String>,
    pub source: Option<String>,
    pub commit_msg_filename: Option<String>,
    pub verbose: bool,
    pub color: bool,
    pub show_diff_on_failure: bool,
    /// Hook configuration file
    pub config: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            hook: None,
            hook_stage: Stage::Commit,
            files: Vec::new(),
            all_files: false,
            origin: None,
            source: None,
            commit_msg_filename: None,
            verbose: false,
            color: false,
            show_diff_on_failure: false,
            config: PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }
}

impl RunOptions {
    /// An explicit file selection makes the whole tree visible to hooks
    fn no_stash(&self) -> bool {
        self.all_files || !self.files.is_empty()
    }
}

/// Hook ids and aliases listed in a `SKIP` value
pub fn get_skips(value: &str) -> HashSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|skip| !skip.is_empty())
        .map(str::to_string)
        .collect()
}

fn msg_start(hook: &Hook, verbose: bool) -> String {
    if verbose {
        format!("[{}] {}", hook.id, hook.name)
    } else {
        hook.name.clone()
    }
}

/// Report width: wide enough for the longest `name...(no files to check)
/// Skipped` line, never narrower than 80.
pub fn compute_cols(hooks: &[Hook], verbose: bool) -> usize {
    let name_len = hooks
        .iter()
        .map(|hook| msg_start(hook, verbose).chars().count())
        .max()
        .unwrap_or(0);

    let cols = name_len + 3 + NO_FILES.len() + 1 + SKIPPED.len();
    cols.max(MIN_COLS)
}

/// The global candidate set, before any exclusion
pub fn all_filenames(vcs: &dyn VersionControl, opts: &RunOptions) -> Result<Vec<String>> {
    if let (Some(origin), Some(source)) = (&opts.origin, &opts.source) {
        return Ok(vcs.changed_files(origin, source)?);
    }
    if opts.hook_stage.is_message_stage() {
        let Some(filename) = &opts.commit_msg_filename else {
            bail!(
                "--commit-msg-filename is required for the {} stage",
                opts.hook_stage
            );
        };
        return Ok(vec![filename.clone()]);
    }
    if !opts.files.is_empty() {
        return Ok(opts.files.clone());
    }
    if opts.all_files {
        return Ok(vcs.all_files()?);
    }
    if vcs.is_in_merge_conflict()? {
        return Ok(vcs.conflicted_files()?);
    }
    Ok(vcs.staged_files()?)
}

/// State shared by every hook of one run
struct Session<'a> {
    vcs: &'a dyn VersionControl,
    classifier: &'a Classifier,
    opts: &'a RunOptions,
    skips: &'a HashSet<String>,
    env: &'a HookEnv,
    cols: usize,
}

impl Session<'_> {
    /// Run one hook, reporting on `out`. Returns 0 on success, 1 on failure.
    fn run_hook(&self, hook: &Hook, out: &mut dyn Write) -> Result<i32> {
        let filenames = self.classifier.filenames_for_hook(hook)?;
        let start = msg_start(hook, self.opts.verbose);
        let use_color = self.opts.color;

        if self.skips.contains(&hook.id) || self.skips.contains(&hook.alias) {
            tracing::debug!("Skipping `{}` (SKIP)", hook.id);
            let line = hook_message(&start, "", SKIPPED, Color::Yellow, use_color, self.cols);
            out.write_all(line.as_bytes())?;
            return Ok(0);
        }
        if filenames.is_empty() && !hook.always_run {
            tracing::debug!("Skipping `{}`: no matching files", hook.id);
            let line = hook_message(&start, NO_FILES, SKIPPED, Color::Cyan, use_color, self.cols);
            out.write_all(line.as_bytes())?;
            return Ok(0);
        }

        write!(out, "{}", hook_start(&start, RESULT_LEN, self.cols))?;
        out.flush()?;

        let args: &[String] = if hook.pass_filenames { &filenames } else { &[] };
        tracing::debug!("Running `{}` on {} file(s)", hook.id, args.len());

        let diff_before = self.vcs.diff()?;
        let output = hook
            .run(args, self.env)
            .with_context(|| format!("Failed to run hook `{}` (from {})", hook.id, hook.src))?;
        let diff_after = self.vcs.diff()?;

        let modified = diff_before != diff_after;
        let failed = output.code != 0 || modified;
        let (status, color) = if failed {
            (FAILED, Color::Red)
        } else {
            (PASSED, Color::Green)
        };
        writeln!(out, "{}", paint(status, color, use_color))?;

        let has_output = !output.stdout.is_empty() || !output.stderr.is_empty();
        if (has_output || modified) && (failed || self.opts.verbose || hook.verbose) {
            writeln!(out, "hookid: {}\n", hook.id)?;

            if modified {
                write!(out, "Files were modified by this hook.")?;
                if has_output {
                    writeln!(out, " Additional output:")?;
                }
                writeln!(out)?;
            }

            for stream in [&output.stdout, &output.stderr] {
                let trimmed = stream.trim_ascii();
                if !trimmed.is_empty() {
                    write_line(out, trimmed, hook.log_file.as_deref())?;
                }
            }
            writeln!(out)?;
        }

        Ok(i32::from(failed))
    }
}

/// Run `hooks` in order against the candidate files. Returns the run result
/// (0 or 1).
pub fn run_hooks(
    vcs: &mut dyn VersionControl,
    config: &RunConfig,
    hooks: &[Hook],
    opts: &RunOptions,
    skips: &HashSet<String>,
    env: &HookEnv,
    out: &mut dyn Write,
) -> Result<i32> {
    vcs.set_diff_checkpoint()?;
    let vcs: &dyn VersionControl = vcs;

    let cols = compute_cols(hooks, opts.verbose);
    let filenames = all_filenames(vcs, opts)?;
    let filenames = filter_by_include_exclude(&filenames, "", &config.exclude)?;
    let classifier = Classifier::new(vcs.root(), filenames);
    tracing::debug!("{} candidate file(s)", classifier.filenames().len());

    let session = Session {
        vcs,
        classifier: &classifier,
        opts,
        skips,
        env,
        cols,
    };

    let mut retval = 0;
    for hook in hooks {
        retval |= session.run_hook(hook, out)?;
        if retval != 0 && config.fail_fast {
            tracing::debug!("fail_fast set, not starting remaining hooks");
            break;
        }
    }

    if retval != 0 && opts.show_diff_on_failure && vcs.has_checkpointed_diff()? {
        if opts.all_files {
            writeln!(
                out,
                "prehook hook(s) made changes.\n\
                 If you are seeing this message in CI, reproduce locally with: \
                 `prehook run --all-files`.\n\
                 To run `prehook` as part of git workflow, call it from a git hook."
            )?;
        }
        writeln!(out, "All changes made by hooks:")?;
        vcs.print_checkpointed_diff(out, opts.color)?;
    }

    Ok(retval)
}

/// Full `run` flow: preflight, staged-only scoping, configuration and hook
/// selection, then [`run_hooks`]. `skip` is the raw `SKIP` value.
pub fn run(
    vcs: &mut dyn VersionControl,
    opts: &RunOptions,
    skip: &str,
    out: &mut dyn Write,
) -> Result<i32> {
    if vcs.has_unmerged_paths()? {
        tracing::error!("Unmerged files.  Resolve before committing.");
        return Ok(1);
    }
    if opts.origin.is_some() != opts.source.is_some() {
        tracing::error!("Specify both --origin and --source.");
        return Ok(1);
    }
    if !opts.no_stash() && vcs.has_unstaged_config(&opts.config)? {
        tracing::error!(
            "Your prehook configuration is unstaged.\n`git add {}` to fix this.",
            opts.config.display()
        );
        return Ok(1);
    }

    let env = HookEnv::for_refs(opts.origin.as_deref(), opts.source.as_deref());

    // Restores the working tree when dropped, on every return below
    let _staged_only = if opts.no_stash() {
        None
    } else {
        vcs.hide_unstaged_changes()?
    };

    let config = RunConfig::load(&opts.config)?;
    let root = vcs.root().to_path_buf();
    let hooks: Vec<Hook> = config
        .hooks
        .iter()
        .map(|definition| Hook::from_definition(definition, "local", root.clone()))
        .filter(|hook| opts.hook.as_deref().is_none_or(|selector| hook.is_named(selector)))
        .filter(|hook| hook.stages.contains(&opts.hook_stage))
        .collect();

    if let Some(selector) = &opts.hook {
        if hooks.is_empty() {
            writeln!(out, "No hook with id `{selector}`")?;
            return Ok(1);
        }
    }

    let skips = get_skips(skip);
    run_hooks(vcs, &config, &hooks, opts, &skips, &env, out)
}
