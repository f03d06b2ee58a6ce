//! Process-backed hook invocation

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::process::Command;

use super::{HookCommand, HookEnv, HookOutput};
use crate::config::Language;

/// Runs a hook's `entry` as a child process in the repository root
#[derive(Debug, Clone)]
pub struct CommandHook {
    language: Language,
    entry: String,
    args: Vec<String>,
    root: PathBuf,
}

impl CommandHook {
    pub fn new(language: Language, entry: &str, args: Vec<String>, root: PathBuf) -> Self {
        Self {
            language,
            entry: entry.to_string(),
            args,
            root,
        }
    }

    fn resolve_program(&self, program: &str) -> Result<PathBuf> {
        match self.language {
            Language::Script => {
                let path = self.root.join(program);
                if !path.is_file() {
                    bail!("Script not found: {}", path.display());
                }
                Ok(path)
            }
            _ => which::which(program)
                .with_context(|| format!("Executable `{program}` not found on PATH")),
        }
    }

    /// `fail` hooks never spawn anything
    fn fail_output(&self, filenames: &[String]) -> HookOutput {
        let mut stdout = self.entry.clone().into_bytes();
        stdout.extend_from_slice(b"\n\n");
        for name in filenames {
            stdout.extend_from_slice(name.as_bytes());
            stdout.push(b'\n');
        }
        HookOutput {
            code: 1,
            stdout,
            stderr: Vec::new(),
        }
    }
}

impl HookCommand for CommandHook {
    fn run(&self, filenames: &[String], env: &HookEnv) -> Result<HookOutput> {
        if self.language == Language::Fail {
            return Ok(self.fail_output(filenames));
        }

        let mut words = self.entry.split_whitespace();
        let Some(program) = words.next() else {
            bail!("Hook entry is empty");
        };
        let program = self.resolve_program(program)?;

        tracing::debug!(
            "Running {} with {} file argument(s)",
            program.display(),
            filenames.len()
        );
        let output = Command::new(&program)
            .args(words)
            .args(&self.args)
            .args(filenames)
            .current_dir(&self.root)
            .envs(env.vars().iter().map(|(k, v)| (k, v)))
            .output()
            .with_context(|| format!("Failed to execute {}", program.display()))?;

        Ok(HookOutput {
            // killed by a signal counts as a failure
            code: output.status.code().unwrap_or(1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
