use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

pub mod run;
pub mod version;

#[derive(Parser)]
#[command(
    name = "prehook",
    version = env!("CARGO_PKG_VERSION"),
    about = "Run pre-commit style hooks, with or without git",
    long_about = "prehook runs the checks configured in .prehook.yaml against staged, \
                  changed or all files, reporting every hook as Passed, Failed or Skipped."
)]
pub struct Cli {
    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the configured hooks
    Run(run::RunArgs),
    /// Show version information
    Version(version::VersionArgs),
}

impl Cli {
    /// Execute the selected command, returning the process exit code
    pub async fn run(self) -> Result<i32> {
        setup_logging(self.verbose, self.quiet);

        match self.command {
            Some(Commands::Run(args)) => run::execute(args, self.verbose > 0).await,
            Some(Commands::Version(args)) => version::execute(args).await,
            None => {
                Cli::command().print_help()?;
                Ok(0)
            }
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    // Preflight rejections are logged as errors, keep those even when quiet
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match (quiet, verbose) {
            (true, _) => tracing_subscriber::EnvFilter::new("error"),
            (false, 0) => tracing_subscriber::EnvFilter::new("warn"),
            (false, 1) => tracing_subscriber::EnvFilter::new("info,ignore=warn,globset=warn"),
            (false, 2) => tracing_subscriber::EnvFilter::new("debug,ignore=warn,globset=warn"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    // stdout carries the hook report
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
