//! # prehook
//!
//! Runs pre-commit style hooks against the files of a git repository, or of
//! a plain directory tree when git is not available.
//!
//! ```bash
//! # Check staged files
//! prehook run
//!
//! # Check everything, outside of any repository
//! prehook run --all-files --without-git
//! ```

pub mod cli;
pub mod config;
pub mod git;
pub mod hooks;
pub mod shared;

pub use cli::Cli;
pub use config::RunConfig;

/// Result type alias for prehook operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
