//! Command-line interface for prehook

pub mod commands;
pub mod output;

pub use commands::Cli;
