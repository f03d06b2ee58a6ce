//! Configuration management for prehook
//!
//! The hook configuration lives in a single file at the root of the tree
//! (`.prehook.yaml` by default). YAML, TOML and JSON are accepted.

pub mod core;

pub use core::{DEFAULT_CONFIG_FILE, HookDefinition, Language, RunConfig, Stage};
