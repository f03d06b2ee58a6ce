//! Helpers shared across the hook engine

pub mod patterns;
