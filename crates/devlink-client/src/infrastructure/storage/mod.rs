//! Storage infrastructure: the agent's configuration file.
//!
//! The `config` sub-module reads the TOML file from the platform config
//! directory, falls back to defaults when it does not exist yet, and writes
//! it back when asked.

pub mod config;
