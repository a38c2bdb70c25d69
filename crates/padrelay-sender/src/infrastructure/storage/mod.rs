//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the sender's TOML file, falls back to
//! defaults on first run, and validates the sampling settings.

pub mod config;
