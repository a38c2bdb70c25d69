//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the receiver's TOML file from an explicit
//! path or from the platform config directory, falls back to defaults when
//! the file does not exist yet, and validates the result before any socket
//! is bound.

pub mod config;
