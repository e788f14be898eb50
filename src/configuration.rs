//! Server configuration.
//!
//! Defaults mirror the constants the service has always shipped with; a TOML
//! file can override them, and command-line flags (or their environment
//! variables) override the file in turn.

pub mod config;

pub use config::{Args, ServerConfig};
