//! Error types shared across the server subsystems.

pub mod types;

pub use types::{CommandError, ConfigError, ServerError};
