use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    InvalidPort(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::InvalidPort(e) => write!(f, "Invalid port: {}", e),
            ConfigError::InvalidValue(e) => write!(f, "Invalid configuration value: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Fatal startup failures. Everything after a successful bind is translated
/// into a wire `ERR` response instead of surfacing here.
#[derive(Debug)]
pub enum ServerError {
    Config(ConfigError),
    BindError(std::io::Error),
    StorageSetup(std::io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Config(e) => write!(f, "Configuration error: {}", e),
            ServerError::BindError(e) => write!(f, "Socket bind error: {}", e),
            ServerError::StorageSetup(e) => write!(f, "Data directory setup error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<ConfigError> for ServerError {
    fn from(err: ConfigError) -> Self {
        ServerError::Config(err)
    }
}

/// Failures raised while executing a file command. Each variant maps onto a
/// stable wire `ERR` reason; none of them escapes the worker that produced it.
#[derive(Debug)]
pub enum CommandError {
    /// Resolved path would leave its sandbox root. The wire response never
    /// reveals whether the target exists elsewhere.
    PathEscape,
    NotFound,
    InvalidPayload,
    Usage(&'static str),
    UnknownCommand,
    IoError(std::io::Error),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::PathEscape => write!(f, "invalid path"),
            CommandError::NotFound => write!(f, "file not found"),
            CommandError::InvalidPayload => write!(f, "invalid upload payload (expected base64)"),
            CommandError::Usage(u) => write!(f, "usage: {}", u),
            CommandError::UnknownCommand => write!(f, "unrecognized command"),
            CommandError::IoError(e) => write!(f, "io failure ({})", e.kind()),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<std::io::Error> for CommandError {
    fn from(err: std::io::Error) -> Self {
        CommandError::IoError(err)
    }
}
