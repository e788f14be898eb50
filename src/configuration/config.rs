use crate::error_handling::types::ConfigError;
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Command-line arguments.
///
/// Every flag is optional; anything left unset falls back to the config file
/// (when `--config` is given) and then to the built-in defaults. Flags can
/// also be supplied through `DGRAMFS_*` environment variables.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "dgramfs")]
#[command(version)]
#[command(about = "A UDP file-service server with per-client sessions and roles")]
pub struct Args {
    /// Optional TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to bind the UDP socket to
    #[arg(long, env = "DGRAMFS_HOST")]
    pub host: Option<String>,

    /// Port to bind the UDP socket to
    #[arg(long, env = "DGRAMFS_PORT")]
    pub port: Option<u16>,

    /// Datagram buffer size in bytes
    #[arg(long, env = "DGRAMFS_BUFFER_SIZE")]
    pub buffer_size: Option<usize>,

    /// Maximum number of concurrently admitted sessions
    #[arg(long, env = "DGRAMFS_MAX_SESSIONS")]
    pub max_sessions: Option<usize>,

    /// Seconds of inactivity before a session is evicted
    #[arg(long, env = "DGRAMFS_SESSION_TIMEOUT_SECS")]
    pub session_timeout_secs: Option<u64>,

    /// Root directory for served files and the upload/download mirrors
    #[arg(long, env = "DGRAMFS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory for the message and stats logs
    #[arg(long, env = "DGRAMFS_LOGS_DIR")]
    pub logs_dir: Option<PathBuf>,
}

/// Resolved runtime configuration.
///
/// # Fields Overview
///
/// - `host` / `port`: UDP bind endpoint
/// - `buffer_size`: receive buffer size; datagrams that fill it are rejected
/// - `max_sessions`: admission cap for the session registry
/// - `session_timeout_secs`: idle threshold enforced by the reaper
/// - `reaper_interval_secs`: sweep cadence of the idle reaper
/// - `worker_pool_size`: bound on concurrently processed datagrams
/// - `data_dir`: parent of the three sandbox roots
/// - `logs_dir`: location of `messages.log` and `server_stats.txt`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub buffer_size: usize,
    pub max_sessions: usize,
    pub session_timeout_secs: u64,
    pub reaper_interval_secs: u64,
    pub worker_pool_size: usize,
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            buffer_size: 4096,
            max_sessions: 10,
            session_timeout_secs: 20,
            reaper_interval_secs: 5,
            worker_pool_size: 8,
            data_dir: PathBuf::from("data"),
            logs_dir: PathBuf::from("logs"),
        }
    }
}

impl ServerConfig {
    /// Loads the configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: ServerConfig =
            toml::from_str(&content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves the effective configuration: file (if any), then CLI/env
    /// overrides on top.
    pub fn resolve(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(host) = &args.host {
            config.host = host.clone();
        }
        if let Some(port) = args.port {
            config.port = port;
        }
        if let Some(buffer_size) = args.buffer_size {
            config.buffer_size = buffer_size;
        }
        if let Some(max_sessions) = args.max_sessions {
            config.max_sessions = max_sessions;
        }
        if let Some(timeout) = args.session_timeout_secs {
            config.session_timeout_secs = timeout;
        }
        if let Some(data_dir) = &args.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(logs_dir) = &args.logs_dir {
            config.logs_dir = logs_dir.clone();
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort("port must be non-zero".into()));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::InvalidValue("buffer_size must be non-zero".into()));
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::InvalidValue("max_sessions must be non-zero".into()));
        }
        if self.worker_pool_size == 0 {
            return Err(ConfigError::InvalidValue(
                "worker_pool_size must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn served_files_dir(&self) -> PathBuf {
        self.data_dir.join("server_files")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }
}
