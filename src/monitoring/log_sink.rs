use chrono::Utc;
use log::error;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only line sink over the logs directory.
///
/// Backs `messages.log` (one line per inbound message) and
/// `server_stats.txt` (one block per STATS snapshot). Write failures are
/// logged and swallowed; losing a log line must never fail a request.
pub struct LogSink {
    messages_file: PathBuf,
    stats_file: PathBuf,
}

impl LogSink {
    pub fn new(logs_dir: &Path) -> Result<Self, std::io::Error> {
        fs::create_dir_all(logs_dir)?;
        Ok(Self {
            messages_file: logs_dir.join("messages.log"),
            stats_file: logs_dir.join("server_stats.txt"),
        })
    }

    /// Appends one inbound message with timestamp and sender identity.
    pub fn log_message(&self, client_id: &str, addr: &str, message: &str) {
        let line = format!(
            "{} [{}@{}]: {}\n",
            Utc::now().to_rfc3339(),
            client_id,
            addr,
            message
        );
        append(&self.messages_file, &line);
    }

    /// Appends a stats snapshot.
    pub fn log_stats(&self, stats: &str) {
        append(&self.stats_file, stats);
        append(&self.stats_file, "\n");
    }
}

fn append(path: &Path, content: &str) {
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut f| f.write_all(content.as_bytes()));
    if let Err(e) = result {
        error!("failed to append to {}: {}", path.display(), e);
    }
}
