//! Traffic accounting and append-only log files.

pub mod log_sink;
pub mod traffic_monitor;

pub use log_sink::LogSink;
pub use traffic_monitor::TrafficMonitor;
