use crate::session_management::registry::SessionRegistry;
use chrono::Utc;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregate byte counters, independent of the per-session ones.
///
/// `record_received`/`record_sent` run on every datagram in and every
/// response out. `build_stats` reads each counter atomically; it never
/// blocks concurrent updates, so the snapshot is consistent per field
/// rather than across fields.
pub struct TrafficMonitor {
    total_bytes_received: AtomicU64,
    total_bytes_sent: AtomicU64,
}

impl TrafficMonitor {
    pub fn new() -> Self {
        Self {
            total_bytes_received: AtomicU64::new(0),
            total_bytes_sent: AtomicU64::new(0),
        }
    }

    pub fn record_received(&self, bytes: u64) {
        self.total_bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_sent(&self, bytes: u64) {
        self.total_bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn total_bytes_received(&self) -> u64 {
        self.total_bytes_received.load(Ordering::Relaxed)
    }

    pub fn total_bytes_sent(&self) -> u64 {
        self.total_bytes_sent.load(Ordering::Relaxed)
    }

    /// Renders the human-readable stats snapshot.
    pub fn build_stats(&self, registry: &SessionRegistry) -> String {
        let sessions = registry.sessions();
        let mut out = String::new();
        out.push_str("==== SERVER STATS ====\n");
        let _ = writeln!(out, "Timestamp: {}", Utc::now().to_rfc3339());
        let _ = writeln!(out, "Active sessions: {}", sessions.len());
        let _ = writeln!(out, "Total bytes received: {}", self.total_bytes_received());
        let _ = writeln!(out, "Total bytes sent: {}", self.total_bytes_sent());
        out.push('\n');

        for session in sessions {
            let identity = session.identity();
            let _ = writeln!(out, "Client: {}", identity.client_id);
            let _ = writeln!(out, "  Address: {}", session.addr());
            let _ = writeln!(out, "  Permission: {}", identity.permission);
            let _ = writeln!(out, "  Last active: {}", session.last_active().to_rfc3339());
            let _ = writeln!(out, "  Messages: {}", session.messages());
            let _ = writeln!(out, "  Bytes received: {}", session.bytes_received());
            let _ = writeln!(out, "  Bytes sent: {}", session.bytes_sent());
            out.push('\n');
        }
        out
    }
}

impl Default for TrafficMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_management::registry::Admission;
    use crate::session_management::Permission;

    #[test]
    fn test_totals_accumulate() {
        let monitor = TrafficMonitor::new();
        monitor.record_received(100);
        monitor.record_received(50);
        monitor.record_sent(30);
        assert_eq!(monitor.total_bytes_received(), 150);
        assert_eq!(monitor.total_bytes_sent(), 30);
    }

    #[test]
    fn test_build_stats_includes_sessions() {
        let monitor = TrafficMonitor::new();
        let registry = SessionRegistry::new(4);
        let session = match registry.resolve_or_admit("127.0.0.1:4001".parse().unwrap()) {
            Admission::Admitted(s) => s,
            _ => panic!("expected admission"),
        };
        session.authenticate("client7".into(), Permission::Admin);
        session.record_message();
        monitor.record_received(42);

        let stats = monitor.build_stats(&registry);
        assert!(stats.starts_with("==== SERVER STATS ====\n"));
        assert!(stats.contains("Active sessions: 1"));
        assert!(stats.contains("Total bytes received: 42"));
        assert!(stats.contains("Client: client7"));
        assert!(stats.contains("  Address: 127.0.0.1:4001"));
        assert!(stats.contains("  Permission: ADMIN"));
        assert!(stats.contains("  Messages: 1"));
    }
}
