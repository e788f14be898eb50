use super::Permission;
use chrono::{DateTime, TimeZone, Utc};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::RwLock;

/// Identity established by the handshake.
///
/// Mutated only by a successful `HELLO`; a re-handshake overwrites the
/// previous values (last-write-wins).
#[derive(Debug, Clone)]
pub struct Identity {
    pub client_id: String,
    pub permission: Permission,
    pub authenticated: bool,
}

/// Per-endpoint state tracked across datagrams.
///
/// The address is immutable and doubles as the registry key. Counters are
/// independent atomics so concurrent workers handling packets from the same
/// endpoint never contend on a session-wide lock.
pub struct Session {
    addr: SocketAddr,
    identity: RwLock<Identity>,
    last_active: AtomicI64,
    messages: AtomicU64,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
}

impl Session {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            identity: RwLock::new(Identity {
                client_id: "unknown".to_string(),
                permission: Permission::ReadOnly,
                authenticated: false,
            }),
            last_active: AtomicI64::new(Utc::now().timestamp_millis()),
            messages: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn identity(&self) -> Identity {
        self.identity.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity().authenticated
    }

    pub fn permission(&self) -> Permission {
        self.identity().permission
    }

    /// Applies a successful handshake.
    pub fn authenticate(&self, client_id: String, permission: Permission) {
        let mut identity = self.identity.write().unwrap_or_else(|e| e.into_inner());
        identity.client_id = client_id;
        identity.permission = permission;
        identity.authenticated = true;
    }

    /// Marks activity for the idle reaper.
    pub fn touch(&self) {
        self.last_active
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        let millis = self.last_active.load(Ordering::Relaxed);
        Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now)
    }

    pub fn idle_millis(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp_millis() - self.last_active.load(Ordering::Relaxed)
    }

    pub fn record_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn messages(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub fn set_last_active(&self, when: DateTime<Utc>) {
        self.last_active
            .store(when.timestamp_millis(), Ordering::Relaxed);
    }
}
