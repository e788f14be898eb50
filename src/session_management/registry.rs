use super::session::Session;
use chrono::Utc;
use dashmap::DashMap;
use log::info;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of the admission check for an inbound datagram.
pub enum Admission {
    Existing(Arc<Session>),
    Admitted(Arc<Session>),
    /// Registry is at capacity; the caller replies busy and no session is
    /// created.
    Rejected,
}

/// Concurrent endpoint → session map with a global admission cap.
///
/// The admitted count is reserved with a compare-exchange before the insert
/// so concurrent arrivals from different new addresses can never push the
/// registry past `max_sessions`. Removal gives the slot back exactly once,
/// keyed off the map removal actually happening, so a reaper sweep racing a
/// client `/exit` cannot double-decrement.
pub struct SessionRegistry {
    sessions: DashMap<SocketAddr, Arc<Session>>,
    admitted: AtomicUsize,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            admitted: AtomicUsize::new(0),
            max_sessions,
        }
    }

    /// Returns the session for `addr`, admitting a new one when there is
    /// room.
    pub fn resolve_or_admit(&self, addr: SocketAddr) -> Admission {
        if let Some(existing) = self.sessions.get(&addr) {
            return Admission::Existing(Arc::clone(existing.value()));
        }

        // Reserve a slot before touching the map.
        let mut count = self.admitted.load(Ordering::Acquire);
        loop {
            if count >= self.max_sessions {
                return Admission::Rejected;
            }
            match self.admitted.compare_exchange_weak(
                count,
                count + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => count = observed,
            }
        }

        let session = Arc::new(Session::new(addr));
        match self.sessions.entry(addr) {
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&session));
                Admission::Admitted(session)
            }
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                // Another worker admitted this address first; give the
                // reserved slot back and use theirs.
                self.admitted.fetch_sub(1, Ordering::AcqRel);
                Admission::Existing(Arc::clone(entry.get()))
            }
        }
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<Arc<Session>> {
        self.sessions.get(addr).map(|s| Arc::clone(s.value()))
    }

    /// Removes a session. Idempotent: a missing address is a no-op and the
    /// admitted count is only decremented when something was removed.
    pub fn evict(&self, addr: &SocketAddr) -> bool {
        if self.sessions.remove(addr).is_some() {
            self.admitted.fetch_sub(1, Ordering::AcqRel);
            true
        } else {
            false
        }
    }

    /// Evicts every session idle for longer than `timeout` and returns the
    /// number removed. Expired addresses are collected before removal so the
    /// scan stays safe against concurrent handler mutation.
    pub fn evict_idle(&self, timeout: Duration) -> usize {
        let now = Utc::now();
        let timeout_millis = timeout.as_millis() as i64;
        let expired: Vec<SocketAddr> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_millis(now) > timeout_millis)
            .map(|entry| *entry.key())
            .collect();

        let mut removed = 0;
        for addr in expired {
            if self.evict(&addr) {
                info!("session {} evicted after idle timeout", addr);
                removed += 1;
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshot of the current sessions, for stats rendering.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}
