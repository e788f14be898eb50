//! Session tracking for the connectionless transport.
//!
//! A [`session::Session`] is created for each remote endpoint on its first
//! accepted datagram and lives until the idle reaper or an explicit `/exit`
//! removes it. The [`registry::SessionRegistry`] is the single source of
//! truth shared by the worker tasks and the reaper.

pub mod registry;
pub mod session;

use std::fmt;

/// Closed permission set assigned by the handshake.
///
/// The role token on the wire must match one of these names exactly
/// (case-insensitively); anything else is a handshake usage error rather
/// than a silent fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Admin,
    ReadOnly,
}

impl Permission {
    pub fn parse(token: &str) -> Option<Permission> {
        if token.eq_ignore_ascii_case("ADMIN") {
            Some(Permission::Admin)
        } else if token.eq_ignore_ascii_case("READ_ONLY") {
            Some(Permission::ReadOnly)
        } else {
            None
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Admin => write!(f, "ADMIN"),
            Permission::ReadOnly => write!(f, "READ_ONLY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Permission::parse("admin"), Some(Permission::Admin));
        assert_eq!(Permission::parse("ADMIN"), Some(Permission::Admin));
        assert_eq!(Permission::parse("read_only"), Some(Permission::ReadOnly));
    }

    #[test]
    fn test_parse_rejects_unknown_tokens() {
        assert_eq!(Permission::parse("READ"), None);
        assert_eq!(Permission::parse("root"), None);
        assert_eq!(Permission::parse(""), None);
    }
}
