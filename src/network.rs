//! UDP transport and the per-datagram dispatcher.

pub mod udp_server;

pub use udp_server::UdpServer;
