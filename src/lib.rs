pub mod configuration;
pub mod error_handling;
pub mod files;
pub mod monitoring;
pub mod network;
pub mod protocol;
pub mod session_management;

pub use configuration::config::ServerConfig;
pub use network::udp_server::UdpServer;
pub use session_management::Permission;
