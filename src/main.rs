use clap::Parser;
use dgramfs::configuration::config::{Args, ServerConfig};
use dgramfs::network::udp_server::UdpServer;
use log::{error, info};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    let config = match ServerConfig::resolve(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("unable to resolve configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "configuration resolved: bind {}, max {} session(s), {}s idle timeout",
        config.bind_addr(),
        config.max_sessions,
        config.session_timeout_secs
    );

    let server = match UdpServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            error!("unable to initialize server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!("server terminated with error: {}", e);
        std::process::exit(1);
    }
}
