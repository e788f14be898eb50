use crate::configuration::config::ServerConfig;
use crate::error_handling::types::{CommandError, ServerError};
use crate::files::command_handler::FileCommandHandler;
use crate::monitoring::log_sink::LogSink;
use crate::monitoring::traffic_monitor::TrafficMonitor;
use crate::protocol::command::{parse_handshake, FileCommand};
use crate::protocol::response::Response;
use crate::protocol::{CMD_EXIT, CMD_HELLO, CMD_STATS, COMMAND_SENTINEL};
use crate::session_management::registry::{Admission, SessionRegistry};
use crate::session_management::session::Session;
use crate::session_management::Permission;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Semaphore;

/// The server core: receive loop, dispatcher and idle reaper.
///
/// One task reads datagrams and hands each to a worker task; the worker
/// count is bounded by a semaphore sized from the configuration. The reaper
/// runs beside them for the lifetime of the process. All shared state
/// (registry, monitor, handler, sink) is behind `Arc` and safe for
/// concurrent workers.
pub struct UdpServer {
    config: ServerConfig,
    registry: Arc<SessionRegistry>,
    monitor: Arc<TrafficMonitor>,
    handler: Arc<FileCommandHandler>,
    sink: Arc<LogSink>,
}

impl UdpServer {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let handler = FileCommandHandler::new(
            config.served_files_dir(),
            config.uploads_dir(),
            config.downloads_dir(),
        )
        .map_err(ServerError::StorageSetup)?;
        let sink = LogSink::new(&config.logs_dir).map_err(ServerError::StorageSetup)?;

        Ok(Self {
            registry: Arc::new(SessionRegistry::new(config.max_sessions)),
            monitor: Arc::new(TrafficMonitor::new()),
            handler: Arc::new(handler),
            sink: Arc::new(sink),
            config,
        })
    }

    /// Binds the socket and runs until the process is stopped. Only the bind
    /// itself can fail; everything later is answered on the wire.
    pub async fn run(self) -> Result<(), ServerError> {
        let socket = UdpSocket::bind(self.config.bind_addr())
            .await
            .map_err(ServerError::BindError)?;
        let socket = Arc::new(socket);
        info!("UDP server listening on {}", self.config.bind_addr());
        info!("clients can send STATS (admin) to receive server statistics");

        let server = Arc::new(self);
        server.spawn_reaper();

        let permits = Arc::new(Semaphore::new(server.config.worker_pool_size));
        let mut buffer = vec![0u8; server.config.buffer_size];

        loop {
            let (length, peer) = match socket.recv_from(&mut buffer).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("error receiving datagram: {}", e);
                    continue;
                }
            };
            let datagram = buffer[..length].to_vec();

            let permit = match Arc::clone(&permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break, // semaphore closed, shutting down
            };
            let server = Arc::clone(&server);
            let socket = Arc::clone(&socket);
            tokio::spawn(async move {
                let _permit = permit;
                if let Some(reply) = server.process_datagram(peer, &datagram) {
                    server.send_response(&socket, peer, &reply).await;
                }
            });
        }
        Ok(())
    }

    fn spawn_reaper(self: &Arc<Self>) {
        let registry = Arc::clone(&self.registry);
        let timeout = Duration::from_secs(self.config.session_timeout_secs);
        let interval = Duration::from_secs(self.config.reaper_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = registry.evict_idle(timeout);
                if removed > 0 {
                    debug!("reaper removed {} idle session(s)", removed);
                }
            }
        });
    }

    /// Dispatches one inbound datagram and returns the reply, if any.
    ///
    /// Branches are terminal and ordered: oversize check, admission,
    /// touch/accounting, handshake, authentication gate, graceful exit,
    /// stats, file command, unknown.
    pub fn process_datagram(&self, peer: SocketAddr, datagram: &[u8]) -> Option<String> {
        self.monitor.record_received(datagram.len() as u64);

        if datagram.len() >= self.config.buffer_size {
            return Some(
                Response::err(format!(
                    "message exceeds {}-byte datagram limit",
                    self.config.buffer_size
                ))
                .render(),
            );
        }

        let message = String::from_utf8_lossy(datagram);
        let message = message.trim();
        debug!("received from {}: {}", peer, message);

        let session = match self.registry.resolve_or_admit(peer) {
            Admission::Existing(session) => session,
            Admission::Admitted(session) => {
                info!("new session admitted for {}", peer);
                session
            }
            Admission::Rejected => {
                warn!("admission rejected for {}: registry full", peer);
                return Some(Response::err("server busy").render());
            }
        };

        session.touch();
        session.record_message();
        session.add_bytes_received(datagram.len() as u64);
        self.sink
            .log_message(&session.identity().client_id, &peer.to_string(), message);

        if starts_with_keyword(message, CMD_HELLO) {
            return Some(self.handle_handshake(&session, message).render());
        }

        if !session.is_authenticated() {
            return Some(Response::err("authentication required").render());
        }

        if message.eq_ignore_ascii_case(CMD_EXIT) {
            self.registry.evict(&peer);
            info!("session {} closed by client", peer);
            return Some(Response::Ok("session closed".into()).render());
        }

        if message.eq_ignore_ascii_case(CMD_STATS) {
            return Some(self.handle_stats(&session).render());
        }

        if message.starts_with(COMMAND_SENTINEL) {
            return Some(self.handle_file_command(&session, message).render());
        }

        Some(Response::err("unrecognized command").render())
    }

    fn handle_handshake(&self, session: &Session, message: &str) -> Response {
        match parse_handshake(message) {
            Ok(handshake) => {
                session.authenticate(handshake.client_id.clone(), handshake.permission);
                info!(
                    "session {} authenticated as {} ({})",
                    session.addr(),
                    handshake.client_id,
                    handshake.permission
                );
                Response::Raw(format!(
                    "HELLO {}, role set to {}",
                    handshake.client_id, handshake.permission
                ))
            }
            Err(e) => Response::from(e),
        }
    }

    fn handle_stats(&self, session: &Session) -> Response {
        if session.permission() != Permission::Admin {
            return Response::err("permission denied");
        }
        let stats = self.monitor.build_stats(&self.registry);
        self.sink.log_stats(&stats);
        Response::Raw(stats)
    }

    fn handle_file_command(&self, session: &Session, message: &str) -> Response {
        let command = match FileCommand::parse(message) {
            Ok(command) => command,
            Err(CommandError::UnknownCommand) => return Response::err("unrecognized command"),
            Err(e) => return Response::from(e),
        };
        if command.requires_admin() && session.permission() != Permission::Admin {
            return Response::err("permission denied");
        }
        self.handler.handle(&command)
    }

    async fn send_response(&self, socket: &UdpSocket, peer: SocketAddr, reply: &str) {
        let data = reply.as_bytes();
        match socket.send_to(data, peer).await {
            Ok(sent) => {
                self.monitor.record_sent(sent as u64);
                if let Some(session) = self.registry.get(&peer) {
                    session.add_bytes_sent(sent as u64);
                }
            }
            Err(e) => error!("error sending response to {}: {}", peer, e),
        }
    }
}

fn starts_with_keyword(message: &str, keyword: &str) -> bool {
    let head = message.split_whitespace().next().unwrap_or(message);
    head.eq_ignore_ascii_case(keyword)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use std::fs;
    use tempfile::TempDir;

    fn server(dir: &TempDir, max_sessions: usize) -> UdpServer {
        let config = ServerConfig {
            max_sessions,
            data_dir: dir.path().join("data"),
            logs_dir: dir.path().join("logs"),
            ..Default::default()
        };
        UdpServer::new(config).unwrap()
    }

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    fn send(server: &UdpServer, peer: SocketAddr, message: &str) -> String {
        server
            .process_datagram(peer, message.as_bytes())
            .expect("expected a reply")
    }

    #[test]
    fn test_handshake_then_commands() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir, 4);
        let peer = addr(6001);

        let reply = send(&server, peer, "HELLO client1 ADMIN");
        assert_eq!(reply, "HELLO client1, role set to ADMIN");
        assert_eq!(send(&server, peer, "/list"), "DATA\n(no files)");
    }

    #[test]
    fn test_unauthenticated_commands_rejected() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir, 4);
        let peer = addr(6002);

        assert_eq!(send(&server, peer, "/list"), "ERR authentication required");
        assert_eq!(send(&server, peer, "STATS"), "ERR authentication required");
        // the endpoint still got a session; only privileged paths are gated
        assert!(server.registry.get(&peer).is_some());
    }

    #[test]
    fn test_malformed_handshake_leaves_auth_unchanged() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir, 4);
        let peer = addr(6003);

        let reply = send(&server, peer, "HELLO client1 ROOT");
        assert_eq!(reply, "ERR usage: HELLO <clientId> <ADMIN|READ_ONLY>");
        assert!(!server.registry.get(&peer).unwrap().is_authenticated());
    }

    #[test]
    fn test_rehandshake_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir, 4);
        let peer = addr(6004);

        send(&server, peer, "HELLO c ADMIN");
        send(&server, peer, "/list");
        send(&server, peer, "HELLO c READ_ONLY");
        let session = server.registry.get(&peer).unwrap();
        assert_eq!(session.permission(), Permission::ReadOnly);

        send(&server, peer, "HELLO c ADMIN");
        assert_eq!(server.registry.get(&peer).unwrap().permission(), Permission::Admin);
    }

    #[test]
    fn test_admission_cap_and_release() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir, 2);

        send(&server, addr(6101), "HELLO a ADMIN");
        send(&server, addr(6102), "HELLO b ADMIN");
        assert_eq!(send(&server, addr(6103), "HELLO c ADMIN"), "ERR server busy");
        assert!(server.registry.get(&addr(6103)).is_none());

        // graceful exit frees exactly one slot
        assert_eq!(send(&server, addr(6101), "/exit"), "OK session closed");
        assert!(send(&server, addr(6103), "HELLO c ADMIN").starts_with("HELLO c"));
        assert_eq!(send(&server, addr(6104), "HELLO d ADMIN"), "ERR server busy");
    }

    #[test]
    fn test_stats_requires_admin() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir, 4);
        let reader = addr(6201);
        let admin = addr(6202);

        send(&server, reader, "HELLO r READ_ONLY");
        assert_eq!(send(&server, reader, "STATS"), "ERR permission denied");

        send(&server, admin, "HELLO a ADMIN");
        let stats = send(&server, admin, "stats");
        assert!(stats.starts_with("==== SERVER STATS ===="));
        assert!(stats.contains("Client: r"));
        // snapshot is also appended to the stats log
        let logged = fs::read_to_string(dir.path().join("logs/server_stats.txt")).unwrap();
        assert!(logged.contains("==== SERVER STATS ===="));
    }

    #[test]
    fn test_read_only_gating_leaves_files_untouched() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir, 4);
        let peer = addr(6301);
        fs::write(dir.path().join("data/server_files/keep.txt"), b"safe").unwrap();

        send(&server, peer, "HELLO r READ_ONLY");
        assert_eq!(send(&server, peer, "/delete keep.txt"), "ERR permission denied");
        assert_eq!(
            send(&server, peer, &format!("/upload keep.txt {}", BASE64.encode(b"evil"))),
            "ERR permission denied"
        );
        assert_eq!(send(&server, peer, "/download keep.txt"), "ERR permission denied");
        assert_eq!(
            fs::read(dir.path().join("data/server_files/keep.txt")).unwrap(),
            b"safe"
        );

        // read-only command set still works
        assert_eq!(send(&server, peer, "/read keep.txt"), "DATA\nsafe");
        assert!(send(&server, peer, "/info keep.txt").starts_with("DATA\nName: keep.txt"));
        assert_eq!(send(&server, peer, "/search keep"), "DATA\nkeep.txt");
    }

    #[test]
    fn test_unknown_messages() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir, 4);
        let peer = addr(6401);

        send(&server, peer, "HELLO c ADMIN");
        assert_eq!(send(&server, peer, "make me a sandwich"), "ERR unrecognized command");
        assert_eq!(send(&server, peer, "/frobnicate x"), "ERR unrecognized command");
    }

    #[test]
    fn test_oversized_datagram_rejected() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir, 4);
        let peer = addr(6501);

        send(&server, peer, "HELLO c ADMIN");
        let huge = vec![b'a'; server.config.buffer_size];
        let reply = server.process_datagram(peer, &huge).unwrap();
        assert_eq!(
            reply,
            format!("ERR message exceeds {}-byte datagram limit", server.config.buffer_size)
        );
    }

    #[test]
    fn test_upload_download_round_trip_over_dispatch() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir, 4);
        let peer = addr(6601);
        send(&server, peer, "HELLO c ADMIN");

        let bytes: Vec<u8> = (0u16..600).map(|i| (i % 251) as u8).collect();
        let upload = format!("/upload rt.bin {}", BASE64.encode(&bytes));
        assert!(send(&server, peer, &upload).starts_with("OK Uploaded rt.bin"));

        let reply = send(&server, peer, "/download rt.bin");
        assert!(reply.starts_with("DATA_BASE64\nfilename=rt.bin\n"));
        let payload = reply.rsplit('\n').next().unwrap();
        assert_eq!(BASE64.decode(payload).unwrap(), bytes);
    }

    #[test]
    fn test_path_escape_over_dispatch() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir, 4);
        let peer = addr(6701);
        send(&server, peer, "HELLO c ADMIN");
        assert_eq!(send(&server, peer, "/read ../../etc/passwd"), "ERR invalid path");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_evicts_idle_sessions() {
        let dir = TempDir::new().unwrap();
        let server = Arc::new(server(&dir, 4));
        let peer = addr(6901);
        server.process_datagram(peer, b"HELLO c ADMIN");

        // last_active is wall-clock time; push it past the 20s timeout
        let session = server.registry.get(&peer).unwrap();
        session.set_last_active(chrono::Utc::now() - chrono::Duration::seconds(60));

        server.spawn_reaper();
        // paused clock: sleeping past the sweep interval runs the reaper
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(server.registry.get(&peer).is_none());
    }

    #[tokio::test]
    async fn test_wire_smoke() {
        let dir = TempDir::new().unwrap();
        // grab an ephemeral port, then hand it to the server
        let probe = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let config = ServerConfig {
            port,
            data_dir: dir.path().join("data"),
            logs_dir: dir.path().join("logs"),
            ..Default::default()
        };
        let bind_addr = config.bind_addr();
        let server = UdpServer::new(config).unwrap();
        tokio::spawn(server.run());

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(&bind_addr).await.unwrap();
        let mut buffer = [0u8; 4096];

        // retry the handshake until the server socket is up; datagrams sent
        // before the bind completes are silently dropped
        let mut n = 0;
        for _ in 0..50 {
            client.send(b"HELLO smoke ADMIN").await.unwrap();
            match tokio::time::timeout(Duration::from_millis(200), client.recv(&mut buffer)).await
            {
                Ok(received) => {
                    n = received.unwrap();
                    break;
                }
                Err(_) => continue,
            }
        }
        assert_eq!(&buffer[..n], b"HELLO smoke, role set to ADMIN");

        client.send(b"/list").await.unwrap();
        let n = tokio::time::timeout(Duration::from_secs(5), client.recv(&mut buffer))
            .await
            .expect("no list reply")
            .unwrap();
        assert_eq!(&buffer[..n], b"DATA\n(no files)");
    }

    #[test]
    fn test_messages_are_logged() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir, 4);
        let peer = addr(6801);
        send(&server, peer, "HELLO client9 ADMIN");
        send(&server, peer, "/list");

        let logged = fs::read_to_string(dir.path().join("logs/messages.log")).unwrap();
        assert!(logged.contains("[unknown@")); // the HELLO line predates identification
        assert!(logged.contains("[client9@"));
        assert!(logged.contains("/list"));
    }
}
