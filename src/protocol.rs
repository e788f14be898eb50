//! Wire protocol: command parsing and response framing.
//!
//! Requests are single UTF-8 datagrams. Three request families exist: the
//! `HELLO` handshake, the `STATS` keyword, and sentinel-prefixed file
//! commands (`/list`, `/read`, ...). Responses use one of four framings:
//! `OK <detail>`, `ERR <detail>`, `DATA\n<body>` for text payloads and
//! `DATA_BASE64\nfilename=<name>\nsize=<n>\n<base64>` for binary payloads.

pub mod command;
pub mod response;

pub use command::{parse_handshake, tokenize, FileCommand, Handshake};
pub use response::Response;

/// Handshake keyword, matched case-insensitively.
pub const CMD_HELLO: &str = "HELLO";
/// Stats keyword, matched case-insensitively.
pub const CMD_STATS: &str = "STATS";
/// Sentinel marking a file command.
pub const COMMAND_SENTINEL: char = '/';
/// Graceful session end, sent by clients on shutdown.
pub const CMD_EXIT: &str = "/exit";
