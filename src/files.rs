//! File operations behind the wire protocol.

pub mod command_handler;

pub use command_handler::FileCommandHandler;
