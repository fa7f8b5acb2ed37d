//! Ordered, message-framed data channels between two peers.
//!
//! The transfer engine only needs a handful of capabilities from its
//! transport: send a message, report how many bytes are still queued,
//! report whether the channel is open, and deliver incoming messages and
//! lifecycle events in order. [`DataChannel`] captures exactly that.
//!
//! Two implementations are provided: an in-process [`memory`] pair and a
//! TCP channel ([`TcpDataChannel`]) guarded by a room token handshake.
//!
//! # Wire format
//!
//! See [`wire`] module for the TCP framing.

pub mod channel;
pub mod error;
pub mod memory;
pub mod server;
pub mod tcp;
pub mod token;
pub mod wire;

pub use channel::{ChannelEvent, ChannelEvents, DataChannel};
pub use error::DataChannelError;
pub use server::TcpDataListener;
pub use tcp::TcpDataChannel;
pub use token::{room_token, validate_token};

use std::time::Duration;

/// Largest frame accepted in either direction (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// TCP read/write buffer size (256 KB).
pub const TCP_BUFFER_SIZE: usize = 256 * 1024;

/// Timeout for the TCP connection attempt.
pub const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the room token handshake.
pub const TCP_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
