use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Size of a chunk payload (16 KiB).
///
/// Stays under the message-size limits common to browser data channels.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Largest chunk size a sender may be configured with (256 KiB).
pub const MAX_CHUNK_SIZE: usize = 256 * 1024;

/// Pending-send threshold above which the sender stops emitting chunks (10 MiB).
pub const HIGH_WATER_MARK: u64 = 10 * 1024 * 1024;

/// Delay before the sender re-checks a congested channel.
pub const BACKPRESSURE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Minimum spacing between two progress events for the same transfer.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Maximum encoded JSON header length (64 KiB).
pub const MAX_HEADER_SIZE: usize = 64 * 1024;

/// MIME type used when the sender cannot tell.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Transfer message kind, as carried in the `type` field of a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Announce,
    Ack,
    Chunk,
    Finish,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Announce => "announce",
            MessageKind::Ack => "ack",
            MessageKind::Chunk => "chunk",
            MessageKind::Finish => "finish",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
