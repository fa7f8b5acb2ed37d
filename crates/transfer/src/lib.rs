//! Chunked file transfer over a peer-to-peer data channel.
//!
//! The sending role drives `announce → ack → chunk* → finish` through a
//! [`TransferSender`], pausing whenever the channel's send queue is above
//! the high-water mark. The receiving role runs a [`ReceiverSession`] that
//! feeds every decoded message to a [`TransferRegistry`], which reassembles
//! each announced file and reports progress, completion and failures as
//! [`TransferEvent`]s.

mod codec;
mod config;
mod events;
mod progress;
mod receiver;
mod registry;
mod sender;
mod session;
mod types;
mod validation;

pub use codec::{
    Chunk, ChunkReader, ChunkSpan, ChunkSpans, checksum_bytes, chunk_count, chunk_spans,
    split_into_chunks,
};
pub use config::TransferConfig;
pub use events::{SendEvent, TransferEvent};
pub use progress::{ProgressThrottle, SpeedCalculator};
pub use receiver::{ReceiveError, TransferReceiver};
pub use registry::TransferRegistry;
pub use sender::TransferSender;
pub use session::ReceiverSession;
pub use types::{Artifact, SenderState};
pub use validation::{sanitize_file_name, validate_file_name};

pub use peerdrop_protocol::constants::DEFAULT_CHUNK_SIZE;
pub use peerdrop_protocol::{TransferId, TransferMetadata};

use peerdrop_data_channel::DataChannelError;
use peerdrop_protocol::ProtocolError;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("data channel error: {0}")]
    Channel(#[from] DataChannelError),

    #[error("{0}")]
    ChannelClosed(String),

    #[error("transfer {0} is still in flight")]
    TransferInFlight(TransferId),

    #[error("no transfer is in the required state")]
    InvalidState,

    #[error("timed out waiting for ack of transfer {0}")]
    AckTimeout(TransferId),

    #[error("file changed while sending: expected {expected} bytes, read {read}")]
    ShortRead { expected: u64, read: u64 },

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
