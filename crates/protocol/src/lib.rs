//! Wire protocol for peer-to-peer file transfers.
//!
//! A transfer is four kinds of message on one ordered data channel:
//! `announce` (sender → receiver), `ack` (receiver → sender), a run of
//! `chunk` messages and a closing `finish`. See [`envelope`] for the binary
//! frame layout.

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

pub use constants::MessageKind;
pub use envelope::{FrameHeader, decode_frame, encode_frame};
pub use messages::TransferMessage;
pub use types::{TransferId, TransferMetadata};

/// Errors produced while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame too short (need at least 4 bytes)")]
    TooShort,

    #[error("header truncated: expected {expected} bytes, got {got}")]
    HeaderTruncated { expected: usize, got: usize },

    #[error("header too large: {0} bytes (max {max})", max = constants::MAX_HEADER_SIZE)]
    HeaderTooLarge(usize),

    #[error("invalid header JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("unexpected payload on {0} message")]
    UnexpectedPayload(MessageKind),
}
