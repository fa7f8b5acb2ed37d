//! Error types for the data channel.

/// Errors produced by a data channel.
#[derive(Debug, thiserror::Error)]
pub enum DataChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("room handshake failed: {0}")]
    AuthFailed(String),

    #[error("connection timed out")]
    Timeout,

    #[error("channel closed")]
    Closed,

    #[error("frame too large: {0} bytes (max {max})", max = crate::MAX_FRAME_SIZE)]
    FrameTooLarge(usize),

    #[error("protocol error: {0}")]
    Protocol(String),
}
