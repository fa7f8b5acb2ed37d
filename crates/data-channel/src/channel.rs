use tokio::sync::mpsc;

use crate::error::DataChannelError;

/// Something that happened on the receiving side of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// One complete message, delivered in the order the peer sent it.
    Message(Vec<u8>),
    /// The transport failed. A [`ChannelEvent::Closed`] always follows.
    Error(String),
    /// The channel is closed; no further events will arrive.
    Closed,
}

/// Incoming side of a channel.
pub type ChannelEvents = mpsc::UnboundedReceiver<ChannelEvent>;

/// Outgoing side of a bidirectional, reliable, ordered, message-framed channel.
pub trait DataChannel: Send + Sync {
    /// Queues one message for delivery. Never blocks.
    ///
    /// Fails with [`DataChannelError::Closed`] once the channel is closed.
    fn send(&self, frame: Vec<u8>) -> Result<(), DataChannelError>;

    /// Bytes queued by [`send`](Self::send) that have not reached the wire yet.
    fn buffered_amount(&self) -> u64;

    fn is_open(&self) -> bool;

    /// Closes the channel. Frames still queued are discarded.
    fn close(&self);
}
