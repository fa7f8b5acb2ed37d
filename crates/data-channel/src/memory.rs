//! In-process channel pair.
//!
//! Messages are delivered to the peer immediately, so the buffered amount
//! stays at whatever [`MemoryDataChannel::set_buffered_amount`] last set.
//! That makes the pair useful for driving a sender against a congested
//! transport in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tracing::debug;

use crate::MAX_FRAME_SIZE;
use crate::channel::{ChannelEvent, ChannelEvents, DataChannel};
use crate::error::DataChannelError;

/// One end of an in-process channel pair. Clones share the same end.
#[derive(Debug, Clone)]
pub struct MemoryDataChannel {
    to_peer: mpsc::UnboundedSender<ChannelEvent>,
    to_self: mpsc::UnboundedSender<ChannelEvent>,
    open: Arc<AtomicBool>,
    buffered: Arc<AtomicU64>,
    sent: Arc<AtomicUsize>,
}

/// Creates a connected pair of in-process channels.
pub fn pair() -> (
    (MemoryDataChannel, ChannelEvents),
    (MemoryDataChannel, ChannelEvents),
) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    let open = Arc::new(AtomicBool::new(true));

    let a = MemoryDataChannel {
        to_peer: b_tx.clone(),
        to_self: a_tx.clone(),
        open: Arc::clone(&open),
        buffered: Arc::new(AtomicU64::new(0)),
        sent: Arc::new(AtomicUsize::new(0)),
    };
    let b = MemoryDataChannel {
        to_peer: a_tx,
        to_self: b_tx,
        open,
        buffered: Arc::new(AtomicU64::new(0)),
        sent: Arc::new(AtomicUsize::new(0)),
    };
    ((a, a_rx), (b, b_rx))
}

impl MemoryDataChannel {
    /// Pretends `amount` bytes are waiting in this end's send queue.
    pub fn set_buffered_amount(&self, amount: u64) {
        self.buffered.store(amount, Ordering::SeqCst);
    }

    /// Number of frames sent from this end.
    pub fn sent_frames(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

impl DataChannel for MemoryDataChannel {
    fn send(&self, frame: Vec<u8>) -> Result<(), DataChannelError> {
        if !self.is_open() {
            return Err(DataChannelError::Closed);
        }
        if frame.len() > MAX_FRAME_SIZE {
            return Err(DataChannelError::FrameTooLarge(frame.len()));
        }
        self.to_peer
            .send(ChannelEvent::Message(frame))
            .map_err(|_| DataChannelError::Closed)?;
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn buffered_amount(&self) -> u64 {
        self.buffered.load(Ordering::SeqCst)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!("memory channel closed");
            let _ = self.to_peer.send(ChannelEvent::Closed);
            let _ = self.to_self.send(ChannelEvent::Closed);
        }
    }
}
