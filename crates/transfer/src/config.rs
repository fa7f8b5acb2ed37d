use std::time::Duration;

use peerdrop_protocol::constants::{
    BACKPRESSURE_RETRY_DELAY, DEFAULT_CHUNK_SIZE, HIGH_WATER_MARK, MAX_CHUNK_SIZE,
    PROGRESS_INTERVAL,
};

use crate::TransferError;

/// Tunables for both transfer roles.
///
/// The defaults are the protocol's contract values; peers built from
/// different configurations still interoperate.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferConfig {
    /// Payload size of every chunk except the last.
    pub chunk_size: usize,
    /// Pending-send bytes above which the sender pauses.
    pub high_water_mark: u64,
    /// How long a paused sender waits before re-checking the channel.
    pub retry_delay: Duration,
    /// Minimum spacing between progress events of one transfer.
    pub progress_interval: Duration,
    /// Give up on an unacknowledged announce after this long (`None` waits forever).
    pub ack_timeout: Option<Duration>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            high_water_mark: HIGH_WATER_MARK,
            retry_delay: BACKPRESSURE_RETRY_DELAY,
            progress_interval: PROGRESS_INTERVAL,
            ack_timeout: None,
        }
    }
}

impl TransferConfig {
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(TransferError::InvalidConfig(format!(
                "chunk size must be between 1 and {MAX_CHUNK_SIZE} bytes, got {}",
                self.chunk_size
            )));
        }
        if self.retry_delay.is_zero() {
            return Err(TransferError::InvalidConfig(
                "backpressure retry delay must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
