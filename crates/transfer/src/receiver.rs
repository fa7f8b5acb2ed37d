use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

use peerdrop_protocol::{TransferId, TransferMetadata};

use crate::progress::ProgressThrottle;
use crate::types::Artifact;

/// Why an in-progress transfer could not continue or complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReceiveError {
    #[error("received {received} bytes, more than the announced {total}")]
    Overflow { received: u64, total: u64 },

    #[error("chunk {seq} was already received")]
    DuplicateChunk { seq: u64 },

    #[error("finished with {received} of {total} bytes")]
    SizeMismatch { received: u64, total: u64 },

    #[error("finished while waiting for chunk {next_seq} ({parked} later chunks held)")]
    MissingChunks { next_seq: u64, parked: usize },
}

/// Reassembly state for one announced file.
///
/// Chunks are appended in `seq` order. A chunk that arrives ahead of its
/// predecessors is held until the gap is filled.
#[derive(Debug)]
pub struct TransferReceiver {
    metadata: TransferMetadata,
    received_bytes: u64,
    chunks: Vec<Vec<u8>>,
    next_seq: u64,
    parked: BTreeMap<u64, Vec<u8>>,
    parked_bytes: u64,
    throttle: ProgressThrottle,
}

impl TransferReceiver {
    pub fn new(metadata: TransferMetadata, progress_interval: Duration, now: Instant) -> Self {
        Self {
            metadata,
            received_bytes: 0,
            chunks: Vec::new(),
            next_seq: 0,
            parked: BTreeMap::new(),
            parked_bytes: 0,
            throttle: ProgressThrottle::new(progress_interval, now),
        }
    }

    /// Accepts one chunk.
    ///
    /// Returns the byte count to report when a progress event is due.
    pub fn ingest(
        &mut self,
        seq: u64,
        data: Vec<u8>,
        now: Instant,
    ) -> Result<Option<u64>, ReceiveError> {
        if seq < self.next_seq || self.parked.contains_key(&seq) {
            return Err(ReceiveError::DuplicateChunk { seq });
        }

        let total = self.metadata.total_size_bytes;
        let received = self.received_bytes + data.len() as u64;
        if received > total {
            return Err(ReceiveError::Overflow { received, total });
        }
        self.received_bytes = received;

        if seq == self.next_seq {
            self.chunks.push(data);
            self.next_seq += 1;
            while let Some(next) = self.parked.remove(&self.next_seq) {
                self.parked_bytes -= next.len() as u64;
                self.chunks.push(next);
                self.next_seq += 1;
            }
        } else {
            self.parked_bytes += data.len() as u64;
            self.parked.insert(seq, data);
        }

        let done = self.contiguous_bytes();
        if self.throttle.should_emit(done, total, now) {
            Ok(Some(done))
        } else {
            Ok(None)
        }
    }

    /// Returns `true` (once) if the 100% report has not been made yet.
    pub fn final_progress_due(&mut self, now: Instant) -> bool {
        let done = self.contiguous_bytes();
        let total = self.metadata.total_size_bytes;
        done == total && self.throttle.should_emit(done, total, now)
    }

    /// Reassembles the file. Consumes the receiver and its buffers.
    pub fn finish(self) -> Result<Artifact, ReceiveError> {
        if !self.parked.is_empty() {
            return Err(ReceiveError::MissingChunks {
                next_seq: self.next_seq,
                parked: self.parked.len(),
            });
        }
        if self.received_bytes != self.metadata.total_size_bytes {
            return Err(ReceiveError::SizeMismatch {
                received: self.received_bytes,
                total: self.metadata.total_size_bytes,
            });
        }
        Ok(Artifact::assemble(self.metadata, self.chunks))
    }

    pub fn transfer_id(&self) -> &TransferId {
        &self.metadata.transfer_id
    }

    pub fn metadata(&self) -> &TransferMetadata {
        &self.metadata
    }

    /// All bytes accepted so far, including held chunks.
    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }

    pub fn total_bytes(&self) -> u64 {
        self.metadata.total_size_bytes
    }

    /// Bytes currently held in memory for this transfer.
    pub fn buffered_bytes(&self) -> u64 {
        self.received_bytes
    }

    fn contiguous_bytes(&self) -> u64 {
        self.received_bytes - self.parked_bytes
    }
}
