use peerdrop_protocol::{TransferId, TransferMetadata};

use crate::codec::checksum_bytes;
use crate::validation::sanitize_file_name;

/// A fully reassembled file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    metadata: TransferMetadata,
    data: Vec<u8>,
}

impl Artifact {
    pub fn new(metadata: TransferMetadata, data: Vec<u8>) -> Self {
        Self { metadata, data }
    }

    /// Concatenates `chunks` in order. Each chunk is freed once copied.
    pub(crate) fn assemble(metadata: TransferMetadata, chunks: Vec<Vec<u8>>) -> Self {
        let mut data = Vec::with_capacity(metadata.total_size_bytes as usize);
        for chunk in chunks {
            data.extend_from_slice(&chunk);
        }
        Self { metadata, data }
    }

    pub fn transfer_id(&self) -> &TransferId {
        &self.metadata.transfer_id
    }

    /// File name exactly as announced by the sender.
    pub fn file_name(&self) -> &str {
        &self.metadata.file_name
    }

    /// File name safe to create inside a download directory.
    ///
    /// Falls back to `<transfer id>.bin` when nothing usable remains.
    pub fn safe_file_name(&self) -> String {
        sanitize_file_name(&self.metadata.file_name)
            .unwrap_or_else(|| format!("{}.bin", self.metadata.transfer_id))
    }

    pub fn mime_type(&self) -> &str {
        &self.metadata.mime_type
    }

    pub fn metadata(&self) -> &TransferMetadata {
        &self.metadata
    }

    pub fn byte_len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// SHA-256 of the contents, hex-encoded.
    pub fn checksum(&self) -> String {
        checksum_bytes(&self.data)
    }
}

/// Where a [`TransferSender`](crate::TransferSender) is in its current transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderState {
    /// Nothing sent yet on this connection.
    Idle,
    /// Announce sent, waiting for the receiver's ack.
    Announced(TransferId),
    /// Ack received, chunks are being emitted.
    Streaming(TransferId),
    /// Finish sent. A new transfer may begin.
    Done(TransferId),
    /// Stopped without a finish message. A new transfer may begin.
    Aborted(TransferId),
}

impl SenderState {
    /// Returns the id of a transfer that is announced or streaming.
    pub fn in_flight(&self) -> Option<&TransferId> {
        match self {
            SenderState::Announced(id) | SenderState::Streaming(id) => Some(id),
            _ => None,
        }
    }
}
