use crate::constants::MessageKind;
use crate::types::{TransferId, TransferMetadata};

/// A decoded transfer message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferMessage {
    /// Announces an incoming file. Sender → receiver.
    Announce(TransferMetadata),
    /// Receiver has allocated a buffer; the sender may stream. Receiver → sender.
    Ack { transfer_id: TransferId },
    /// One slice of the file. `seq` starts at 0 and increases by one per chunk.
    Chunk {
        transfer_id: TransferId,
        seq: u64,
        data: Vec<u8>,
    },
    /// All chunks have been sent. Sender → receiver.
    Finish { transfer_id: TransferId },
}

impl TransferMessage {
    pub fn announce(metadata: TransferMetadata) -> Self {
        TransferMessage::Announce(metadata)
    }

    pub fn ack(transfer_id: TransferId) -> Self {
        TransferMessage::Ack { transfer_id }
    }

    pub fn chunk(transfer_id: TransferId, seq: u64, data: Vec<u8>) -> Self {
        TransferMessage::Chunk {
            transfer_id,
            seq,
            data,
        }
    }

    pub fn finish(transfer_id: TransferId) -> Self {
        TransferMessage::Finish { transfer_id }
    }

    /// Returns the transfer this message belongs to.
    pub fn transfer_id(&self) -> &TransferId {
        match self {
            TransferMessage::Announce(meta) => &meta.transfer_id,
            TransferMessage::Ack { transfer_id }
            | TransferMessage::Chunk { transfer_id, .. }
            | TransferMessage::Finish { transfer_id } => transfer_id,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            TransferMessage::Announce(_) => MessageKind::Announce,
            TransferMessage::Ack { .. } => MessageKind::Ack,
            TransferMessage::Chunk { .. } => MessageKind::Chunk,
            TransferMessage::Finish { .. } => MessageKind::Finish,
        }
    }
}
