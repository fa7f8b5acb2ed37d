//! Events surfaced to the UI layer.

use peerdrop_protocol::{TransferId, TransferMetadata};

use crate::types::Artifact;

/// Receiving-side events, one stream per connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// A new file was announced and a buffer allocated for it.
    Announced {
        transfer_id: TransferId,
        metadata: TransferMetadata,
    },
    /// Bytes received so far. Throttled; always sent once at 100%.
    Progress {
        transfer_id: TransferId,
        received_bytes: u64,
        total_bytes: u64,
    },
    /// The file was reassembled.
    Completed {
        transfer_id: TransferId,
        artifact: Artifact,
    },
    /// The transfer ended without a usable file.
    Failed {
        transfer_id: TransferId,
        reason: String,
    },
    /// The connection went away before the transfer finished.
    Abandoned {
        transfer_id: TransferId,
        reason: String,
    },
    /// A message that did not fit the protocol was dropped.
    Anomaly {
        transfer_id: Option<TransferId>,
        reason: String,
    },
}

/// Sending-side events.
#[derive(Debug, Clone, PartialEq)]
pub enum SendEvent {
    Started {
        transfer_id: TransferId,
        metadata: TransferMetadata,
    },
    Progress {
        transfer_id: TransferId,
        sent_bytes: u64,
        total_bytes: u64,
        bytes_per_second: f64,
    },
    Completed {
        transfer_id: TransferId,
        total_bytes: u64,
    },
    Failed {
        transfer_id: TransferId,
        reason: String,
    },
}

impl TransferEvent {
    pub fn transfer_id(&self) -> Option<&TransferId> {
        match self {
            TransferEvent::Announced { transfer_id, .. }
            | TransferEvent::Progress { transfer_id, .. }
            | TransferEvent::Completed { transfer_id, .. }
            | TransferEvent::Failed { transfer_id, .. }
            | TransferEvent::Abandoned { transfer_id, .. } => Some(transfer_id),
            TransferEvent::Anomaly { transfer_id, .. } => transfer_id.as_ref(),
        }
    }
}
