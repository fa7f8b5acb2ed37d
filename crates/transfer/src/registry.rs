use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use peerdrop_protocol::{TransferId, TransferMessage, TransferMetadata};

use crate::events::TransferEvent;
use crate::receiver::TransferReceiver;

/// Receiving-side bookkeeping for one connection.
///
/// Owns every in-progress [`TransferReceiver`], keyed by transfer id.
/// Messages are handled one at a time through `&mut self`; callers that
/// need concurrency put the registry behind a single task.
pub struct TransferRegistry {
    transfers: HashMap<TransferId, TransferReceiver>,
    progress_interval: Duration,
    events: mpsc::UnboundedSender<TransferEvent>,
}

impl TransferRegistry {
    pub fn new(progress_interval: Duration, events: mpsc::UnboundedSender<TransferEvent>) -> Self {
        Self {
            transfers: HashMap::new(),
            progress_interval,
            events,
        }
    }

    /// Handles one decoded message.
    ///
    /// Returns the reply to send back to the peer, if any.
    pub fn handle(&mut self, msg: TransferMessage) -> Option<TransferMessage> {
        match msg {
            TransferMessage::Announce(metadata) => self.on_announce(metadata),
            TransferMessage::Chunk {
                transfer_id,
                seq,
                data,
            } => {
                self.on_chunk(transfer_id, seq, data);
                None
            }
            TransferMessage::Finish { transfer_id } => {
                self.on_finish(transfer_id);
                None
            }
            TransferMessage::Ack { transfer_id } => {
                self.report_anomaly(Some(transfer_id), "unexpected ack on receiving side");
                None
            }
        }
    }

    fn on_announce(&mut self, metadata: TransferMetadata) -> Option<TransferMessage> {
        let transfer_id = metadata.transfer_id.clone();
        if self.transfers.contains_key(&transfer_id) {
            self.report_anomaly(Some(transfer_id), "duplicate announce");
            return None;
        }

        info!(
            transfer = %transfer_id,
            file = %metadata.file_name,
            size = metadata.total_size_bytes,
            "incoming transfer announced"
        );
        let receiver = TransferReceiver::new(metadata.clone(), self.progress_interval, Instant::now());
        self.transfers.insert(transfer_id.clone(), receiver);
        self.emit(TransferEvent::Announced {
            transfer_id: transfer_id.clone(),
            metadata,
        });
        Some(TransferMessage::ack(transfer_id))
    }

    fn on_chunk(&mut self, transfer_id: TransferId, seq: u64, data: Vec<u8>) {
        let Some(receiver) = self.transfers.get_mut(&transfer_id) else {
            warn!(transfer = %transfer_id, seq, "chunk for unannounced transfer, dropping");
            self.report_anomaly(Some(transfer_id), format!("chunk {seq} for unannounced transfer"));
            return;
        };

        match receiver.ingest(seq, data, Instant::now()) {
            Ok(Some(received_bytes)) => {
                let total_bytes = receiver.total_bytes();
                self.emit(TransferEvent::Progress {
                    transfer_id,
                    received_bytes,
                    total_bytes,
                });
            }
            Ok(None) => {}
            Err(e) => {
                self.transfers.remove(&transfer_id);
                warn!(transfer = %transfer_id, error = %e, "transfer failed");
                self.emit(TransferEvent::Failed {
                    transfer_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn on_finish(&mut self, transfer_id: TransferId) {
        let Some(mut receiver) = self.transfers.remove(&transfer_id) else {
            self.report_anomaly(Some(transfer_id), "finish for unknown transfer");
            return;
        };

        if receiver.final_progress_due(Instant::now()) {
            self.emit(TransferEvent::Progress {
                transfer_id: transfer_id.clone(),
                received_bytes: receiver.received_bytes(),
                total_bytes: receiver.total_bytes(),
            });
        }

        match receiver.finish() {
            Ok(artifact) => {
                info!(
                    transfer = %transfer_id,
                    bytes = artifact.byte_len(),
                    "transfer completed"
                );
                self.emit(TransferEvent::Completed {
                    transfer_id,
                    artifact,
                });
            }
            Err(e) => {
                warn!(transfer = %transfer_id, error = %e, "transfer failed");
                self.emit(TransferEvent::Failed {
                    transfer_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Discards every in-progress transfer after the connection went away.
    pub fn on_channel_closed(&mut self, reason: &str) {
        if self.transfers.is_empty() {
            return;
        }
        info!(count = self.transfers.len(), reason, "abandoning unfinished transfers");
        for (transfer_id, _) in self.transfers.drain() {
            let _ = self.events.send(TransferEvent::Abandoned {
                transfer_id,
                reason: reason.to_string(),
            });
        }
    }

    /// Reports a message that was dropped without affecting any transfer.
    pub fn report_anomaly(&self, transfer_id: Option<TransferId>, reason: impl Into<String>) {
        let reason = reason.into();
        debug!(transfer = ?transfer_id.as_ref().map(TransferId::as_str), %reason, "protocol anomaly");
        self.emit(TransferEvent::Anomaly {
            transfer_id,
            reason,
        });
    }

    /// Number of transfers announced but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_receiving(&self, transfer_id: &TransferId) -> bool {
        self.transfers.contains_key(transfer_id)
    }

    /// Bytes held in memory across all in-progress transfers.
    pub fn buffered_bytes(&self) -> u64 {
        self.transfers
            .values()
            .map(TransferReceiver::buffered_bytes)
            .sum()
    }

    fn emit(&self, event: TransferEvent) {
        // A dropped UI receiver must not stop reassembly.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (TransferRegistry, mpsc::UnboundedReceiver<TransferEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TransferRegistry::new(Duration::from_millis(500), tx), rx)
    }

    fn meta(id: &str, size: u64) -> TransferMetadata {
        TransferMetadata {
            transfer_id: id.into(),
            file_name: "a.txt".into(),
            total_size_bytes: size,
            mime_type: "text/plain".into(),
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<TransferEvent>) -> Vec<TransferEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn announce_is_acked() {
        let (mut reg, mut rx) = registry();
        let reply = reg.handle(TransferMessage::announce(meta("t1", 3)));
        assert_eq!(reply, Some(TransferMessage::ack("t1".into())));
        assert!(reg.is_receiving(&"t1".into()));
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [TransferEvent::Announced { .. }]
        ));
    }

    #[tokio::test]
    async fn full_transfer_completes() {
        let (mut reg, mut rx) = registry();
        reg.handle(TransferMessage::announce(meta("t1", 5)));
        reg.handle(TransferMessage::chunk("t1".into(), 0, b"he".to_vec()));
        reg.handle(TransferMessage::chunk("t1".into(), 1, b"llo".to_vec()));
        assert_eq!(reg.buffered_bytes(), 5);
        reg.handle(TransferMessage::finish("t1".into()));

        let events = drain(&mut rx);
        let progress: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                TransferEvent::Progress { received_bytes, .. } => Some(*received_bytes),
                _ => None,
            })
            .collect();
        assert_eq!(progress, [5]);
        let Some(TransferEvent::Completed { artifact, .. }) = events.last() else {
            panic!("expected completion, got {events:?}");
        };
        assert_eq!(artifact.bytes(), b"hello");
        assert_eq!(reg.in_flight(), 0);
        assert_eq!(reg.buffered_bytes(), 0);
    }

    #[tokio::test]
    async fn unannounced_chunk_is_anomaly() {
        let (mut reg, mut rx) = registry();
        assert!(reg
            .handle(TransferMessage::chunk("ghost".into(), 0, vec![1, 2]))
            .is_none());
        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [TransferEvent::Anomaly { transfer_id: Some(id), .. }] if id.as_str() == "ghost"
        ));
        assert_eq!(reg.in_flight(), 0);
    }

    #[tokio::test]
    async fn duplicate_announce_is_anomaly_without_ack() {
        let (mut reg, mut rx) = registry();
        reg.handle(TransferMessage::announce(meta("t1", 3)));
        reg.handle(TransferMessage::chunk("t1".into(), 0, b"a".to_vec()));
        assert!(reg.handle(TransferMessage::announce(meta("t1", 3))).is_none());
        assert_eq!(reg.buffered_bytes(), 1);
        assert!(matches!(
            drain(&mut rx).last(),
            Some(TransferEvent::Anomaly { .. })
        ));
    }

    #[tokio::test]
    async fn early_finish_fails() {
        let (mut reg, mut rx) = registry();
        reg.handle(TransferMessage::announce(meta("t1", 10)));
        reg.handle(TransferMessage::chunk("t1".into(), 0, b"abc".to_vec()));
        reg.handle(TransferMessage::finish("t1".into()));
        assert!(matches!(
            drain(&mut rx).last(),
            Some(TransferEvent::Failed { .. })
        ));
        assert_eq!(reg.in_flight(), 0);
    }

    #[tokio::test]
    async fn overflow_fails_and_frees_buffer() {
        let (mut reg, mut rx) = registry();
        reg.handle(TransferMessage::announce(meta("t1", 2)));
        reg.handle(TransferMessage::chunk("t1".into(), 0, b"abc".to_vec()));
        assert!(matches!(
            drain(&mut rx).last(),
            Some(TransferEvent::Failed { .. })
        ));
        assert!(!reg.is_receiving(&"t1".into()));
        assert_eq!(reg.buffered_bytes(), 0);
    }

    #[tokio::test]
    async fn finish_for_unknown_transfer_is_anomaly() {
        let (mut reg, mut rx) = registry();
        reg.handle(TransferMessage::finish("nope".into()));
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [TransferEvent::Anomaly { .. }]
        ));
    }

    #[tokio::test]
    async fn ack_on_receiving_side_is_anomaly() {
        let (mut reg, mut rx) = registry();
        assert!(reg.handle(TransferMessage::ack("t1".into())).is_none());
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [TransferEvent::Anomaly { .. }]
        ));
    }

    #[tokio::test]
    async fn concurrent_transfers_are_independent() {
        let (mut reg, mut rx) = registry();
        reg.handle(TransferMessage::announce(meta("a", 2)));
        reg.handle(TransferMessage::announce(meta("b", 2)));
        reg.handle(TransferMessage::chunk("b".into(), 0, b"bb".to_vec()));
        reg.handle(TransferMessage::chunk("a".into(), 0, b"aa".to_vec()));
        reg.handle(TransferMessage::finish("a".into()));
        reg.handle(TransferMessage::finish("b".into()));

        let completed: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                TransferEvent::Completed { artifact, .. } => Some(artifact.into_bytes()),
                _ => None,
            })
            .collect();
        assert_eq!(completed, [b"aa".to_vec(), b"bb".to_vec()]);
    }

    #[tokio::test]
    async fn channel_close_abandons_everything() {
        let (mut reg, mut rx) = registry();
        reg.handle(TransferMessage::announce(meta("a", 10)));
        reg.handle(TransferMessage::announce(meta("b", 10)));
        reg.handle(TransferMessage::chunk("a".into(), 0, b"12345".to_vec()));
        drain(&mut rx);

        reg.on_channel_closed("peer went away");
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|e| matches!(e, TransferEvent::Abandoned { .. })));
        assert_eq!(reg.in_flight(), 0);
        assert_eq!(reg.buffered_bytes(), 0);
    }
}
