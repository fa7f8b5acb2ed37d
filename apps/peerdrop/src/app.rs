//! Send and receive commands, wired to the transfer engine.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use peerdrop_data_channel::{TcpDataChannel, TcpDataListener, room_token};
use peerdrop_transfer::{
    ReceiverSession, SendEvent, TransferConfig, TransferEvent, TransferSender,
};

use crate::files::{guess_mime_type, normalize_room, save_artifact};

/// Connects to `peer` and sends `files` one after another.
pub async fn send(
    files: &[PathBuf],
    peer: &str,
    room: &str,
    config: TransferConfig,
) -> anyhow::Result<()> {
    let room = normalize_room(room);
    let (channel, incoming) = TcpDataChannel::connect(peer, &room_token(&room))
        .await
        .with_context(|| format!("joining room {room:?} at {peer}"))?;
    tracing::info!(%peer, %room, "connected");

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(report_send_events(events_rx));
    let mut sender = TransferSender::new(channel, incoming, config)?.with_events(events_tx);

    let mut result = Ok(());
    for path in files {
        let mime_type = guess_mime_type(path);
        if let Err(e) = sender.send_file(path, mime_type).await {
            result = Err(e).with_context(|| format!("sending {}", path.display()));
            break;
        }
    }

    sender.close().await;
    let _ = reporter.await;
    result
}

async fn report_send_events(mut events: mpsc::UnboundedReceiver<SendEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SendEvent::Started { metadata, .. } => {
                tracing::info!(
                    file = %metadata.file_name,
                    size = metadata.total_size_bytes,
                    mime = %metadata.mime_type,
                    "sending"
                );
            }
            SendEvent::Progress {
                transfer_id,
                sent_bytes,
                total_bytes,
                bytes_per_second,
            } => {
                tracing::info!(
                    transfer = %transfer_id,
                    percent = percent(sent_bytes, total_bytes),
                    kib_per_sec = (bytes_per_second / 1024.0) as u64,
                    "progress"
                );
            }
            SendEvent::Completed {
                transfer_id,
                total_bytes,
            } => {
                tracing::info!(transfer = %transfer_id, bytes = total_bytes, "sent");
            }
            SendEvent::Failed {
                transfer_id,
                reason,
            } => {
                tracing::error!(transfer = %transfer_id, %reason, "send failed");
            }
        }
    }
}

/// Waits for one peer in `room`, then saves every file it sends into `output`.
///
/// Returns when the peer disconnects or `cancel` fires.
pub async fn receive(
    listen: &str,
    room: &str,
    output: &Path,
    config: TransferConfig,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let room = normalize_room(room);
    let listener = TcpDataListener::bind(listen, room_token(&room))
        .await
        .with_context(|| format!("binding {listen}"))?;
    tracing::info!(addr = %listener.local_addr()?, %room, "waiting for a peer");

    let (channel, incoming) = loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            accepted = listener.accept() => match accepted {
                Ok(pair) => break pair,
                Err(e) => tracing::warn!(error = %e, "peer handshake failed"),
            },
        }
    };
    tracing::info!(peer = %channel.peer(), "peer joined");

    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let session = ReceiverSession::new(channel, incoming, &config, ui_tx);
    let mut session_task = tokio::spawn(session.run(cancel));

    loop {
        tokio::select! {
            Some(event) = ui_rx.recv() => handle_receive_event(output, event).await,
            joined = &mut session_task => {
                joined?;
                break;
            }
        }
    }

    // Events queued before the session ended.
    while let Ok(event) = ui_rx.try_recv() {
        handle_receive_event(output, event).await;
    }
    tracing::info!("peer disconnected");
    Ok(())
}

async fn handle_receive_event(output: &Path, event: TransferEvent) {
    match event {
        TransferEvent::Announced { metadata, .. } => {
            tracing::info!(
                file = %metadata.file_name,
                size = metadata.total_size_bytes,
                mime = %metadata.mime_type,
                "incoming file"
            );
        }
        TransferEvent::Progress {
            transfer_id,
            received_bytes,
            total_bytes,
        } => {
            tracing::info!(
                transfer = %transfer_id,
                percent = percent(received_bytes, total_bytes),
                "progress"
            );
        }
        TransferEvent::Completed { artifact, .. } => match save_artifact(output, &artifact).await {
            Ok(path) => {
                tracing::info!(
                    path = %path.display(),
                    bytes = artifact.byte_len(),
                    sha256 = %artifact.checksum(),
                    "saved"
                );
            }
            Err(e) => tracing::error!(file = %artifact.file_name(), error = %e, "failed to save"),
        },
        TransferEvent::Failed {
            transfer_id,
            reason,
        } => {
            tracing::error!(transfer = %transfer_id, %reason, "receive failed");
        }
        TransferEvent::Abandoned {
            transfer_id,
            reason,
        } => {
            tracing::warn!(transfer = %transfer_id, %reason, "transfer abandoned");
        }
        TransferEvent::Anomaly {
            transfer_id,
            reason,
        } => {
            tracing::warn!(transfer = ?transfer_id.as_ref().map(|id| id.as_str()), %reason, "ignored message");
        }
    }
}

fn percent(done: u64, total: u64) -> u64 {
    if total == 0 {
        100
    } else {
        done.saturating_mul(100) / total
    }
}
