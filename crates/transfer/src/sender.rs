use std::io::Cursor;
use std::path::Path;

use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use peerdrop_data_channel::{ChannelEvent, ChannelEvents, DataChannel, DataChannelError};
use peerdrop_protocol::{TransferId, TransferMessage, TransferMetadata, decode_frame, encode_frame};

use crate::codec::ChunkReader;
use crate::config::TransferConfig;
use crate::events::SendEvent;
use crate::progress::{ProgressThrottle, SpeedCalculator};
use crate::types::SenderState;
use crate::validation::validate_file_name;
use crate::TransferError;

/// Sending side of a connection.
///
/// Transfers run one at a time: announce, wait for the ack, then stream
/// chunks while keeping the channel's send queue at or below the
/// high-water mark, then finish.
pub struct TransferSender<C> {
    channel: C,
    incoming: ChannelEvents,
    config: TransferConfig,
    state: SenderState,
    events: Option<mpsc::UnboundedSender<SendEvent>>,
}

impl<C: DataChannel> TransferSender<C> {
    pub fn new(
        channel: C,
        incoming: ChannelEvents,
        config: TransferConfig,
    ) -> Result<Self, TransferError> {
        config.validate()?;
        Ok(Self {
            channel,
            incoming,
            config,
            state: SenderState::Idle,
            events: None,
        })
    }

    /// Reports progress and outcomes on `events`.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<SendEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> &SenderState {
        &self.state
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Sends the announce for a new file.
    ///
    /// Fails with [`TransferError::TransferInFlight`] while a previous
    /// transfer is still announced or streaming.
    pub fn begin_transfer(
        &mut self,
        file_name: &str,
        total_size_bytes: u64,
        mime_type: &str,
    ) -> Result<TransferMetadata, TransferError> {
        if let Some(id) = self.state.in_flight() {
            return Err(TransferError::TransferInFlight(id.clone()));
        }
        validate_file_name(file_name)?;

        let metadata = TransferMetadata {
            transfer_id: TransferId::generate(),
            file_name: file_name.to_string(),
            total_size_bytes,
            mime_type: mime_type.to_string(),
        };
        self.send_message(&TransferMessage::announce(metadata.clone()))?;
        info!(
            transfer = %metadata.transfer_id,
            file = %metadata.file_name,
            size = total_size_bytes,
            "transfer announced"
        );

        self.state = SenderState::Announced(metadata.transfer_id.clone());
        self.emit(SendEvent::Started {
            transfer_id: metadata.transfer_id.clone(),
            metadata: metadata.clone(),
        });
        Ok(metadata)
    }

    /// Waits for the receiver to acknowledge the announced transfer.
    pub async fn await_ack(&mut self) -> Result<(), TransferError> {
        let SenderState::Announced(id) = &self.state else {
            return Err(TransferError::InvalidState);
        };
        let id = id.clone();

        let result = match self.config.ack_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, wait_for_ack(&mut self.incoming, &id)).await {
                    Ok(result) => result,
                    Err(_) => Err(TransferError::AckTimeout(id.clone())),
                }
            }
            None => wait_for_ack(&mut self.incoming, &id).await,
        };

        match result {
            Ok(()) => {
                debug!(transfer = %id, "ack received");
                self.state = SenderState::Streaming(id);
                Ok(())
            }
            Err(e) => Err(self.abort(e)),
        }
    }

    /// Streams every chunk of `reader`, then sends finish.
    ///
    /// Must follow a successful [`await_ack`](Self::await_ack).
    pub async fn stream<R>(&mut self, reader: &mut ChunkReader<R>) -> Result<(), TransferError>
    where
        R: AsyncRead + Unpin,
    {
        let SenderState::Streaming(id) = &self.state else {
            return Err(TransferError::InvalidState);
        };
        let id = id.clone();
        let total = reader.total_size();

        let start = Instant::now();
        let mut throttle = ProgressThrottle::new(self.config.progress_interval, start);
        let mut speed = SpeedCalculator::default();
        speed.add_sample(0, start);

        loop {
            if let Err(e) = self.wait_for_capacity().await {
                return Err(self.abort(e));
            }
            let chunk = match reader.next_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => return Err(self.abort(e)),
            };

            let len = chunk.data.len() as u64;
            let sent = chunk.offset + len;
            let msg = TransferMessage::chunk(id.clone(), chunk.seq, chunk.data);
            if let Err(e) = self.send_message(&msg) {
                return Err(self.abort(e));
            }

            let now = Instant::now();
            speed.add_sample(len, now);
            if throttle.should_emit(sent, total, now) {
                self.emit_progress(&id, sent, total, speed.bytes_per_second());
            }
        }

        if throttle.should_emit(total, total, Instant::now()) {
            self.emit_progress(&id, total, total, speed.bytes_per_second());
        }

        if let Err(e) = self.send_message(&TransferMessage::finish(id.clone())) {
            return Err(self.abort(e));
        }
        info!(transfer = %id, bytes = total, "transfer finished");
        self.state = SenderState::Done(id.clone());
        self.emit(SendEvent::Completed {
            transfer_id: id,
            total_bytes: total,
        });
        Ok(())
    }

    /// Announces, waits for the ack and streams `reader` to the end.
    pub async fn send_reader<R>(
        &mut self,
        reader: R,
        file_name: &str,
        total_size_bytes: u64,
        mime_type: &str,
    ) -> Result<TransferId, TransferError>
    where
        R: AsyncRead + Unpin,
    {
        let metadata = self.begin_transfer(file_name, total_size_bytes, mime_type)?;
        self.await_ack().await?;
        let mut chunks = ChunkReader::new(reader, total_size_bytes, self.config.chunk_size);
        self.stream(&mut chunks).await?;
        Ok(metadata.transfer_id)
    }

    /// Sends an in-memory file.
    pub async fn send_bytes(
        &mut self,
        file_name: &str,
        data: Vec<u8>,
        mime_type: &str,
    ) -> Result<TransferId, TransferError> {
        let len = data.len() as u64;
        self.send_reader(Cursor::new(data), file_name, len, mime_type)
            .await
    }

    /// Sends a file from disk under its own file name.
    pub async fn send_file(
        &mut self,
        path: &Path,
        mime_type: &str,
    ) -> Result<TransferId, TransferError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TransferError::InvalidFileName(path.display().to_string()))?
            .to_string();
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        self.send_reader(file, &file_name, size, mime_type).await
    }

    /// Waits for queued frames to drain, then closes the channel.
    pub async fn close(self) {
        while self.channel.is_open() && self.channel.buffered_amount() > 0 {
            tokio::time::sleep(self.config.retry_delay).await;
        }
        self.channel.close();
    }

    /// Sleeps in `retry_delay` steps while the send queue is above the
    /// high-water mark.
    async fn wait_for_capacity(&self) -> Result<(), TransferError> {
        let mut paused = false;
        loop {
            if !self.channel.is_open() {
                return Err(TransferError::ChannelClosed(
                    "channel closed mid-transfer".into(),
                ));
            }
            let buffered = self.channel.buffered_amount();
            if buffered <= self.config.high_water_mark {
                if paused {
                    debug!(buffered, "send queue drained, resuming");
                }
                return Ok(());
            }
            if !paused {
                debug!(
                    buffered,
                    high_water_mark = self.config.high_water_mark,
                    "send queue above high-water mark, pausing"
                );
                paused = true;
            }
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }

    /// Marks the current transfer aborted. No finish is sent for it.
    fn abort(&mut self, err: TransferError) -> TransferError {
        if let Some(id) = self.state.in_flight().cloned() {
            error!(transfer = %id, error = %err, "transfer aborted");
            self.state = SenderState::Aborted(id.clone());
            self.emit(SendEvent::Failed {
                transfer_id: id,
                reason: err.to_string(),
            });
        }
        err
    }

    fn send_message(&self, msg: &TransferMessage) -> Result<(), TransferError> {
        let frame = encode_frame(msg)?;
        self.channel.send(frame).map_err(|e| match e {
            DataChannelError::Closed => TransferError::ChannelClosed("channel closed".into()),
            other => other.into(),
        })
    }

    fn emit_progress(&self, id: &TransferId, sent_bytes: u64, total_bytes: u64, rate: f64) {
        self.emit(SendEvent::Progress {
            transfer_id: id.clone(),
            sent_bytes,
            total_bytes,
            bytes_per_second: rate,
        });
    }

    fn emit(&self, event: SendEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

async fn wait_for_ack(incoming: &mut ChannelEvents, id: &TransferId) -> Result<(), TransferError> {
    loop {
        match incoming.recv().await {
            Some(ChannelEvent::Message(frame)) => match decode_frame(frame) {
                Ok(TransferMessage::Ack { transfer_id }) if &transfer_id == id => return Ok(()),
                Ok(other) => {
                    debug!(kind = %other.kind(), transfer = %other.transfer_id(), "ignoring message while waiting for ack");
                }
                Err(e) => warn!(error = %e, "undecodable frame while waiting for ack"),
            },
            Some(ChannelEvent::Error(e)) => warn!(error = %e, "channel error while waiting for ack"),
            Some(ChannelEvent::Closed) | None => {
                return Err(TransferError::ChannelClosed(
                    "channel closed before ack".into(),
                ));
            }
        }
    }
}
