use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use peerdrop_data_channel::{ChannelEvent, ChannelEvents, DataChannel};
use peerdrop_protocol::{decode_frame, encode_frame};

use crate::config::TransferConfig;
use crate::events::TransferEvent;
use crate::registry::TransferRegistry;

/// Receiving side of one connection.
///
/// Pumps channel events into a [`TransferRegistry`] and sends its replies
/// back over the channel.
pub struct ReceiverSession<C> {
    channel: C,
    events: ChannelEvents,
    registry: TransferRegistry,
}

impl<C: DataChannel> ReceiverSession<C> {
    pub fn new(
        channel: C,
        events: ChannelEvents,
        config: &TransferConfig,
        ui: mpsc::UnboundedSender<TransferEvent>,
    ) -> Self {
        Self {
            channel,
            events,
            registry: TransferRegistry::new(config.progress_interval, ui),
        }
    }

    pub fn registry(&self) -> &TransferRegistry {
        &self.registry
    }

    /// Runs until the channel closes or `cancel` fires.
    ///
    /// Unfinished transfers are reported as abandoned and the channel is
    /// closed before returning.
    pub async fn run(mut self, cancel: CancellationToken) -> TransferRegistry {
        let reason = loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break "session cancelled".to_string(),
                event = self.events.recv() => event,
            };

            match event {
                Some(ChannelEvent::Message(frame)) => self.on_frame(frame),
                Some(ChannelEvent::Error(e)) => {
                    warn!(error = %e, "data channel error");
                }
                Some(ChannelEvent::Closed) | None => break "channel closed".to_string(),
            }
        };

        info!(%reason, in_flight = self.registry.in_flight(), "receiver session ended");
        self.registry.on_channel_closed(&reason);
        self.channel.close();
        self.registry
    }

    fn on_frame(&mut self, frame: Vec<u8>) {
        let msg = match decode_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                self.registry
                    .report_anomaly(None, format!("undecodable frame: {e}"));
                return;
            }
        };
        debug!(kind = %msg.kind(), transfer = %msg.transfer_id(), "received message");

        let Some(reply) = self.registry.handle(msg) else {
            return;
        };
        let result = encode_frame(&reply)
            .map_err(|e| e.to_string())
            .and_then(|frame| self.channel.send(frame).map_err(|e| e.to_string()));
        if let Err(e) = result {
            warn!(transfer = %reply.transfer_id(), error = %e, "failed to send reply");
        }
    }
}
