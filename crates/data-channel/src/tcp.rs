//! TCP data channel (connecting side and shared channel plumbing).
//!
//! After the room handshake the stream is split into a reader task and a
//! writer task. [`DataChannel::send`] queues frames for the writer and
//! bumps the buffered-amount counter; the writer decrements it once the
//! frame has been flushed to the socket.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channel::{ChannelEvent, ChannelEvents, DataChannel};
use crate::error::DataChannelError;
use crate::wire::{read_auth_response, read_frame, write_frame, write_token};
use crate::{MAX_FRAME_SIZE, TCP_BUFFER_SIZE, TCP_CONNECT_TIMEOUT, TCP_HANDSHAKE_TIMEOUT};

/// A data channel over a byte stream (normally a TCP connection).
pub struct TcpDataChannel {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    buffered: Arc<AtomicU64>,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
    peer: String,
}

impl TcpDataChannel {
    /// Connects to a listening peer and performs the room handshake.
    pub async fn connect<A: ToSocketAddrs>(
        addr: A,
        token: &str,
    ) -> Result<(Self, ChannelEvents), DataChannelError> {
        let stream = match tokio::time::timeout(TCP_CONNECT_TIMEOUT, TcpStream::connect(addr)).await
        {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(DataChannelError::Timeout),
        };
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?.to_string();
        info!(%peer, "TCP data channel connected");

        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::with_capacity(TCP_BUFFER_SIZE, reader);
        let mut writer = BufWriter::with_capacity(TCP_BUFFER_SIZE, writer);

        write_token(&mut writer, token).await?;

        let accepted =
            match tokio::time::timeout(TCP_HANDSHAKE_TIMEOUT, read_auth_response(&mut reader))
                .await
            {
                Ok(Ok(a)) => a,
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(DataChannelError::Timeout),
            };

        if !accepted {
            return Err(DataChannelError::AuthFailed("peer rejected room token".into()));
        }

        info!(%peer, "TCP data channel: room handshake accepted");
        Ok(Self::spawn(reader, writer, peer))
    }

    /// Starts the reader and writer tasks over an already-authenticated stream.
    pub fn spawn<R, W>(reader: R, writer: W, peer: String) -> (Self, ChannelEvents)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let buffered = Arc::new(AtomicU64::new(0));
        let open = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        tokio::spawn(write_loop(
            writer,
            outbound_rx,
            Arc::clone(&buffered),
            Arc::clone(&open),
            cancel.clone(),
            events_tx.clone(),
        ));
        tokio::spawn(read_loop(
            reader,
            events_tx,
            Arc::clone(&open),
            cancel.clone(),
            peer.clone(),
        ));

        let channel = Self {
            outbound: outbound_tx,
            buffered,
            open,
            cancel,
            peer,
        };
        (channel, events_rx)
    }

    /// Address (or label) of the remote peer.
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl DataChannel for TcpDataChannel {
    fn send(&self, frame: Vec<u8>) -> Result<(), DataChannelError> {
        if !self.is_open() {
            return Err(DataChannelError::Closed);
        }
        if frame.len() > MAX_FRAME_SIZE {
            return Err(DataChannelError::FrameTooLarge(frame.len()));
        }
        let len = frame.len() as u64;
        self.buffered.fetch_add(len, Ordering::AcqRel);
        if self.outbound.send(frame).is_err() {
            self.buffered.fetch_sub(len, Ordering::AcqRel);
            return Err(DataChannelError::Closed);
        }
        Ok(())
    }

    fn buffered_amount(&self) -> u64 {
        self.buffered.load(Ordering::Acquire)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.cancel.is_cancelled()
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            debug!(peer = %self.peer, "TCP data channel closing");
        }
        self.cancel.cancel();
    }
}

impl Drop for TcpDataChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn write_loop<W>(
    writer: W,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    buffered: Arc<AtomicU64>,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<ChannelEvent>,
) where
    W: AsyncWrite + Unpin,
{
    let mut writer = writer;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                let len = frame.len() as u64;
                let result = write_frame(&mut writer, &frame).await;
                buffered.fetch_sub(len, Ordering::AcqRel);
                if let Err(e) = result {
                    error!("TCP data channel write error: {e}");
                    open.store(false, Ordering::Release);
                    let _ = events.send(ChannelEvent::Error(e.to_string()));
                    cancel.cancel();
                    break;
                }
            }
        }
    }

    buffered.store(0, Ordering::Release);
    let _ = writer.shutdown().await;
}

async fn read_loop<R>(
    mut reader: R,
    events: mpsc::UnboundedSender<ChannelEvent>,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
    peer: String,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            r = read_frame(&mut reader) => r,
        };
        match result {
            Ok(Some(frame)) => {
                if events.send(ChannelEvent::Message(frame)).is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!(%peer, "TCP data channel: peer closed the stream");
                break;
            }
            Err(e) => {
                warn!(%peer, "TCP data channel read error: {e}");
                let _ = events.send(ChannelEvent::Error(e.to_string()));
                break;
            }
        }
    }

    open.store(false, Ordering::Release);
    cancel.cancel();
    let _ = events.send(ChannelEvent::Closed);
}
