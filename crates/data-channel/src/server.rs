//! TCP data listener (hosting side).
//!
//! Binds a port for a room and accepts peers that present the room token.

use std::net::SocketAddr;

use tokio::io::{BufReader, BufWriter};
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{info, warn};

use crate::channel::ChannelEvents;
use crate::error::DataChannelError;
use crate::tcp::TcpDataChannel;
use crate::wire::{read_token, write_auth_response};
use crate::{TCP_BUFFER_SIZE, TCP_HANDSHAKE_TIMEOUT};

/// Listens for peers joining one room.
pub struct TcpDataListener {
    listener: TcpListener,
    token: String,
}

impl TcpDataListener {
    /// Binds `addr`. Peers must present `token` (see [`crate::room_token`]).
    pub async fn bind<A: ToSocketAddrs>(addr: A, token: String) -> Result<Self, DataChannelError> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "TCP data channel listener bound");
        Ok(Self { listener, token })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DataChannelError> {
        Ok(self.listener.local_addr()?)
    }

    /// Waits for the next peer and validates its room token.
    ///
    /// A peer with the wrong token is answered with a rejection and
    /// reported as [`DataChannelError::AuthFailed`]; the listener stays
    /// usable.
    pub async fn accept(&self) -> Result<(TcpDataChannel, ChannelEvents), DataChannelError> {
        let (stream, addr) = self.listener.accept().await?;
        info!(%addr, "TCP data channel connection accepted");
        stream.set_nodelay(true)?;

        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::with_capacity(TCP_BUFFER_SIZE, reader);
        let mut writer = BufWriter::with_capacity(TCP_BUFFER_SIZE, writer);

        let received_token =
            match tokio::time::timeout(TCP_HANDSHAKE_TIMEOUT, read_token(&mut reader)).await {
                Ok(Ok(t)) => t,
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(DataChannelError::Timeout),
            };

        if !crate::token::validate_token(&received_token, &self.token) {
            warn!(%addr, "TCP data channel: wrong room token");
            write_auth_response(&mut writer, false).await?;
            return Err(DataChannelError::AuthFailed(format!(
                "peer {addr} presented a token for another room"
            )));
        }

        write_auth_response(&mut writer, true).await?;
        info!(%addr, "TCP data channel: peer joined room");

        Ok(TcpDataChannel::spawn(reader, writer, addr.to_string()))
    }
}
