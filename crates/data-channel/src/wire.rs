//! TCP wire format for data channels.
//!
//! # Wire format
//!
//! ```text
//! HANDSHAKE (connector -> listener):  [32 bytes: hex room token ASCII]
//! HANDSHAKE RESPONSE (listener -> connector): [1 byte: 0x01=OK, 0x00=rejected]
//!
//! PER MESSAGE (either direction):
//!   [4 bytes BE: frame_len]
//!   [frame_len bytes: frame]
//! ```

use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::MAX_FRAME_SIZE;
use crate::error::DataChannelError;

/// Handshake response: accepted.
pub const AUTH_OK: u8 = 0x01;

/// Handshake response: rejected.
pub const AUTH_REJECTED: u8 = 0x00;

/// Token length in bytes (32 hex characters).
pub const TOKEN_LEN: usize = 32;

/// Writes one length-prefixed frame and flushes.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &[u8],
) -> Result<(), DataChannelError> {
    if frame.len() > MAX_FRAME_SIZE {
        return Err(DataChannelError::FrameTooLarge(frame.len()));
    }
    writer.write_u32(frame.len() as u32).await?;
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed frame.
///
/// Returns `None` if the peer closed the stream at a frame boundary.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Vec<u8>>, DataChannelError> {
    let frame_len = match reader.read_u32().await {
        Ok(n) => n as usize,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if frame_len > MAX_FRAME_SIZE {
        return Err(DataChannelError::FrameTooLarge(frame_len));
    }

    let mut buf = vec![0u8; frame_len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

/// Writes the room token (32 hex ASCII bytes).
pub async fn write_token<W: AsyncWrite + Unpin>(
    writer: &mut W,
    token: &str,
) -> Result<(), DataChannelError> {
    if token.len() != TOKEN_LEN {
        return Err(DataChannelError::Protocol(format!(
            "token must be {TOKEN_LEN} bytes, got {}",
            token.len()
        )));
    }
    writer.write_all(token.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the room token (32 hex ASCII bytes).
pub async fn read_token<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, DataChannelError> {
    let mut buf = [0u8; TOKEN_LEN];
    reader.read_exact(&mut buf).await?;
    String::from_utf8(buf.to_vec())
        .map_err(|e| DataChannelError::Protocol(format!("invalid token encoding: {e}")))
}

/// Writes the handshake response byte.
pub async fn write_auth_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    accepted: bool,
) -> Result<(), DataChannelError> {
    writer
        .write_u8(if accepted { AUTH_OK } else { AUTH_REJECTED })
        .await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the handshake response byte.
pub async fn read_auth_response<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<bool, DataChannelError> {
    let byte = reader.read_u8().await?;
    Ok(byte == AUTH_OK)
}
