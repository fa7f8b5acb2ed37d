//! Binary frame codec.
//!
//! ```text
//! [4 bytes BE: header_len][header_len bytes: JSON header][rest: payload]
//! ```
//!
//! The JSON header is tagged by `type`. Only `chunk` frames carry a payload.

use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::constants::{MAX_HEADER_SIZE, MessageKind};
use crate::messages::TransferMessage;
use crate::types::{TransferId, TransferMetadata};

/// Header of a frame, as serialized on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrameHeader {
    Announce(TransferMetadata),
    Ack(TransferRef),
    Chunk(ChunkHeader),
    Finish(TransferRef),
}

/// Header body for messages that only name a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRef {
    pub transfer_id: TransferId,
}

/// Header body of a chunk frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkHeader {
    pub transfer_id: TransferId,
    pub seq: u64,
}

impl FrameHeader {
    pub fn kind(&self) -> MessageKind {
        match self {
            FrameHeader::Announce(_) => MessageKind::Announce,
            FrameHeader::Ack(_) => MessageKind::Ack,
            FrameHeader::Chunk(_) => MessageKind::Chunk,
            FrameHeader::Finish(_) => MessageKind::Finish,
        }
    }
}

/// Encodes a message into a single binary frame.
pub fn encode_frame(msg: &TransferMessage) -> Result<Vec<u8>, ProtocolError> {
    let (header, payload): (FrameHeader, &[u8]) = match msg {
        TransferMessage::Announce(meta) => (FrameHeader::Announce(meta.clone()), &[]),
        TransferMessage::Ack { transfer_id } => (
            FrameHeader::Ack(TransferRef {
                transfer_id: transfer_id.clone(),
            }),
            &[],
        ),
        TransferMessage::Chunk {
            transfer_id,
            seq,
            data,
        } => (
            FrameHeader::Chunk(ChunkHeader {
                transfer_id: transfer_id.clone(),
                seq: *seq,
            }),
            data,
        ),
        TransferMessage::Finish { transfer_id } => (
            FrameHeader::Finish(TransferRef {
                transfer_id: transfer_id.clone(),
            }),
            &[],
        ),
    };

    let header_json = serde_json::to_vec(&header)?;
    if header_json.len() > MAX_HEADER_SIZE {
        return Err(ProtocolError::HeaderTooLarge(header_json.len()));
    }
    let header_len = header_json.len() as u32;

    let mut buf = Vec::with_capacity(4 + header_json.len() + payload.len());
    buf.extend_from_slice(&header_len.to_be_bytes());
    buf.extend_from_slice(&header_json);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Decodes a binary frame, reusing its allocation for the chunk payload.
pub fn decode_frame(mut frame: Vec<u8>) -> Result<TransferMessage, ProtocolError> {
    if frame.len() < 4 {
        return Err(ProtocolError::TooShort);
    }

    let header_len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    if header_len > MAX_HEADER_SIZE {
        return Err(ProtocolError::HeaderTooLarge(header_len));
    }
    if frame.len() < 4 + header_len {
        return Err(ProtocolError::HeaderTruncated {
            expected: header_len,
            got: frame.len() - 4,
        });
    }

    let header: FrameHeader = serde_json::from_slice(&frame[4..4 + header_len])?;
    let has_payload = frame.len() > 4 + header_len;

    match header {
        FrameHeader::Chunk(ChunkHeader { transfer_id, seq }) => {
            frame.drain(..4 + header_len);
            Ok(TransferMessage::Chunk {
                transfer_id,
                seq,
                data: frame,
            })
        }
        other if has_payload => Err(ProtocolError::UnexpectedPayload(other.kind())),
        FrameHeader::Announce(meta) => Ok(TransferMessage::Announce(meta)),
        FrameHeader::Ack(r) => Ok(TransferMessage::Ack {
            transfer_id: r.transfer_id,
        }),
        FrameHeader::Finish(r) => Ok(TransferMessage::Finish {
            transfer_id: r.transfer_id,
        }),
    }
}
