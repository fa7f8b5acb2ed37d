use std::io::{ErrorKind, SeekFrom};

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use crate::{DEFAULT_CHUNK_SIZE, TransferError};

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Chunk layout
// ---------------------------------------------------------------------------

/// Position of one chunk within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Zero-based chunk index, carried on the wire as `seq`.
    pub seq: u64,
    /// Byte offset within the file.
    pub offset: u64,
    /// Payload length in bytes.
    pub len: usize,
}

/// Lazy sequence of [`ChunkSpan`]s covering a file.
///
/// Every span is `chunk_size` long except the last, which holds the
/// remainder (or a full chunk if the size divides evenly). An empty file
/// has no spans.
#[derive(Debug, Clone)]
pub struct ChunkSpans {
    total_size: u64,
    chunk_size: u64,
    next_offset: u64,
}

impl ChunkSpans {
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn new(total_size: u64, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be > 0");
        Self {
            total_size,
            chunk_size: chunk_size as u64,
            next_offset: 0,
        }
    }

    /// Restarts the sequence at the chunk containing `offset`.
    pub fn starting_at(mut self, offset: u64) -> Self {
        let offset = offset.min(self.total_size);
        self.next_offset = offset - offset % self.chunk_size;
        self
    }

    /// Offset of the next span to be yielded.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }
}

impl Iterator for ChunkSpans {
    type Item = ChunkSpan;

    fn next(&mut self) -> Option<ChunkSpan> {
        if self.next_offset >= self.total_size {
            return None;
        }
        let len = (self.total_size - self.next_offset).min(self.chunk_size);
        let span = ChunkSpan {
            seq: self.next_offset / self.chunk_size,
            offset: self.next_offset,
            len: len as usize,
        };
        self.next_offset += len;
        Some(span)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total_size - self.next_offset).div_ceil(self.chunk_size);
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

/// Spans covering a file of `total_size` bytes.
pub fn chunk_spans(total_size: u64, chunk_size: usize) -> ChunkSpans {
    ChunkSpans::new(total_size, chunk_size)
}

/// Number of chunks needed for `total_size` bytes.
pub fn chunk_count(total_size: u64, chunk_size: usize) -> u64 {
    total_size.div_ceil(chunk_size.max(1) as u64)
}

/// Splits an in-memory file into borrowed chunks, in order.
pub fn split_into_chunks(data: &[u8], chunk_size: usize) -> std::slice::Chunks<'_, u8> {
    data.chunks(chunk_size.max(1))
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// One chunk of file data, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub seq: u64,
    pub offset: u64,
    pub data: Vec<u8>,
}

/// Reads a file handle chunk by chunk.
pub struct ChunkReader<R> {
    reader: R,
    spans: ChunkSpans,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    /// Wraps `reader`, which must yield exactly `total_size` bytes.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub fn new(reader: R, total_size: u64, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            reader,
            spans: ChunkSpans::new(total_size, chunk_size),
        }
    }

    /// Reads the next chunk. Returns `None` once the whole file was read.
    ///
    /// A file that ends early yields [`TransferError::ShortRead`].
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        let Some(span) = self.spans.next() else {
            return Ok(None);
        };

        let mut data = vec![0u8; span.len];
        match self.reader.read_exact(&mut data).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(TransferError::ShortRead {
                    expected: self.spans.total_size,
                    read: span.offset,
                });
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Some(Chunk {
            seq: span.seq,
            offset: span.offset,
            data,
        }))
    }

    /// Offset of the next chunk to be read.
    pub fn offset(&self) -> u64 {
        self.spans.next_offset
    }

    /// Total file size in bytes.
    pub fn total_size(&self) -> u64 {
        self.spans.total_size
    }

    /// Bytes remaining to read.
    pub fn remaining(&self) -> u64 {
        self.spans.total_size - self.spans.next_offset
    }
}

impl<R: AsyncRead + AsyncSeek + Unpin> ChunkReader<R> {
    /// Restarts reading at the chunk containing `offset`.
    pub async fn seek_to(&mut self, offset: u64) -> Result<(), TransferError> {
        self.spans = self.spans.clone().starting_at(offset);
        self.reader
            .seek(SeekFrom::Start(self.spans.next_offset))
            .await?;
        Ok(())
    }
}
