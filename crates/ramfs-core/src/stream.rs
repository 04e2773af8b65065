//! Bounded writer and reader over store buffers.

use std::io;
use std::sync::Arc;

use crate::buffer::Buffer;
use crate::error::{StoreError, StoreResult};
use crate::ops::{SequentialReadSeek, SequentialWrite, check_bounds};
use crate::store::Shared;

/// Single-use writer over a reserved buffer.
///
/// Writes append at the cursor and may never run past the reserved size.
/// [`close`](SequentialWrite::close) publishes the buffer; the committed
/// length is the reserved size however many bytes were written. Dropping
/// the writer without closing it discards the buffer while its space stays
/// accounted.
#[derive(Debug)]
pub struct MemoryWriter {
    path: String,
    buffer: Option<Buffer>,
    pos: u64,
    shared: Arc<Shared>,
}

impl MemoryWriter {
    pub(crate) fn new(path: String, buffer: Buffer, shared: Arc<Shared>) -> Self {
        Self {
            path,
            buffer: Some(buffer),
            pos: 0,
            shared,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Reserved size of the file being written.
    pub fn capacity(&self) -> u64 {
        self.buffer.as_ref().map_or(0, Buffer::capacity)
    }

    /// Bytes that can still be written.
    pub fn remaining(&self) -> u64 {
        self.capacity().saturating_sub(self.pos)
    }
}

impl SequentialWrite for MemoryWriter {
    fn write_bytes(&mut self, bytes: &[u8]) -> StoreResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let buffer = self.buffer.as_mut().ok_or(StoreError::Closed)?;
        buffer.write_at(self.pos, bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn close(mut self) -> StoreResult<()> {
        let buffer = self.buffer.take().ok_or(StoreError::Closed)?;
        let path = std::mem::take(&mut self.path);
        self.shared.commit(path, buffer)
    }
}

impl io::Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        if let Some(buffer) = &self.buffer {
            tracing::warn!(
                path = %self.path,
                size = buffer.capacity(),
                written = self.pos,
                "writer dropped without close, reserved space stays in use"
            );
        }
    }
}

/// Seekable reader over a committed buffer.
///
/// Holds its own reference to the bytes, so a concurrent delete or rename
/// does not disturb an open reader.
#[derive(Debug, Clone)]
pub struct MemoryReader {
    path: String,
    buffer: Arc<Buffer>,
    pos: u64,
}

impl MemoryReader {
    pub(crate) fn new(path: String, buffer: Arc<Buffer>) -> Self {
        Self {
            path,
            buffer,
            pos: 0,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.buffer.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SequentialReadSeek for MemoryReader {
    fn read_byte(&mut self) -> Option<u8> {
        let byte = self.buffer.as_slice().get(self.pos as usize).copied()?;
        self.pos += 1;
        Some(byte)
    }

    fn read_into(&mut self, buf: &mut [u8], offset: usize, len: usize) -> StoreResult<usize> {
        check_bounds(buf.len(), offset, len)?;
        let n = len.min(self.available() as usize);
        let start = self.pos as usize;
        buf[offset..offset + n].copy_from_slice(&self.buffer.as_slice()[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> StoreResult<()> {
        if pos > self.len() {
            return Err(StoreError::EndOfFile {
                pos,
                len: self.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn available(&self) -> u64 {
        self.len() - self.pos
    }

    fn skip(&mut self, n: u64) -> u64 {
        let skipped = n.min(self.available());
        self.pos += skipped;
        skipped
    }
}

impl io::Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len();
        Ok(self.read_into(buf, 0, len)?)
    }
}

impl io::Seek for MemoryReader {
    fn seek(&mut self, from: io::SeekFrom) -> io::Result<u64> {
        let target = match from {
            io::SeekFrom::Start(pos) => Some(pos),
            io::SeekFrom::End(delta) => self.len().checked_add_signed(delta),
            io::SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        }
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek before start of file"))?;
        SequentialReadSeek::seek(self, target)?;
        Ok(target)
    }
}
