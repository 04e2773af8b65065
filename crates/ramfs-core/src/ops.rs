//! Capability traits.
//!
//! The store, its writers and its readers are described by three contracts:
//!
//! - [`KeyValueFileStore`] - reserve/create/open/rename/delete over path keys
//! - [`SequentialWrite`] - single-use, bounded, append-only writer
//! - [`SequentialReadSeek`] - seekable reader over a committed buffer

use crate::checksum::ChecksumFile;
use crate::error::{StoreError, StoreResult};
use crate::path::checksum_path;

/// Check that `offset..offset + len` lies within a slice of `buf_len` bytes.
pub(crate) fn check_bounds(buf_len: usize, offset: usize, len: usize) -> StoreResult<()> {
    match offset.checked_add(len) {
        Some(end) if end <= buf_len => Ok(()),
        _ => Err(StoreError::invalid_argument(format!(
            "range {offset}+{len} out of bounds for buffer of {buf_len} bytes"
        ))),
    }
}

/// Bounded sequential writer.
pub trait SequentialWrite {
    /// Append `bytes` at the cursor.
    ///
    /// Fails with [`StoreError::InsufficientSpace`] if the write would run
    /// past the reserved size. Bytes from earlier successful calls stay.
    fn write_bytes(&mut self, bytes: &[u8]) -> StoreResult<()>;

    /// Append `buf[offset..offset + len]`.
    fn write_slice(&mut self, buf: &[u8], offset: usize, len: usize) -> StoreResult<()> {
        check_bounds(buf.len(), offset, len)?;
        if len == 0 {
            return Ok(());
        }
        self.write_bytes(&buf[offset..offset + len])
    }

    /// Append a single byte.
    fn write_byte(&mut self, byte: u8) -> StoreResult<()> {
        self.write_bytes(&[byte])
    }

    /// Bytes written so far.
    fn position(&self) -> u64;

    /// Finish writing and publish the file.
    fn close(self) -> StoreResult<()>
    where
        Self: Sized;
}

/// Seekable sequential reader.
pub trait SequentialReadSeek {
    /// Next byte, or `None` at end of file.
    fn read_byte(&mut self) -> Option<u8>;

    /// Read up to `len` bytes into `buf[offset..]`, returning the count.
    ///
    /// Returns 0 at end of file.
    fn read_into(&mut self, buf: &mut [u8], offset: usize, len: usize) -> StoreResult<usize>;

    /// Move the cursor to `pos`. Fails with [`StoreError::EndOfFile`] past the end.
    fn seek(&mut self, pos: u64) -> StoreResult<()>;

    fn position(&self) -> u64;

    /// Bytes left between the cursor and the end.
    fn available(&self) -> u64;

    /// Advance up to `n` bytes, returning how far the cursor moved.
    fn skip(&mut self, n: u64) -> u64;
}

/// Path-keyed file store with reserve-before-write semantics.
///
/// All paths are normalized to their key before use (see [`crate::path`]).
pub trait KeyValueFileStore {
    type Writer: SequentialWrite;
    type Reader: SequentialReadSeek;

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Reserve `size` bytes for `path` plus its checksum companion.
    ///
    /// Both buffers are reserved or neither is. Returns false when the
    /// store cannot fit them.
    fn reserve(&self, path: &str, size: u64) -> bool;

    /// Claim the reservation for `path` and return a writer over it.
    ///
    /// The file becomes visible when the writer is closed.
    fn create(&self, path: &str, overwrite: bool) -> StoreResult<Self::Writer>;

    /// Open a committed file for reading.
    fn open(&self, path: &str) -> StoreResult<Self::Reader>;

    /// Move a committed file. Returns false if `src` is not committed.
    fn rename(&self, src: &str, dst: &str) -> bool;

    /// Remove a committed file and release its space.
    fn delete(&self, path: &str) -> bool;

    // ========================================================================
    // Queries
    // ========================================================================

    fn exists(&self, path: &str) -> bool;

    /// Reserved size of a committed file.
    fn length(&self, path: &str) -> StoreResult<u64>;

    /// Snapshot of committed paths accepted by `filter`, in no particular order.
    fn list(&self, filter: &dyn Fn(&str) -> bool) -> std::vec::IntoIter<String>;

    /// Checksum granularity used to size companions.
    fn bytes_per_checksum(&self) -> u32;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Reserve, write and commit `data` and its checksum companion.
    ///
    /// Returns `Ok(false)` if the store has no room. Fails with
    /// [`StoreError::AlreadyExists`] rather than silently replacing a file.
    fn put(&self, path: &str, data: &[u8]) -> StoreResult<bool> {
        if self.exists(path) {
            return Err(StoreError::already_exists(path));
        }
        if !self.reserve(path, data.len() as u64) {
            return Ok(false);
        }

        let mut writer = self.create(path, false)?;
        writer.write_bytes(data)?;
        writer.close()?;

        let companion = ChecksumFile::encode(data, self.bytes_per_checksum());
        let mut writer = self.create(&checksum_path(path), true)?;
        writer.write_bytes(&companion)?;
        writer.close()?;
        Ok(true)
    }

    /// Read a committed file in full.
    fn read_all(&self, path: &str) -> StoreResult<Vec<u8>> {
        let mut reader = self.open(path)?;
        let mut data = vec![0u8; reader.available() as usize];
        let mut filled = 0;
        while filled < data.len() {
            let len = data.len() - filled;
            let n = reader.read_into(&mut data, filled, len)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data.truncate(filled);
        Ok(data)
    }

    /// Check a committed file against its committed checksum companion.
    fn verify(&self, path: &str) -> StoreResult<()> {
        let data = self.read_all(path)?;
        let companion = self.read_all(&checksum_path(path))?;
        ChecksumFile::verify(path, &data, &companion)
    }
}
