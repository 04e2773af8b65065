//! Fixed-capacity byte buffers.

use crate::error::{StoreError, StoreResult};

/// An owned, zero-filled byte region whose capacity never changes.
///
/// A buffer lives in exactly one place at a time: the reservation table,
/// the writer filling it, or (frozen behind an `Arc`) the commit table.
#[derive(Debug, PartialEq, Eq)]
pub struct Buffer {
    data: Box<[u8]>,
}

impl Buffer {
    /// Allocate a buffer of `capacity` bytes.
    ///
    /// Allocation failure is reported instead of aborting the process, so a
    /// reservation can back out cleanly when memory is exhausted.
    pub fn allocate(capacity: u64) -> StoreResult<Self> {
        let len = usize::try_from(capacity).map_err(|_| StoreError::AllocationFailure(capacity))?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| StoreError::AllocationFailure(capacity))?;
        data.resize(len, 0);
        Ok(Self {
            data: data.into_boxed_slice(),
        })
    }

    pub fn capacity(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Copy `bytes` into the buffer starting at `offset`.
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> StoreResult<()> {
        let end = offset
            .checked_add(bytes.len() as u64)
            .filter(|end| *end <= self.capacity())
            .ok_or_else(|| {
                StoreError::insufficient_space(
                    bytes.len() as u64,
                    self.capacity().saturating_sub(offset),
                )
            })?;
        self.data[offset as usize..end as usize].copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_zeroed() {
        let buf = Buffer::allocate(16).unwrap();
        assert_eq!(buf.capacity(), 16);
        assert!(buf.as_slice().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_allocate_empty() {
        let buf = Buffer::allocate(0).unwrap();
        assert_eq!(buf.capacity(), 0);
    }

    #[test]
    fn test_allocate_absurd_size_fails() {
        let err = Buffer::allocate(u64::MAX).unwrap_err();
        assert!(matches!(err, StoreError::AllocationFailure(_)));
    }

    #[test]
    fn test_write_at_bounds() {
        let mut buf = Buffer::allocate(4).unwrap();
        buf.write_at(1, b"abc").unwrap();
        assert_eq!(buf.as_slice(), b"\0abc");

        let err = buf.write_at(2, b"abc").unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientSpace {
                requested: 3,
                available: 2
            }
        ));
        // Failed write leaves contents untouched
        assert_eq!(buf.as_slice(), b"\0abc");
    }
}
