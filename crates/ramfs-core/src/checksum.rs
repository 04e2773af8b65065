//! Checksum companion files.
//!
//! Every data file reserves a companion buffer sized for one CRC32 per
//! `bytes_per_checksum` chunk plus a fixed header:
//!
//! ```text
//! +--------+-----------------+---------+---------+-----
//! | "crc\0"| bytes_per_sum BE| crc0 BE | crc1 BE | ...
//! +--------+-----------------+---------+---------+-----
//!   4 bytes      4 bytes       4 bytes   4 bytes
//! ```

use crc32fast::Hasher;

use crate::error::{StoreError, StoreResult};

/// Magic prefix of a checksum companion.
pub const CHECKSUM_MAGIC: &[u8; 4] = b"crc\0";

/// Header bytes: magic plus the encoded granularity.
pub const CHECKSUM_HEADER_LEN: u64 = 8;

/// Bytes per stored checksum value.
pub const CHECKSUM_WIDTH: u64 = 4;

/// Companion size for `data_size` bytes checked every `bytes_per_checksum`.
///
/// Saturates at `u64::MAX` for sizes no store could ever admit.
pub fn checksum_size(data_size: u64, bytes_per_checksum: u32) -> u64 {
    debug_assert!(bytes_per_checksum > 0, "zero checksum granularity");
    let chunks = data_size.div_ceil(u64::from(bytes_per_checksum));
    chunks
        .saturating_mul(CHECKSUM_WIDTH)
        .saturating_add(CHECKSUM_HEADER_LEN)
}

/// Computes a CRC32 checksum over one chunk.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Encoder/verifier for the companion layout.
pub struct ChecksumFile;

impl ChecksumFile {
    /// Encode the companion for `data`.
    ///
    /// The result is exactly `checksum_size(data.len(), bytes_per_checksum)` long.
    pub fn encode(data: &[u8], bytes_per_checksum: u32) -> Vec<u8> {
        debug_assert!(bytes_per_checksum > 0, "zero checksum granularity");
        let mut out = Vec::with_capacity(checksum_size(data.len() as u64, bytes_per_checksum) as usize);
        out.extend_from_slice(CHECKSUM_MAGIC);
        out.extend_from_slice(&bytes_per_checksum.to_be_bytes());
        for chunk in data.chunks(bytes_per_checksum as usize) {
            out.extend_from_slice(&compute_checksum(chunk).to_be_bytes());
        }
        out
    }

    /// Check `data` against an encoded companion.
    ///
    /// `path` only labels the error.
    pub fn verify(path: &str, data: &[u8], companion: &[u8]) -> StoreResult<()> {
        let header = companion
            .get(..CHECKSUM_HEADER_LEN as usize)
            .ok_or_else(|| StoreError::invalid_argument(format!("{path}: truncated checksum header")))?;
        if &header[..4] != CHECKSUM_MAGIC {
            return Err(StoreError::invalid_argument(format!(
                "{path}: bad checksum magic"
            )));
        }
        let bytes_per_checksum = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        if bytes_per_checksum == 0 {
            return Err(StoreError::invalid_argument(format!(
                "{path}: zero checksum granularity"
            )));
        }

        let sums = &companion[CHECKSUM_HEADER_LEN as usize..];
        for (chunk_idx, chunk) in data.chunks(bytes_per_checksum as usize).enumerate() {
            let at = chunk_idx * CHECKSUM_WIDTH as usize;
            let expected = sums
                .get(at..at + CHECKSUM_WIDTH as usize)
                .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
                .ok_or_else(|| StoreError::ChecksumMismatch {
                    path: path.to_string(),
                    chunk: chunk_idx,
                })?;
            if compute_checksum(chunk) != expected {
                return Err(StoreError::ChecksumMismatch {
                    path: path.to_string(),
                    chunk: chunk_idx,
                });
            }
        }
        Ok(())
    }
}
