//! Store error types.

use std::io;
use thiserror::Error;

/// Store error type.
///
/// Expected negative outcomes (a reservation that does not fit, renaming or
/// deleting a missing path) are reported as `bool` sentinels by the store
/// and never reach this type. These variants cover stream contract
/// violations and lookups that the caller asserted would succeed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Path is already committed and overwrite was not requested.
    #[error("file already exists: {0}")]
    AlreadyExists(String),

    /// Path is not committed.
    #[error("file does not exist: {0}")]
    NotFound(String),

    /// `create` was called without a matching `reserve`.
    #[error("no space reserved for: {0}")]
    NotReserved(String),

    /// A reservation or write would exceed the space available to it.
    #[error("insufficient space: requested {requested} bytes, {available} available")]
    InsufficientSpace { requested: u64, available: u64 },

    /// The allocator refused a buffer of this size.
    #[error("failed to allocate {0} bytes")]
    AllocationFailure(u64),

    /// Inconsistent offset/length pair.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Seek past the end of a readable buffer.
    #[error("cannot seek to {pos}: past end of file (length {len})")]
    EndOfFile { pos: u64, len: u64 },

    /// Checksum companion does not match the data it covers.
    #[error("checksum mismatch in {path} at chunk {chunk}")]
    ChecksumMismatch { path: String, chunk: usize },

    /// The store has been torn down.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a NotReserved error.
    pub fn not_reserved(path: impl Into<String>) -> Self {
        Self::NotReserved(path.into())
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn insufficient_space(requested: u64, available: u64) -> Self {
        Self::InsufficientSpace {
            requested,
            available,
        }
    }

    /// Returns true for failures that mean "the store is out of room",
    /// whether the accountant or the allocator said no.
    pub fn is_out_of_space(&self) -> bool {
        matches!(
            self,
            StoreError::InsufficientSpace { .. } | StoreError::AllocationFailure(_)
        )
    }
}

/// Convert StoreError to std::io::Error so streams can implement `Read`/`Write`.
impl From<StoreError> for io::Error {
    fn from(e: StoreError) -> Self {
        let kind = match &e {
            StoreError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            StoreError::NotFound(_) | StoreError::NotReserved(_) => io::ErrorKind::NotFound,
            StoreError::InsufficientSpace { .. } => io::ErrorKind::StorageFull,
            StoreError::AllocationFailure(_) => io::ErrorKind::OutOfMemory,
            StoreError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            StoreError::EndOfFile { .. } => io::ErrorKind::UnexpectedEof,
            StoreError::ChecksumMismatch { .. } => io::ErrorKind::InvalidData,
            StoreError::Closed => io::ErrorKind::BrokenPipe,
        };
        io::Error::new(kind, e)
    }
}

/// Store result type.
pub type StoreResult<T> = Result<T, StoreError>;
