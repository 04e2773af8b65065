//! # ramfs-core
//!
//! A fixed-capacity, in-memory file store for short-lived job data.
//!
//! Unlike a general filesystem, callers must declare a file's exact size
//! before writing it. Space for the file and its checksum companion is
//! claimed in one step, and every later write is bounds-checked against
//! that size.
//!
//! ```
//! use ramfs_core::{KeyValueFileStore, MemoryStore, SequentialReadSeek, SequentialWrite};
//!
//! let store = MemoryStore::with_capacity(1024 * 1024, 512).unwrap();
//! assert!(store.reserve("/spill/0", 5));
//!
//! let mut writer = store.create("/spill/0", false).unwrap();
//! writer.write_bytes(b"hello").unwrap();
//! writer.close().unwrap();
//!
//! let mut reader = store.open("/spill/0").unwrap();
//! assert_eq!(reader.read_byte(), Some(b'h'));
//! assert_eq!(store.length("/spill/0").unwrap(), 5);
//! ```
//!
//! ## Design Decisions
//!
//! - **Reserve before create**: `reserve` admits data plus companion bytes
//!   against the capacity; `create` claims the reservation; closing the
//!   writer commits the file. Only `delete` gives space back.
//! - **Strict admission**: a reservation is admitted only while
//!   `used + size < capacity`.
//! - **One mutex, concurrent maps**: mutations serialize on a single lock;
//!   existence and length queries read a `DashMap` without it.

pub mod accountant;
pub mod buffer;
pub mod checksum;
pub mod config;
mod error;
mod ops;
pub mod path;
mod store;
mod stream;

pub use accountant::Accountant;
pub use buffer::Buffer;
pub use checksum::{ChecksumFile, checksum_size};
pub use config::{ConfigError, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use ops::{KeyValueFileStore, SequentialReadSeek, SequentialWrite};
pub use path::StoreUri;
pub use store::{DEFAULT_BLOCK_SIZE, DEFAULT_REPLICATION, MemoryStore};
pub use stream::{MemoryReader, MemoryWriter};
