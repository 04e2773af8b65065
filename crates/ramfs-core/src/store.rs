//! The in-memory store.
//!
//! Files go through two tables:
//!
//! ```text
//!   reserve ──▶ reserved ──create──▶ MemoryWriter ──close──▶ committed ──delete──▶ (released)
//!   (admit)                                                    │    ▲
//!                                                              └────┘ rename
//! ```
//!
//! Space is admitted once at `reserve` (data plus checksum companion) and
//! released only by `delete`. Every transition above runs under one mutex;
//! `exists`, `length` and `open` read the concurrent maps without it and
//! may observe a file that a concurrent `delete` removes a moment later.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::accountant::Accountant;
use crate::buffer::Buffer;
use crate::checksum::checksum_size;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::ops::KeyValueFileStore;
use crate::path::{StoreUri, checksum_path, normalize};
use crate::stream::{MemoryReader, MemoryWriter};

/// Block size reported for every file.
pub const DEFAULT_BLOCK_SIZE: u64 = 32 * 1024;

/// Replication factor reported for every file.
pub const DEFAULT_REPLICATION: u16 = 1;

/// State shared between a store and the writers it hands out.
#[derive(Debug)]
pub(crate) struct Shared {
    /// Serializes every accounting or table mutation.
    accountant: Mutex<Accountant>,
    reserved: DashMap<String, Buffer>,
    committed: DashMap<String, Arc<Buffer>>,
    closed: AtomicBool,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Publish a written buffer under `path`.
    pub(crate) fn commit(&self, path: String, buffer: Buffer) -> StoreResult<()> {
        let _guard = self.accountant.lock();
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        let size = buffer.capacity();
        if self.committed.insert(path.clone(), Arc::new(buffer)).is_some() {
            tracing::debug!(%path, "commit replaced an existing file");
        }
        tracing::debug!(%path, size, "committed");
        Ok(())
    }
}

/// Fixed-capacity in-memory file store.
///
/// Callers declare each file's exact size with [`reserve`](KeyValueFileStore::reserve)
/// before creating it. Cloning is cheap and yields another handle to the
/// same store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
    uri: StoreUri,
    capacity: u64,
    bytes_per_checksum: u32,
}

impl MemoryStore {
    /// Create a store from configuration.
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let uri = StoreUri::parse(&config.uri)?;
        let store = Self::build(uri, config.capacity_bytes(), config.bytes_per_checksum)?;
        tracing::info!(uri = %store.uri, capacity = store.capacity, "initialized in-memory store");
        Ok(store)
    }

    /// Create a store with an explicit byte capacity and the default URI.
    pub fn with_capacity(capacity: u64, bytes_per_checksum: u32) -> StoreResult<Self> {
        Self::build(StoreUri::default(), capacity, bytes_per_checksum)
    }

    fn build(uri: StoreUri, capacity: u64, bytes_per_checksum: u32) -> StoreResult<Self> {
        if bytes_per_checksum == 0 {
            return Err(StoreError::invalid_argument(
                "bytes_per_checksum must be positive",
            ));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                accountant: Mutex::new(Accountant::new(capacity)),
                reserved: DashMap::new(),
                committed: DashMap::new(),
                closed: AtomicBool::new(false),
            }),
            uri,
            capacity,
            bytes_per_checksum,
        })
    }

    // ========================================================================
    // Identity and monitoring
    // ========================================================================

    pub fn uri(&self) -> &StoreUri {
        &self.uri
    }

    pub fn name(&self) -> String {
        self.uri.to_string()
    }

    /// Total capacity in bytes.
    pub fn total_capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes currently claimed by reserved and committed buffers.
    pub fn used_bytes(&self) -> u64 {
        self.shared.accountant.lock().used()
    }

    pub fn percent_used(&self) -> f32 {
        self.shared.accountant.lock().percent_used()
    }

    /// Companion size for a data file of `size` bytes.
    pub fn checksum_file_length(&self, size: u64) -> u64 {
        checksum_size(size, self.bytes_per_checksum)
    }

    /// Whether space is currently reserved (but not yet created) for `path`.
    pub fn is_reserved(&self, path: &str) -> bool {
        self.shared.reserved.contains_key(&normalize(path))
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Tear down the store, discarding every reserved and committed buffer.
    ///
    /// Later reservations return false; `create`, `open` and closing an
    /// outstanding writer fail with [`StoreError::Closed`]. Readers already
    /// open keep their buffers.
    pub fn close(&self) {
        let acct = self.shared.accountant.lock();
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let reserved = self.shared.reserved.len();
        let committed = self.shared.committed.len();
        self.shared.reserved.clear();
        self.shared.committed.clear();
        tracing::info!(uri = %self.uri, reserved, committed, used = acct.used(), "closed in-memory store");
    }

    // ========================================================================
    // Fixed responses: no directories, replication, locking or local copies
    // ========================================================================

    /// Locality hint for a byte range: a single `inmemory` cell if the file exists.
    pub fn file_cache_hints(&self, path: &str, _start: u64, _len: u64) -> Option<Vec<Vec<String>>> {
        self.exists(path).then(|| vec![vec!["inmemory".to_string()]])
    }

    pub fn is_directory(&self, _path: &str) -> bool {
        false
    }

    pub fn mkdirs(&self, _path: &str) -> bool {
        false
    }

    /// Hierarchical listing is unsupported; use [`list`](KeyValueFileStore::list).
    pub fn list_paths(&self, _dir: &str) -> Option<Vec<String>> {
        None
    }

    pub fn working_directory(&self) -> String {
        "/".to_string()
    }

    pub fn set_working_directory(&self, _dir: &str) {}

    pub fn replication(&self, _path: &str) -> u16 {
        DEFAULT_REPLICATION
    }

    pub fn set_replication(&self, _path: &str, _replication: u16) -> bool {
        true
    }

    pub fn default_replication(&self) -> u16 {
        DEFAULT_REPLICATION
    }

    pub fn block_size(&self, _path: &str) -> u64 {
        DEFAULT_BLOCK_SIZE
    }

    pub fn default_block_size(&self) -> u64 {
        DEFAULT_BLOCK_SIZE
    }

    pub fn lock(&self, _path: &str, _shared: bool) {}

    pub fn release(&self, _path: &str) {}

    pub fn copy_from_local_file(&self, _src: &str, _dst: &str) {}

    pub fn move_from_local_file(&self, _src: &str, _dst: &str) {}

    pub fn copy_to_local_file(&self, _src: &str, _dst: &str, _copy_crc: bool) {}

    /// Local output goes straight to the store path.
    pub fn start_local_output(&self, fs_output: &str, _tmp_local: &str) -> String {
        fs_output.to_string()
    }

    pub fn complete_local_output(&self, _fs_output: &str, _tmp_local: &str) {}

    pub fn report_checksum_failure(&self, path: &str, pos: u64) {
        tracing::debug!(path, pos, "checksum failure reported, ignoring");
    }
}

impl KeyValueFileStore for MemoryStore {
    type Writer = MemoryWriter;
    type Reader = MemoryReader;

    fn reserve(&self, path: &str, size: u64) -> bool {
        let key = normalize(path);
        let csum_size = checksum_size(size, self.bytes_per_checksum);
        let Some(total) = size.checked_add(csum_size) else {
            return false;
        };

        let mut acct = self.shared.accountant.lock();
        if self.shared.is_closed() {
            return false;
        }
        if !acct.can_admit(total) {
            tracing::debug!(
                path = %key,
                size,
                csum_size,
                available = acct.available(),
                "reservation does not fit"
            );
            return false;
        }

        let buffers = Buffer::allocate(size)
            .and_then(|data| Buffer::allocate(csum_size).map(|csum| (data, csum)));
        let (data, csum) = match buffers {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(path = %key, size, "reservation failed: {}", e);
                return false;
            }
        };

        acct.admit(total);
        self.shared.reserved.insert(checksum_path(&key), csum);
        self.shared.reserved.insert(key.clone(), data);
        tracing::debug!(path = %key, size, csum_size, used = acct.used(), "reserved");
        true
    }

    fn create(&self, path: &str, overwrite: bool) -> StoreResult<MemoryWriter> {
        let key = normalize(path);
        if self.exists(&key) && !overwrite {
            return Err(StoreError::already_exists(key));
        }

        let buffer = {
            let _guard = self.shared.accountant.lock();
            if self.shared.is_closed() {
                return Err(StoreError::Closed);
            }
            self.shared.reserved.remove(&key).map(|(_, buffer)| buffer)
        };

        match buffer {
            Some(buffer) => Ok(MemoryWriter::new(key, buffer, Arc::clone(&self.shared))),
            None => Err(StoreError::not_reserved(key)),
        }
    }

    fn open(&self, path: &str) -> StoreResult<MemoryReader> {
        if self.shared.is_closed() {
            return Err(StoreError::Closed);
        }
        let key = normalize(path);
        let buffer = self
            .shared
            .committed
            .get(&key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StoreError::not_found(&key))?;
        Ok(MemoryReader::new(key, buffer))
    }

    fn rename(&self, src: &str, dst: &str) -> bool {
        let src = normalize(src);
        let dst = normalize(dst);

        let _guard = self.shared.accountant.lock();
        let Some((_, buffer)) = self.shared.committed.remove(&src) else {
            return false;
        };
        // A replaced destination keeps its space accounted.
        if let Some(replaced) = self.shared.committed.insert(dst.clone(), buffer) {
            tracing::debug!(%dst, size = replaced.capacity(), "rename replaced an existing file");
        }
        tracing::debug!(%src, %dst, "renamed");
        true
    }

    fn delete(&self, path: &str) -> bool {
        let key = normalize(path);

        let mut acct = self.shared.accountant.lock();
        match self.shared.committed.remove(&key) {
            Some((_, buffer)) => {
                acct.release(buffer.capacity());
                tracing::debug!(path = %key, size = buffer.capacity(), used = acct.used(), "deleted");
                true
            }
            None => false,
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.shared.committed.contains_key(&normalize(path))
    }

    fn length(&self, path: &str) -> StoreResult<u64> {
        let key = normalize(path);
        self.shared
            .committed
            .get(&key)
            .map(|entry| entry.capacity())
            .ok_or_else(|| StoreError::not_found(&key))
    }

    fn list(&self, filter: &dyn Fn(&str) -> bool) -> std::vec::IntoIter<String> {
        let _guard = self.shared.accountant.lock();
        self.shared
            .committed
            .iter()
            .filter(|entry| filter(entry.key().as_str()))
            .map(|entry| entry.key().clone())
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn bytes_per_checksum(&self) -> u32 {
        self.bytes_per_checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{SequentialReadSeek, SequentialWrite};

    fn store(capacity: u64) -> MemoryStore {
        MemoryStore::with_capacity(capacity, 512).unwrap()
    }

    #[test]
    fn test_reserve_accounts_data_and_checksum() {
        let fs = store(10_000);
        assert!(fs.reserve("/a", 100));
        assert_eq!(fs.used_bytes(), 100 + 12);
        assert!(fs.is_reserved("/a"));
        assert!(fs.is_reserved("/.a.crc"));
        assert!(!fs.exists("/a"));
    }

    #[test]
    fn test_reserve_rejects_exact_fit() {
        let fs = store(1000);
        // 100 data + 12 checksum
        assert!(fs.reserve("/a", 100));
        assert_eq!(fs.used_bytes(), 112);
        // 872 data + 16 checksum == 888 remaining: exact fit is rejected
        assert!(!fs.reserve("/b", 872));
        assert_eq!(fs.used_bytes(), 112);
        assert!(!fs.is_reserved("/b"));
        assert!(fs.reserve("/b", 871));
        assert_eq!(fs.used_bytes(), 999);
    }

    #[test]
    fn test_create_requires_reservation() {
        let fs = store(1000);
        let err = fs.create("/nope", false).unwrap_err();
        assert!(matches!(err, StoreError::NotReserved(_)));
    }

    #[test]
    fn test_create_consumes_reservation_once() {
        let fs = store(1000);
        assert!(fs.reserve("/a", 10));
        let writer = fs.create("/a", false).unwrap();
        assert!(!fs.is_reserved("/a"));
        assert!(matches!(
            fs.create("/a", false).unwrap_err(),
            StoreError::NotReserved(_)
        ));
        writer.close().unwrap();
    }

    #[test]
    fn test_create_existing_without_overwrite() {
        let fs = store(1000);
        assert!(fs.reserve("/a", 4));
        let mut w = fs.create("/a", false).unwrap();
        w.write_bytes(b"abcd").unwrap();
        w.close().unwrap();

        assert!(fs.reserve("/a", 4));
        let err = fs.create("/a", false).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        // Reservation is untouched by the failed create
        assert!(fs.is_reserved("/a"));

        let mut w = fs.create("/a", true).unwrap();
        w.write_bytes(b"wxyz").unwrap();
        w.close().unwrap();
        assert_eq!(fs.read_all("/a").unwrap(), b"wxyz");
    }

    #[test]
    fn test_length_is_reserved_size() {
        let fs = store(1000);
        assert!(fs.reserve("/short", 20));
        let mut w = fs.create("/short", false).unwrap();
        w.write_bytes(b"hi").unwrap();
        w.close().unwrap();

        assert_eq!(fs.length("/short").unwrap(), 20);
        let data = fs.read_all("/short").unwrap();
        assert_eq!(data.len(), 20);
        assert_eq!(&data[..2], b"hi");
        assert!(data[2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_length_missing() {
        let fs = store(1000);
        assert!(matches!(fs.length("/x").unwrap_err(), StoreError::NotFound(_)));
    }

    #[test]
    fn test_path_normalization() {
        let fs = store(1000);
        assert!(fs.reserve("ramfs://local/dir/f", 3));
        let mut w = fs.create("dir/./f", false).unwrap();
        w.write_bytes(b"abc").unwrap();
        w.close().unwrap();

        assert!(fs.exists("/dir/f"));
        assert!(fs.exists("/dir/x/../f"));
        assert_eq!(fs.read_all("ramfs://local/dir/f").unwrap(), b"abc");
    }

    #[test]
    fn test_list_filters_committed_only() {
        let fs = store(10_000);
        for name in ["/in/a", "/in/b", "/out/c"] {
            assert!(fs.put(name, b"data").unwrap());
        }
        assert!(fs.reserve("/in/pending", 1));

        let mut found: Vec<_> = fs.list(&|p: &str| p.starts_with("/in/") && !p.ends_with(".crc")).collect();
        found.sort();
        assert_eq!(found, vec!["/in/a".to_string(), "/in/b".to_string()]);

        let all: Vec<_> = fs.list(&|_: &str| true).collect();
        // three data files plus three companions
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn test_put_rejects_existing() {
        let fs = store(10_000);
        assert!(fs.put("/a", b"one").unwrap());
        let used = fs.used_bytes();
        assert!(matches!(fs.put("/a", b"two").unwrap_err(), StoreError::AlreadyExists(_)));
        assert_eq!(fs.used_bytes(), used);
    }

    #[test]
    fn test_put_no_room() {
        let fs = store(50);
        assert!(!fs.put("/big", &[0u8; 64]).unwrap());
        assert_eq!(fs.used_bytes(), 0);
        assert!(!fs.exists("/big"));
    }

    #[test]
    fn test_verify_companion() {
        let fs = MemoryStore::with_capacity(10_000, 16).unwrap();
        let data: Vec<u8> = (0..100u8).collect();
        assert!(fs.put("/data", &data).unwrap());
        fs.verify("/data").unwrap();
        assert_eq!(fs.length("/.data.crc").unwrap(), fs.checksum_file_length(100));
    }

    #[test]
    fn test_close_discards_everything() {
        let fs = store(10_000);
        assert!(fs.put("/a", b"abc").unwrap());
        assert!(fs.reserve("/b", 5));
        let mut reader = fs.open("/a").unwrap();
        let writer = {
            assert!(fs.reserve("/c", 1));
            fs.create("/c", false).unwrap()
        };

        fs.close();
        assert!(fs.is_closed());
        assert!(!fs.exists("/a"));
        assert!(!fs.is_reserved("/b"));
        assert!(fs.list(&|_: &str| true).next().is_none());
        assert!(!fs.reserve("/d", 1));
        assert!(matches!(fs.open("/a").unwrap_err(), StoreError::Closed));
        assert!(matches!(fs.create("/b", true).unwrap_err(), StoreError::Closed));
        assert!(matches!(writer.close().unwrap_err(), StoreError::Closed));

        // Readers opened before teardown still see their bytes
        assert_eq!(reader.read_byte(), Some(b'a'));

        // Idempotent
        fs.close();
    }

    #[test]
    fn test_fixed_responses() {
        let fs = store(1000);
        assert!(fs.put("/a", b"x").unwrap());
        assert_eq!(
            fs.file_cache_hints("/a", 0, 1),
            Some(vec![vec!["inmemory".to_string()]])
        );
        assert_eq!(fs.file_cache_hints("/b", 0, 1), None);
        assert!(!fs.is_directory("/a"));
        assert!(!fs.mkdirs("/dir"));
        assert_eq!(fs.list_paths("/"), None);
        assert_eq!(fs.replication("/a"), 1);
        assert!(fs.set_replication("/a", 3));
        assert_eq!(fs.replication("/a"), 1);
        assert_eq!(fs.default_replication(), 1);
        assert_eq!(fs.block_size("/a"), 32 * 1024);
        assert_eq!(fs.default_block_size(), 32 * 1024);
        assert_eq!(fs.start_local_output("/out", "/tmp/out"), "/out");
        assert_eq!(fs.working_directory(), "/");
        fs.set_working_directory("/elsewhere");
        assert_eq!(fs.working_directory(), "/");
        fs.lock("/a", true);
        fs.release("/a");
        assert!(fs.exists("/a"));
    }

    #[test]
    fn test_new_from_config() {
        let config = StoreConfig {
            size_mb: 2,
            bytes_per_checksum: 256,
            uri: "ramfs://reduce_3/tmp".to_string(),
        };
        let fs = MemoryStore::new(&config).unwrap();
        assert_eq!(fs.total_capacity(), 2 * 1024 * 1024);
        assert_eq!(fs.name(), "ramfs://reduce_3");
        assert_eq!(fs.uri().authority(), "reduce_3");
        assert_eq!(fs.bytes_per_checksum(), 256);
        assert_eq!(fs.checksum_file_length(1000), 4 * 4 + 8);
    }

    #[test]
    fn test_reserve_huge_size_is_refused() {
        let fs = MemoryStore::with_capacity(u64::MAX, 4).unwrap();
        assert!(!fs.reserve("/huge", u64::MAX));
        assert!(!fs.reserve("/huge", u64::MAX / 2));
        assert_eq!(fs.used_bytes(), 0);
        assert!(!fs.is_reserved("/huge"));

        let fs = MemoryStore::with_capacity(1000, 1).unwrap();
        assert_eq!(fs.checksum_file_length(u64::MAX / 2), u64::MAX);
    }

    #[test]
    fn test_zero_granularity_rejected() {
        assert!(MemoryStore::with_capacity(1000, 0).is_err());
    }
}
