//! Staging local files into a store.

use std::fmt;
use std::path::PathBuf;

use anyhow::Context;
use ramfs_core::path::is_checksum_path;
use ramfs_core::{KeyValueFileStore, MemoryStore, StoreConfig, StoreError};

/// Outcome of one staging run.
#[derive(Debug, Default)]
pub struct StageReport {
    /// Committed data files with their lengths, sorted by path.
    pub staged: Vec<(String, u64)>,
    /// Files left out, with the reason.
    pub skipped: Vec<(String, String)>,
    pub used: u64,
    pub capacity: u64,
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (path, len) in &self.staged {
            writeln!(f, "{len:>12}  {path}")?;
        }
        for (path, reason) in &self.skipped {
            writeln!(f, "{:>12}  {path} ({reason})", "skipped")?;
        }
        let percent = if self.capacity == 0 {
            0.0
        } else {
            self.used as f64 * 100.0 / self.capacity as f64
        };
        writeln!(
            f,
            "{} staged, {} skipped, {} of {} bytes used ({percent:.1}%)",
            self.staged.len(),
            self.skipped.len(),
            self.used,
            self.capacity
        )
    }
}

/// Stage each file under `/<file name>`, verify every staged file against
/// its checksum companion, then tear the store down.
pub fn stage_files(config: &StoreConfig, files: &[PathBuf]) -> anyhow::Result<StageReport> {
    let store = MemoryStore::new(config)?;
    let mut report = StageReport {
        capacity: store.total_capacity(),
        ..Default::default()
    };

    for file in files {
        let name = file
            .file_name()
            .with_context(|| format!("{} has no file name", file.display()))?;
        let key = format!("/{}", name.to_string_lossy());
        let data = std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;

        match store.put(&key, &data) {
            Ok(true) => tracing::debug!(path = %key, size = data.len(), "staged"),
            Ok(false) => report.skipped.push((key, "no room".to_string())),
            Err(StoreError::AlreadyExists(_)) => report.skipped.push((key, "duplicate name".to_string())),
            Err(e) if e.is_out_of_space() => report.skipped.push((key, e.to_string())),
            Err(e) => return Err(e).with_context(|| format!("failed to stage {}", file.display())),
        }
    }

    let mut staged: Vec<String> = store.list(&|p: &str| !is_checksum_path(p)).collect();
    staged.sort();
    for path in staged {
        store
            .verify(&path)
            .with_context(|| format!("verification failed for {path}"))?;
        let len = store.length(&path)?;
        report.staged.push((path, len));
    }

    report.used = store.used_bytes();
    store.close();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &tempfile::TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    fn small_config() -> StoreConfig {
        StoreConfig {
            size_mb: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_stage_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(&dir, "a.out", b"alpha");
        let b = write_file(&dir, "b.out", &[7u8; 2048]);

        let report = stage_files(&small_config(), &[b, a]).unwrap();
        assert_eq!(
            report.staged,
            vec![("/a.out".to_string(), 5), ("/b.out".to_string(), 2048)]
        );
        assert!(report.skipped.is_empty());
        // 5 + 12 and 2048 + 24
        assert_eq!(report.used, 17 + 2072);
        assert_eq!(report.capacity, 1024 * 1024);
    }

    #[test]
    fn test_stage_skips_what_does_not_fit() {
        let dir = tempfile::tempdir().unwrap();
        let big = write_file(&dir, "big", &vec![0u8; 1024 * 1024]);
        let small = write_file(&dir, "small", b"ok");

        let report = stage_files(&small_config(), &[big, small]).unwrap();
        assert_eq!(report.staged, vec![("/small".to_string(), 2)]);
        assert_eq!(report.skipped, vec![("/big".to_string(), "no room".to_string())]);
    }

    #[test]
    fn test_stage_skips_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_file(&dir, "part", b"one");
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let second = dir.path().join("sub").join("part");
        std::fs::write(&second, b"two").unwrap();

        let report = stage_files(&small_config(), &[first, second]).unwrap();
        assert_eq!(report.staged, vec![("/part".to_string(), 3)]);
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = stage_files(&small_config(), &[PathBuf::from("/nonexistent/ramfs-input")]).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn test_report_display() {
        let report = StageReport {
            staged: vec![("/a".to_string(), 10)],
            skipped: vec![("/b".to_string(), "no room".to_string())],
            used: 22,
            capacity: 100,
        };
        let text = report.to_string();
        assert!(text.contains("/a"));
        assert!(text.contains("skipped  /b (no room)"));
        assert!(text.ends_with("1 staged, 1 skipped, 22 of 100 bytes used (22.0%)\n"));
    }
}
