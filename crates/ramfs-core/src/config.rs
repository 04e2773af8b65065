//! Store configuration.
//!
//! ```toml
//! size_mb = 100
//! bytes_per_checksum = 512
//! uri = "ramfs://local"
//! ```
//!
//! Every field is optional; missing fields take the defaults above.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::path::StoreUri;

/// Default capacity in megabytes.
pub const DEFAULT_SIZE_MB: u64 = 100;

/// Default checksum granularity in bytes.
pub const DEFAULT_BYTES_PER_CHECKSUM: u32 = 512;

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Construction parameters for a [`MemoryStore`](crate::MemoryStore).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Total capacity in megabytes (1 MB = 1024 * 1024 bytes).
    pub size_mb: u64,
    /// Data bytes covered by one checksum value.
    pub bytes_per_checksum: u32,
    /// `scheme://authority` identifying the store.
    pub uri: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            size_mb: DEFAULT_SIZE_MB,
            bytes_per_checksum: DEFAULT_BYTES_PER_CHECKSUM,
            uri: StoreUri::default().to_string(),
        }
    }
}

impl StoreConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bytes_per_checksum == 0 {
            return Err(ConfigError::Invalid(
                "bytes_per_checksum must be positive".into(),
            ));
        }
        if self.size_mb.checked_mul(1024 * 1024).is_none() {
            return Err(ConfigError::Invalid(format!(
                "size_mb {} overflows a byte count",
                self.size_mb
            )));
        }
        StoreUri::parse(&self.uri).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    /// Capacity in bytes.
    pub fn capacity_bytes(&self) -> u64 {
        self.size_mb.saturating_mul(1024 * 1024)
    }
}
