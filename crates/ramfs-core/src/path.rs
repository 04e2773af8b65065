//! Path keys and the store URI.
//!
//! Files are keyed by the path component of whatever the caller passes in.
//! `ramfs://local/a/b`, `/a/b`, `a/b` and `/a/./c/../b` all name `/a/b`.

use std::fmt;

use crate::error::{StoreError, StoreResult};

/// Suffix of a checksum companion's file name.
pub const CHECKSUM_SUFFIX: &str = ".crc";

/// Scheme used when none is configured.
pub const DEFAULT_SCHEME: &str = "ramfs";

/// Normalize a caller path to its key: strip `scheme://authority`, drop `.`,
/// resolve `..`, and render absolute with `/` separators.
pub fn normalize(path: &str) -> String {
    let path = match path.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |idx| &rest[idx..]),
        None => path,
    };

    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }

    let mut result = String::with_capacity(path.len() + 1);
    for part in &parts {
        result.push('/');
        result.push_str(part);
    }
    if result.is_empty() {
        result.push('/');
    }
    result
}

/// Key of the checksum companion for `path`: `parent/.<name>.crc`.
pub fn checksum_path(path: &str) -> String {
    let normalized = normalize(path);
    let (parent, name) = match normalized.rfind('/') {
        Some(idx) => (&normalized[..idx], &normalized[idx + 1..]),
        None => ("", normalized.as_str()),
    };
    format!("{parent}/.{name}{CHECKSUM_SUFFIX}")
}

/// True if `path` names a checksum companion.
pub fn is_checksum_path(path: &str) -> bool {
    let normalized = normalize(path);
    normalized
        .rsplit('/')
        .next()
        .is_some_and(|name| name.starts_with('.') && name.ends_with(CHECKSUM_SUFFIX))
}

/// Identity of a store: `scheme://authority`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreUri {
    scheme: String,
    authority: String,
}

impl StoreUri {
    /// Parse `scheme://authority[/...]`, keeping only scheme and authority.
    pub fn parse(uri: &str) -> StoreResult<Self> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| StoreError::invalid_argument(format!("missing scheme in uri: {uri}")))?;
        if scheme.is_empty() {
            return Err(StoreError::invalid_argument(format!(
                "empty scheme in uri: {uri}"
            )));
        }
        let authority = rest.split('/').next().unwrap_or_default();
        Ok(Self {
            scheme: scheme.to_string(),
            authority: authority.to_string(),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }
}

impl Default for StoreUri {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            authority: "local".to_string(),
        }
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}
