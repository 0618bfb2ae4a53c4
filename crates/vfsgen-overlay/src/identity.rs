//! Catalog identity embedded in overlay paths.
//!
//! # Design
//! - Identifiers travel as `[key=value]` tokens at the end of a path segment,
//!   after the human-readable part, so decoding needs no I/O.
//! - The reverse lookup records everything the executor placed, including
//!   episode identifiers that do not fit in a file name.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

/// Attribute key for series (and show) identifiers.
pub const SERIES_KEY: &str = "sid";
/// Attribute key for file identifiers.
pub const FILE_KEY: &str = "fid";
/// Attribute key for episode identifiers on movie folders.
pub const EPISODE_KEY: &str = "eid";

/// Render one `[key=value]` token.
#[must_use]
pub fn token(key: &str, value: &str) -> String {
    format!("[{key}={value}]")
}

/// Extract the value of the last `[key=value]` token in `name`.
#[must_use]
pub fn attribute<'a>(name: &'a str, key: &str) -> Option<&'a str> {
    let marker = format!("[{key}=");
    let start = name.rfind(&marker)? + marker.len();
    let rest = &name[start..];
    let end = rest.find(']')?;
    let value = &rest[..end];
    (!value.is_empty() && !value.contains('[')).then_some(value)
}

/// Recover `(series_id, file_id)` from an overlay path's final segment.
#[must_use]
pub fn decode_identity(path: &Path) -> Option<(String, String)> {
    let name = path.file_name()?.to_str()?;
    let series_id = attribute(name, SERIES_KEY)?;
    let file_id = attribute(name, FILE_KEY)?;
    Some((series_id.to_string(), file_id.to_string()))
}

/// Identity registered for a placed link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkIdentity {
    /// Series the link was planned from.
    pub series_id: String,
    /// File the link points at.
    pub file_id: String,
    /// Episodes covered by the file.
    pub episode_ids: Vec<String>,
}

/// Concurrent `path -> identity` map filled by the executor.
#[derive(Debug, Clone, Default)]
pub struct IdentityLookup {
    entries: Arc<DashMap<PathBuf, LinkIdentity>>,
}

impl IdentityLookup {
    /// Empty lookup.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the identity of a placed link.
    pub fn insert(&self, path: PathBuf, identity: LinkIdentity) {
        self.entries.insert(path, identity);
    }

    /// Identity registered for `path`.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<LinkIdentity> {
        self.entries.get(path).map(|entry| entry.value().clone())
    }

    /// Forget a single path.
    pub fn remove(&self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Forget every path under `prefix`, returning how many were dropped.
    pub fn remove_prefix(&self, prefix: &Path) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| !path.starts_with(prefix));
        before.saturating_sub(self.entries.len())
    }

    /// Number of registered paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
