#![warn(missing_docs)]
//! # soilscan-store
//!
//! ## Purpose
//! Defines the persisted key-value store shared by the `soilscan` workspace.
//!
//! ## Responsibilities
//! - Expose a string-keyed scalar store abstraction ([`KeyValueStore`]).
//! - Provide an in-memory backend for tests and ephemeral runs.
//! - Provide a JSON-file backend that survives process restarts.
//! - Name the three logical keys the workflow reads and writes.
//!
//! ## Data flow
//! Session reader and quota tracker read through [`KeyValueStore::get`].
//! The orchestrator writes the guest counter and clears credentials through
//! [`KeyValueStore::set`] / [`KeyValueStore::remove`].
//!
//! ## Ownership and lifetimes
//! Values are returned as owned `String`s so callers never hold a lock guard
//! across network suspension points.
//!
//! ## Error model
//! Reads are infallible (missing keys are `None`). Writes to the file backend
//! may fail with [`StoreError`].
//!
//! ## Security and privacy notes
//! The file backend stores the bearer token in plain text, like browser local
//! storage. Values are never logged, only keys.
//!
//! ## Example
//! ```rust
//! use soilscan_store::{KeyValueStore, MemoryStore, keys};
//!
//! let store = MemoryStore::new();
//! store.set(keys::GUEST_SCANS, "2").unwrap();
//! assert_eq!(store.get(keys::GUEST_SCANS).as_deref(), Some("2"));
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

/// Logical keys persisted by the workflow.
pub mod keys {
    /// Bearer token written by the external login flow.
    pub const TOKEN: &str = "soil_ai_token";
    /// Username written by the external login flow.
    pub const USERNAME: &str = "soil_ai_user";
    /// Number of analyses performed without a credential.
    pub const GUEST_SCANS: &str = "soil_ai_guest_scans";
}

/// String-keyed scalar storage.
///
/// Every write is a single scalar; no multi-key transaction is offered.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backend cannot persist the write.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes `key`. Removing an absent key is a no-op.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backend cannot persist the removal.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Volatile store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entries`.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Store persisted as one JSON object on disk.
///
/// The whole map is cached in memory and rewritten on every mutation through a
/// sibling temp file followed by a rename. The cache only changes once the
/// write has landed.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens (or lazily creates) the store at `path`.
    ///
    /// A missing file yields an empty store; the file and its parent
    /// directories are created on first write.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] when an existing file cannot be read and
    /// [`StoreError::Corrupt`] when it does not hold a JSON object of strings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
                    path: path.clone(),
                    source,
                })?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "opened file store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let io_error = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let encoded = serde_json::to_vec_pretty(entries).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, encoded).map_err(io_error)?;
        fs::rename(&staging, &self.path).map_err(io_error)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries();
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *entries = next;
        tracing::trace!(key, "store key written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries();
        if entries.contains_key(key) {
            let mut next = entries.clone();
            next.remove(key);
            self.persist(&next)?;
            *entries = next;
            tracing::trace!(key, "store key removed");
        }
        Ok(())
    }
}

/// Errors produced by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure while reading or writing the backing file.
    #[error("store io failure at {path}: {source}")]
    Io {
        /// Backing file path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Backing file exists but is not a JSON object of strings.
    #[error("store file {path} is corrupt: {source}")]
    Corrupt {
        /// Backing file path.
        path: PathBuf,
        /// Underlying decode error.
        source: serde_json::Error,
    },
}
