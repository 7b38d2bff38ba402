//! In-process [`SecretBackend`] kept in a hash map.
//!
//! Useful as an alternate backend for tests, ephemeral sessions and environments without a
//! platform credential vault. An optional entry limit reproduces the size threshold of real
//! vaults so that callers can verify they never exceed it.

use crate::error::BackendError;
use crate::SecretBackend;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::fmt;
use tracing::trace;

type EntryKey = (String, String);

/// A thread-safe, in-memory credential store.
///
/// # Example
///
/// ```rust
/// use keystash_backend::{MemoryBackend, SecretBackend};
///
/// let backend = MemoryBackend::with_entry_limit(8);
/// backend.set("svc", "token", "short").unwrap();
/// assert_eq!(backend.get("svc", "token").unwrap(), "short");
///
/// assert!(backend.set("svc", "token", "far too long").is_err());
/// ```
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<FxHashMap<EntryKey, String>>,
    entry_limit: Option<usize>,
}

impl MemoryBackend {
    /// Creates an empty backend without any size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty backend that rejects values longer than `limit` bytes.
    #[must_use]
    pub fn with_entry_limit(limit: usize) -> Self {
        Self { entries: RwLock::default(), entry_limit: Some(limit) }
    }

    /// Returns the configured entry limit, if any.
    #[must_use]
    pub const fn entry_limit(&self) -> Option<usize> {
        self.entry_limit
    }

    /// Number of entries across all namespaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns `true` if an entry exists at `(namespace, key)`.
    #[must_use]
    pub fn contains(&self, namespace: &str, key: &str) -> bool {
        self.entries.read().contains_key(&(namespace.to_owned(), key.to_owned()))
    }

    /// Returns the sorted keys stored under `namespace`.
    #[must_use]
    pub fn keys(&self, namespace: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entries", &self.len())
            .field("entry_limit", &self.entry_limit)
            .finish()
    }
}

impl SecretBackend for MemoryBackend {
    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), BackendError> {
        if let Some(limit) = self.entry_limit
            && value.len() > limit
        {
            return Err(BackendError::EntryTooLarge {
                size: value.len(),
                limit,
                context: Some(format!("{namespace}/{key}").into()),
            });
        }

        self.entries.write().insert((namespace.to_owned(), key.to_owned()), value.to_owned());
        trace!(namespace, key, "Entry stored");
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<String, BackendError> {
        self.entries
            .read()
            .get(&(namespace.to_owned(), key.to_owned()))
            .cloned()
            .ok_or(BackendError::NotFound { context: None })
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), BackendError> {
        match self.entries.write().remove(&(namespace.to_owned(), key.to_owned())) {
            Some(_) => {
                trace!(namespace, key, "Entry removed");
                Ok(())
            },
            None => Err(BackendError::NotFound { context: None }),
        }
    }
}
