//! Per-identity reader/writer locks.
//!
//! Readers of one `(namespace, key)` share its lock; a writer holds it exclusively.

use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::trace;

/// The `(namespace, key)` pair naming one logical secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub namespace: String,
    pub key: String,
}

impl Identity {
    #[must_use]
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), key: key.into() }
    }
}

/// Per-identity reader/writer locks.
///
/// A lock is created on first access and reused for the lifetime of the registry; entries are
/// never evicted, so memory grows with the number of distinct identities touched. That is fine
/// for credential workloads, which address a small, fixed set of secrets. Creation is atomic:
/// concurrent first touches of an identity always receive the same lock.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: RwLock<FxHashMap<Identity, Arc<RwLock<()>>>>,
}

impl LockRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock guarding `(namespace, key)`, creating it if needed.
    pub fn lock_for(&self, namespace: &str, key: &str) -> Arc<RwLock<()>> {
        let identity = Identity::new(namespace, key);

        if let Some(lock) = self.locks.read().get(&identity) {
            return Arc::clone(lock);
        }

        let mut locks = self.locks.write();
        Arc::clone(locks.entry(identity).or_insert_with(|| {
            trace!(namespace, key, "Identity lock created");
            Arc::default()
        }))
    }

    /// Number of identities that own a lock.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.read().is_empty()
    }
}
