use crate::codec::SecretValue;
use crate::engine::SecretStorage;
use crate::error::StorageError;
use std::fmt;
use std::sync::Arc;

/// A lightweight view of a [`SecretStorage`] scoped to one namespace.
///
/// Typically the namespace is the application or service name and keys name individual
/// credentials. Cloning is cheap: the view holds the shared storage handle and the name.
///
/// ```rust
/// use keystash_storage::{MemoryBackend, SecretStorage, StorageError};
///
/// # fn main() -> Result<(), StorageError> {
/// let storage = SecretStorage::<String>::builder().backend(MemoryBackend::new()).build();
/// let github = storage.namespace("github")?;
///
/// github.set("token", &"ghp_123".to_owned())?;
/// assert_eq!(storage.get("github", "token")?, "ghp_123");
/// # Ok(())
/// # }
/// ```
pub struct NamespacedSecrets<V> {
    storage: SecretStorage<V>,
    namespace: Arc<str>,
}

impl<V> Clone for NamespacedSecrets<V> {
    fn clone(&self) -> Self {
        Self { storage: self.storage.clone(), namespace: Arc::clone(&self.namespace) }
    }
}

impl<V> fmt::Debug for NamespacedSecrets<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespacedSecrets").field("namespace", &self.namespace).finish()
    }
}

impl<V: SecretValue> NamespacedSecrets<V> {
    pub(crate) fn new(storage: SecretStorage<V>, namespace: String) -> Self {
        Self { storage, namespace: namespace.into() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.namespace
    }

    /// Reads the value stored at `key` in this namespace.
    ///
    /// # Errors
    /// See [`SecretStorage::get`].
    pub fn get(&self, key: &str) -> Result<V, StorageError> {
        self.storage.get(&self.namespace, key)
    }

    /// Stores `value` at `key` in this namespace.
    ///
    /// # Errors
    /// See [`SecretStorage::set`].
    pub fn set(&self, key: &str, value: &V) -> Result<(), StorageError> {
        self.storage.set(&self.namespace, key, value)
    }

    /// Removes the value at `key` in this namespace.
    ///
    /// # Errors
    /// See [`SecretStorage::delete`].
    pub fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.storage.delete(&self.namespace, key)
    }
}
