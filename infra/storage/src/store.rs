use crate::codec::SecretValue;
use crate::engine::SecretStorage;
use crate::error::StorageError;
use std::sync::Arc;

/// The get/set/delete surface of a typed secret store.
///
/// Code that only needs these three operations can take `impl SecretStore<V>` and be handed a
/// [`SecretStorage`] in production and an in-memory fake in tests.
pub trait SecretStore<V>: Send + Sync {
    /// Reads the value stored at `(namespace, key)`.
    ///
    /// # Errors
    /// Returns [`StorageError`] if the value is missing, unreadable or undecodable.
    fn get(&self, namespace: &str, key: &str) -> Result<V, StorageError>;

    /// Stores `value` at `(namespace, key)`, replacing any previous value.
    ///
    /// # Errors
    /// Returns [`StorageError`] if the value cannot be encoded or written.
    fn set(&self, namespace: &str, key: &str, value: &V) -> Result<(), StorageError>;

    /// Removes the value at `(namespace, key)`.
    ///
    /// # Errors
    /// Returns [`StorageError`] if nothing is stored there or the removal fails.
    fn delete(&self, namespace: &str, key: &str) -> Result<(), StorageError>;
}

impl<V: SecretValue> SecretStore<V> for SecretStorage<V> {
    fn get(&self, namespace: &str, key: &str) -> Result<V, StorageError> {
        Self::get(self, namespace, key)
    }

    fn set(&self, namespace: &str, key: &str, value: &V) -> Result<(), StorageError> {
        Self::set(self, namespace, key, value)
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        Self::delete(self, namespace, key)
    }
}

impl<V, S: SecretStore<V> + ?Sized> SecretStore<V> for Arc<S> {
    fn get(&self, namespace: &str, key: &str) -> Result<V, StorageError> {
        (**self).get(namespace, key)
    }

    fn set(&self, namespace: &str, key: &str, value: &V) -> Result<(), StorageError> {
        (**self).set(namespace, key, value)
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        (**self).delete(namespace, key)
    }
}
