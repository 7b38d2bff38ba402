//! Bounded key/value credential backends.
//!
//! A backend stores exactly one string per `(namespace, key)` identity and reports a missing
//! identity as [`BackendError::NotFound`]. Backends do not chunk, encrypt or lock; the storage
//! layer above them owns those concerns and respects the backend's entry size limit.
//!
//! # Implementations
//!
//! - [`KeyringBackend`] (feature `os-keyring`): the platform credential vault.
//! - [`MemoryBackend`]: an in-process map with an optional entry limit.
//!
//! Custom backends only need to implement the three methods of [`SecretBackend`].
//!
//! ```rust
//! use keystash_backend::{BackendError, MemoryBackend, SecretBackend};
//!
//! # fn main() -> Result<(), BackendError> {
//! let backend = MemoryBackend::new();
//! backend.set("my-service", "api-token", "s3cr3t")?;
//! assert_eq!(backend.get("my-service", "api-token")?, "s3cr3t");
//!
//! backend.delete("my-service", "api-token")?;
//! assert!(backend.get("my-service", "api-token").unwrap_err().is_not_found());
//! # Ok(())
//! # }
//! ```

mod error;
mod memory;
#[cfg(feature = "os-keyring")]
mod platform;

pub use error::{BackendError, BackendErrorExt};
pub use memory::MemoryBackend;
#[cfg(feature = "os-keyring")]
pub use platform::KeyringBackend;

use std::fmt::Debug;
use std::sync::Arc;

/// A single-string-per-identity credential store.
///
/// Implementations must be safe to call from any number of threads. They are not required to
/// serialize operations on the same identity.
pub trait SecretBackend: Send + Sync + Debug {
    /// Stores `value` at `(namespace, key)`, replacing any previous value.
    ///
    /// # Errors
    /// Returns a backend-specific [`BackendError`] if the write is rejected.
    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), BackendError>;

    /// Reads the value at `(namespace, key)`.
    ///
    /// # Errors
    /// Returns [`BackendError::NotFound`] if the identity has no entry.
    fn get(&self, namespace: &str, key: &str) -> Result<String, BackendError>;

    /// Removes the value at `(namespace, key)`.
    ///
    /// # Errors
    /// Returns [`BackendError::NotFound`] if the identity has no entry.
    fn delete(&self, namespace: &str, key: &str) -> Result<(), BackendError>;
}

impl<B: SecretBackend + ?Sized> SecretBackend for Arc<B> {
    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), BackendError> {
        (**self).set(namespace, key, value)
    }

    fn get(&self, namespace: &str, key: &str) -> Result<String, BackendError> {
        (**self).get(namespace, key)
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), BackendError> {
        (**self).delete(namespace, key)
    }
}

impl<B: SecretBackend + ?Sized> SecretBackend for Box<B> {
    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), BackendError> {
        (**self).set(namespace, key, value)
    }

    fn get(&self, namespace: &str, key: &str) -> Result<String, BackendError> {
        (**self).get(namespace, key)
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), BackendError> {
        (**self).delete(namespace, key)
    }
}
