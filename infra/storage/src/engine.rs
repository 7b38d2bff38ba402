//! Core storage engine: the [`SecretStorage`] handle and the per-call state machines.
//!
//! Every public operation takes the lock of its `(namespace, key)` identity for the whole call:
//! `get` shares it, `set` and `delete` hold it exclusively. Backend calls for multipart records
//! are issued sequentially, page by page, under that lock.

use crate::builder::{NoBackend, SecretStorageBuilder};
use crate::codec::SecretValue;
use crate::envelope::{self, EnvelopeError, Page};
use crate::error::{StorageError, StorageErrorExt};
use crate::locks::LockRegistry;
use crate::namespace::NamespacedSecrets;
use keystash_backend::SecretBackend;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// The internal shared state of a [`SecretStorage`] instance.
#[derive(Debug)]
struct StorageInner {
    /// The single-string-per-identity store every record ends up in.
    backend: Arc<dyn SecretBackend>,
    /// Reader/writer locks, one per identity touched by this instance and its clones.
    locks: LockRegistry,
}

/// A thread-safe, typed handle to a secret store.
///
/// `SecretStorage<V>` stores values of one representation `V` (fixed at construction) in a
/// [`SecretBackend`] that accepts at most [`MAX_ENTRY_SIZE`](envelope::MAX_ENTRY_SIZE) bytes per
/// entry. Larger payloads are split into pages transparently; see [`envelope`] for the layout.
///
/// Clones share the backend and the identity locks, so operations issued through any clone
/// are serialized against each other.
///
/// # Example
///
/// ```rust
/// use keystash_storage::{MemoryBackend, SecretStorage, StorageError};
///
/// # fn main() -> Result<(), StorageError> {
/// let storage = SecretStorage::<String>::builder().backend(MemoryBackend::new()).build();
///
/// let certificate = "-----BEGIN CERTIFICATE-----".repeat(200);
/// storage.set("my-app", "tls-cert", &certificate)?;
/// assert_eq!(storage.get("my-app", "tls-cert")?, certificate);
///
/// storage.delete("my-app", "tls-cert")?;
/// assert!(storage.get("my-app", "tls-cert").unwrap_err().is_not_found());
/// # Ok(())
/// # }
/// ```
pub struct SecretStorage<V> {
    inner: Arc<StorageInner>,
    _value: PhantomData<fn() -> V>,
}

impl<V> Clone for SecretStorage<V> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner), _value: PhantomData }
    }
}

impl<V> fmt::Debug for SecretStorage<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretStorage")
            .field("backend", &self.inner.backend)
            .field("identities", &self.inner.locks.len())
            .finish()
    }
}

#[cfg(feature = "os-keyring")]
impl<V: SecretValue> Default for SecretStorage<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: SecretValue> SecretStorage<V> {
    /// Creates a storage backed by the platform credential vault.
    #[cfg(feature = "os-keyring")]
    #[must_use]
    pub fn new() -> Self {
        Self::builder().keyring().build()
    }

    #[must_use = "The storage is not created until you call .build()"]
    pub fn builder() -> SecretStorageBuilder<V, NoBackend> {
        SecretStorageBuilder::new()
    }

    pub(crate) fn from_backend(backend: Arc<dyn SecretBackend>) -> Self {
        let inner = StorageInner { backend, locks: LockRegistry::new() };
        Self { inner: Arc::new(inner), _value: PhantomData }
    }

    /// Returns a view scoped to one namespace.
    ///
    /// # Errors
    /// Returns [`StorageError::InvalidIdentity`] if `name` is empty.
    pub fn namespace(&self, name: impl Into<String>) -> Result<NamespacedSecrets<V>, StorageError> {
        let name = name.into();
        if name.is_empty() {
            return Err(invalid_identity("namespace cannot be empty"));
        }
        Ok(NamespacedSecrets::new(self.clone(), name))
    }

    /// Reads the value stored at `(namespace, key)`.
    ///
    /// Multipart records are reassembled from their pages in order. Nothing is mutated on
    /// any failure path.
    ///
    /// # Errors
    /// * [`StorageError::Backend`] If the entry or one of its pages cannot be read; a missing
    ///   entry satisfies [`StorageError::is_not_found`].
    /// * [`StorageError::InvalidRecord`] If the main entry holds a malformed marker.
    /// * [`StorageError::Codec`] If the payload does not decode to `V`.
    pub fn get(&self, namespace: &str, key: &str) -> Result<V, StorageError> {
        validate_identity(namespace, key)?;

        let lock = self.inner.locks.lock_for(namespace, key);
        let _guard = lock.read();

        let payload = self.read(namespace, key)?;
        V::unmarshal(payload).context("failed to unmarshal data read from keyring")
    }

    /// Stores `value` at `(namespace, key)`, replacing any previous record.
    ///
    /// The previous record is always torn down first so that a smaller value never leaves
    /// pages of a larger one behind. A payload over
    /// [`MAX_ENTRY_SIZE`](envelope::MAX_ENTRY_SIZE) bytes is written page by page and the
    /// marker goes last; if a page write fails, the pages already written are removed again.
    ///
    /// # Errors
    /// * [`StorageError::Codec`] If `value` cannot be encoded. The backend is untouched.
    /// * [`StorageError::InvalidRecord`] If a single-entry payload starts with the multipart
    ///   media type and would be read back as a marker. The backend is untouched.
    /// * [`StorageError::Backend`] If removing the previous record or writing a page or the
    ///   single entry fails.
    /// * [`StorageError::OrphanedPages`] If every page was written but the marker was not.
    pub fn set(&self, namespace: &str, key: &str, value: &V) -> Result<(), StorageError> {
        validate_identity(namespace, key)?;

        let lock = self.inner.locks.lock_for(namespace, key);
        let _guard = lock.write();

        let payload = value.marshal().context("failed to marshal data for writing to keyring")?;

        if !envelope::should_split(&payload) && envelope::is_marker_like(&payload) {
            return Err(marker_error(EnvelopeError::MarkerCollision, ""));
        }

        if let Err(e) = self.remove(namespace, key)
            && !e.is_not_found()
        {
            return Err(e).context("failed to delete old data in keyring");
        }

        if !envelope::should_split(&payload) {
            debug!(namespace, key, size = payload.len(), "Writing single-entry secret");
            return self
                .inner
                .backend
                .set(namespace, key, &payload)
                .context("failed to write data to keyring");
        }

        let pages = envelope::plan_pages(&payload);
        debug!(
            namespace,
            key,
            size = payload.len(),
            pages = pages.len(),
            "Writing multipart secret"
        );

        let mut write = MultipartWrite::new(self.inner.backend.as_ref(), namespace, key);
        for page in &pages {
            write.write_page(page, &payload)?;
        }
        write.commit()
    }

    /// Removes the record at `(namespace, key)`, pages included.
    ///
    /// If a page cannot be deleted, the remaining pages are skipped but the main entry is
    /// still removed, so later reads report the secret as missing.
    ///
    /// # Errors
    /// * [`StorageError::Backend`] If nothing is stored at the identity (see
    ///   [`StorageError::is_not_found`]) or a delete fails.
    /// * [`StorageError::InvalidRecord`] If the main entry holds a malformed marker.
    /// * [`StorageError::Aggregate`] If both a page delete and the main-entry delete fail.
    pub fn delete(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        validate_identity(namespace, key)?;

        let lock = self.inner.locks.lock_for(namespace, key);
        let _guard = lock.write();

        self.remove(namespace, key)
    }

    /// Read path of `get`; the caller holds the identity lock.
    fn read(&self, namespace: &str, key: &str) -> Result<String, StorageError> {
        let value =
            self.inner.backend.get(namespace, key).context("failed to read data from keyring")?;

        let Some(pages) = envelope::decode_marker(&value).map_err(|e| marker_error(e, ""))? else {
            return Ok(value);
        };
        debug!(namespace, key, pages, "Reading multipart secret");

        let mut payload = String::new();
        for number in 1..=pages {
            let page = self
                .inner
                .backend
                .get(namespace, &envelope::page_key(key, number))
                .context(format!("failed to read multipart data #{number} from keyring"))?;
            payload.push_str(&page);
        }

        Ok(payload)
    }

    /// Delete path shared by `delete` and `set`; the caller holds the identity write lock.
    fn remove(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let backend = self.inner.backend.as_ref();
        let value = backend.get(namespace, key).context("failed to delete data in keyring")?;

        let pages = envelope::decode_marker(&value).map_err(|e| marker_error(e, " for deletion"))?;
        let Some(pages) = pages else {
            return backend.delete(namespace, key).context("failed to delete data in keyring");
        };
        debug!(namespace, key, pages, "Deleting multipart secret");

        let mut page_error = None;
        for number in 1..=pages {
            if let Err(source) = backend.delete(namespace, &envelope::page_key(key, number)) {
                warn!(
                    namespace,
                    key,
                    page = number,
                    error = %source,
                    "Page delete failed, removing main entry anyway"
                );
                let context = format!("failed to delete multipart data #{number} in keyring");
                page_error = Some(StorageError::Backend { source, context: Some(context.into()) });
                break;
            }
        }

        match backend.delete(namespace, key).context("failed to delete data in keyring") {
            Ok(()) => page_error.map_or(Ok(()), Err),
            Err(main) => Err(StorageError::combine(page_error, main)),
        }
    }
}

/// Progress of a multipart write: pages `1..=pages_written` are in the backend.
struct MultipartWrite<'a> {
    backend: &'a dyn SecretBackend,
    namespace: &'a str,
    key: &'a str,
    pages_written: usize,
}

impl<'a> MultipartWrite<'a> {
    const fn new(backend: &'a dyn SecretBackend, namespace: &'a str, key: &'a str) -> Self {
        Self { backend, namespace, key, pages_written: 0 }
    }

    /// Writes the next page. On failure the pages written so far are rolled back.
    fn write_page(&mut self, page: &Page, payload: &str) -> Result<(), StorageError> {
        debug_assert_eq!(page.number, self.pages_written + 1);

        let page_key = envelope::page_key(self.key, page.number);
        if let Err(source) = self.backend.set(self.namespace, &page_key, page.slice(payload)) {
            self.rollback();
            let context = format!("failed to write multipart data #{} to keyring", page.number);
            return Err(StorageError::Backend { source, context: Some(context.into()) });
        }

        self.pages_written += 1;
        Ok(())
    }

    /// Best-effort removal of the pages written so far. Failures are logged, not reported.
    fn rollback(&mut self) {
        debug!(
            namespace = self.namespace,
            key = self.key,
            pages = self.pages_written,
            "Rolling back partial multipart write"
        );

        for number in 1..=self.pages_written {
            let page_key = envelope::page_key(self.key, number);
            if let Err(error) = self.backend.delete(self.namespace, &page_key) {
                warn!(
                    namespace = self.namespace,
                    key = self.key,
                    page = number,
                    %error,
                    "Failed to roll back multipart page"
                );
            }
        }
        self.pages_written = 0;
    }

    /// Writes the marker that makes the pages visible.
    fn commit(self) -> Result<(), StorageError> {
        let marker = envelope::encode_marker(self.pages_written);

        self.backend.set(self.namespace, self.key, &marker).map_err(|source| {
            warn!(
                namespace = self.namespace,
                key = self.key,
                pages = self.pages_written,
                error = %source,
                "Marker write failed, multipart pages left in place"
            );
            StorageError::OrphanedPages {
                pages: self.pages_written,
                source,
                context: Some("failed to write data to keyring".into()),
            }
        })
    }
}

fn marker_error(source: EnvelopeError, suffix: &str) -> StorageError {
    let step = match &source {
        EnvelopeError::InvalidParams { .. } => "failed to get params from data",
        EnvelopeError::InvalidPages { .. } => "failed to get pages from data",
        EnvelopeError::PageCountOutOfRange { .. } => "failed to validate pages from data",
        EnvelopeError::MarkerCollision => "value collides with the multipart marker",
    };
    StorageError::InvalidRecord { source, context: Some(format!("{step}{suffix}").into()) }
}

fn invalid_identity(message: &'static str) -> StorageError {
    StorageError::InvalidIdentity { message: message.into(), context: None }
}

pub(crate) fn validate_identity(namespace: &str, key: &str) -> Result<(), StorageError> {
    if namespace.is_empty() {
        return Err(invalid_identity("namespace cannot be empty"));
    }
    if key.is_empty() {
        return Err(invalid_identity("key cannot be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystash_backend::MemoryBackend;

    fn storage() -> (Arc<MemoryBackend>, SecretStorage<String>) {
        let backend = Arc::new(MemoryBackend::new());
        let storage = SecretStorage::builder().backend(Arc::clone(&backend)).build();
        (backend, storage)
    }

    #[test]
    fn test_empty_identity_is_rejected_before_backend() {
        let (backend, storage) = storage();

        let err = storage.set("", "key", &"v".to_owned()).unwrap_err();
        assert!(matches!(err, StorageError::InvalidIdentity { .. }));
        let err = storage.get("svc", "").unwrap_err();
        assert!(matches!(err, StorageError::InvalidIdentity { .. }));
        assert!(storage.namespace("").is_err());

        assert!(backend.is_empty());
        assert!(storage.inner.locks.is_empty());
    }

    #[test]
    fn test_marker_errors_name_the_step() {
        let (backend, storage) = storage();

        backend.set("svc", "a", "application/multipart-secret; pages=x").unwrap();
        let err = storage.get("svc", "a").unwrap_err();
        assert_eq!(err.context(), Some("failed to get pages from data"));

        let err = storage.delete("svc", "a").unwrap_err();
        assert_eq!(err.context(), Some("failed to get pages from data for deletion"));

        backend.set("svc", "b", "application/multipart-secret; pages").unwrap();
        let err = storage.get("svc", "b").unwrap_err();
        assert_eq!(err.context(), Some("failed to get params from data"));

        backend.set("svc", "c", "application/multipart-secret; pages=1").unwrap();
        let err = storage.get("svc", "c").unwrap_err();
        assert!(err.to_string().ends_with("Invalid secret pages: 1"));

        let err = storage.set("svc", "d", &"application/multipart-secret".to_owned()).unwrap_err();
        assert_eq!(err.context(), Some("value collides with the multipart marker"));
        assert!(!backend.contains("svc", "d"));
    }

    #[test]
    fn test_clones_share_locks_and_backend() {
        let (backend, storage) = storage();
        let clone = storage.clone();

        clone.set("svc", "key", &"value".to_owned()).unwrap();

        assert_eq!(storage.get("svc", "key").unwrap(), "value");
        assert_eq!(storage.inner.locks.len(), 1);
        assert!(backend.contains("svc", "key"));
    }

    #[test]
    fn test_debug_never_prints_values() {
        let (_, storage) = storage();
        storage.set("svc", "key", &"hunter2".to_owned()).unwrap();

        let debug = format!("{storage:?}");
        assert!(debug.contains("SecretStorage"));
        assert!(!debug.contains("hunter2"));
    }
}
