use crate::codec::SecretValue;
use crate::engine::SecretStorage;
use keystash_backend::SecretBackend;
use private::Sealed;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct NoBackend;

pub struct WithBackend(Arc<dyn SecretBackend>);

impl fmt::Debug for WithBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WithBackend").field(&self.0).finish()
    }
}

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoBackend {}
impl Sealed for WithBackend {}

/// Type-state builder for [`SecretStorage`].
///
/// A backend must be chosen before the storage can be built:
///
/// ```rust
/// use keystash_storage::{MemoryBackend, SecretStorage};
///
/// let storage = SecretStorage::<Vec<u8>>::builder().backend(MemoryBackend::new()).build();
/// # let _ = storage;
/// ```
#[allow(private_bounds)]
pub struct SecretStorageBuilder<V, S: Sealed = NoBackend> {
    state: S,
    _value: PhantomData<fn() -> V>,
}

#[allow(private_bounds)]
impl<V, S: Sealed + fmt::Debug> fmt::Debug for SecretStorageBuilder<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretStorageBuilder").field("state", &self.state).finish()
    }
}

#[allow(private_bounds)]
impl<V: SecretValue, S: Sealed> SecretStorageBuilder<V, S> {
    fn transition<N: Sealed>(self, state: N) -> SecretStorageBuilder<V, N> {
        SecretStorageBuilder { state, _value: PhantomData }
    }
}

impl<V: SecretValue> SecretStorageBuilder<V, NoBackend> {
    #[must_use = "Creates a new storage builder without a backend"]
    pub fn new() -> Self {
        Self { state: NoBackend, _value: PhantomData }
    }

    /// Uses `backend` for every entry of the storage.
    ///
    /// Pass an `Arc` to keep a handle to the backend outside the storage.
    #[must_use = "Sets the backend of the storage"]
    pub fn backend(
        self,
        backend: impl SecretBackend + 'static,
    ) -> SecretStorageBuilder<V, WithBackend> {
        self.transition(WithBackend(Arc::new(backend)))
    }

    /// Uses the platform credential vault.
    #[cfg(feature = "os-keyring")]
    #[must_use = "Sets the backend of the storage"]
    pub fn keyring(self) -> SecretStorageBuilder<V, WithBackend> {
        self.backend(keystash_backend::KeyringBackend::new())
    }
}

impl<V: SecretValue> Default for SecretStorageBuilder<V, NoBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: SecretValue> SecretStorageBuilder<V, WithBackend> {
    /// Consumes the builder and returns a ready [`SecretStorage`] handle.
    #[must_use]
    pub fn build(self) -> SecretStorage<V> {
        let backend = self.state.0;
        debug!(?backend, value = std::any::type_name::<V>(), "Secret storage created");
        SecretStorage::from_backend(backend)
    }
}
