//! Typed secret storage on top of size-limited credential vaults.
//!
//! Platform keyrings accept only a few KiB per entry. This crate stores values of any length by
//! splitting large payloads into numbered pages behind a small marker entry, and serializes
//! concurrent access per `(namespace, key)` so readers never observe a half-written record.
//!
//! # Core Features
//!
//! - **Transparent Chunking**: Payloads over 2048 bytes are split into pages; the wire layout is
//!   documented in [`envelope`].
//! - **Typed Values**: Each [`SecretStorage<V>`] stores one representation: [`String`], raw
//!   bytes ([`Vec<u8>`]) or any [`TextCodec`] type such as [`Json<T>`](Json).
//! - **Per-Identity Locking**: Reads of the same secret run in parallel, writes are exclusive,
//!   unrelated secrets never wait for each other.
//! - **Pluggable Backends**: The OS keyring by default, [`MemoryBackend`] for tests, or any
//!   [`SecretBackend`] implementation.
//!
//! # Architectural Overview
//!
//! 1.  **[`SecretStorage`]**: The primary thread-safe handle and entry point.
//! 2.  **[`NamespacedSecrets`]**: A view scoped to one namespace.
//! 3.  **[`SecretStorageBuilder`]**: A type-state builder selecting the backend.
//! 4.  **[`SecretStore`]**: The trait to depend on when a fake store is needed.
//!
//! # Examples
//!
//! ```rust
//! use keystash_storage::{MemoryBackend, SecretStorage, StorageError};
//!
//! # fn main() -> Result<(), StorageError> {
//! let storage = SecretStorage::<Vec<u8>>::builder().backend(MemoryBackend::new()).build();
//!
//! let key_material = vec![0u8; 4096];
//! storage.set("my-app", "signing-key", &key_material)?;
//! assert_eq!(storage.get("my-app", "signing-key")?, key_material);
//! # Ok(())
//! # }
//! ```
//!
//! With the `os-keyring` feature the platform vault is one call away:
//!
//! ```rust,no_run
//! # #[cfg(feature = "os-keyring")]
//! # fn run() -> Result<(), keystash_storage::StorageError> {
//! use keystash_storage::SecretStorage;
//!
//! let storage = SecretStorage::<String>::new();
//! storage.set("my-app", "refresh-token", &"eyJhbGciOi...".to_owned())?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod codec;
mod engine;
pub mod envelope;
mod error;
mod locks;
mod namespace;
mod store;

pub use builder::{NoBackend, SecretStorageBuilder, WithBackend};
#[cfg(feature = "json")]
pub use codec::Json;
pub use codec::{CodecError, SecretValue, TextCodec};
pub use engine::SecretStorage;
pub use error::{StorageError, StorageErrorExt};
pub use locks::{Identity, LockRegistry};
pub use namespace::NamespacedSecrets;
pub use store::SecretStore;

#[cfg(feature = "os-keyring")]
pub use keystash_backend::KeyringBackend;
pub use keystash_backend::{BackendError, MemoryBackend, SecretBackend};
