use crate::SecretBackend;
use crate::error::{BackendError, BackendErrorExt};
use keyring::Entry;
use tracing::trace;

/// [`SecretBackend`] over the platform credential vault.
///
/// Uses macOS Keychain, the Secret Service on Linux/BSD or the Windows Credential Manager,
/// depending on the target. The namespace maps to the keyring *service* and the key to the
/// *user*. A missing entry is reported as [`BackendError::NotFound`].
///
/// Platform vaults cap the size of a single entry; never store values larger than a few KiB
/// through this backend directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringBackend;

impl KeyringBackend {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn entry(namespace: &str, key: &str) -> Result<Entry, BackendError> {
        Entry::new(namespace, key)
            .context(format!("Failed to open keyring entry {namespace}/{key}"))
    }
}

impl SecretBackend for KeyringBackend {
    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), BackendError> {
        Self::entry(namespace, key)?.set_password(value).context("Keyring write failed")?;
        trace!(namespace, key, "Keyring entry stored");
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<String, BackendError> {
        Self::entry(namespace, key)?.get_password().context("Keyring read failed")
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), BackendError> {
        Self::entry(namespace, key)?.delete_password().context("Keyring delete failed")?;
        trace!(namespace, key, "Keyring entry removed");
        Ok(())
    }
}
