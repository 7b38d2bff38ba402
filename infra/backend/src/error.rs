//! # Backend Errors
//!
//! This module defines the [`BackendError`] enum returned by every
//! [`SecretBackend`](crate::SecretBackend) implementation. `NotFound` is the only kind callers are
//! expected to branch on; everything else is opaque and only gets wrapped with context upstream.

use std::borrow::Cow;

/// A specialized [`BackendError`] enum of this crate.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The requested `(namespace, key)` has no entry in the backend.
    #[error("Secret not found in backend{}", format_context(.context))]
    NotFound { context: Option<Cow<'static, str>> },

    /// The value exceeds the maximum entry size enforced by the backend.
    #[error(
        "Entry too large{}: {size} bytes exceeds the {limit} byte limit",
        format_context(.context)
    )]
    EntryTooLarge { size: usize, limit: usize, context: Option<Cow<'static, str>> },

    /// Failure reported by the platform credential vault.
    #[cfg(feature = "os-keyring")]
    #[error("Platform keyring failure{}: {source}", format_context(.context))]
    Keyring { source: keyring::Error, context: Option<Cow<'static, str>> },

    /// Internal fallback for unexpected issues or custom backends.
    #[error("Internal backend error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl BackendError {
    /// Creates a [`BackendError::NotFound`] without context.
    #[must_use]
    pub const fn not_found() -> Self {
        Self::NotFound { context: None }
    }

    /// Returns `true` if the failure means the entry does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    fn set_context(&mut self, value: Cow<'static, str>) {
        match self {
            Self::NotFound { context }
            | Self::EntryTooLarge { context, .. }
            | Self::Internal { context, .. } => *context = Some(value),
            #[cfg(feature = "os-keyring")]
            Self::Keyring { context, .. } => *context = Some(value),
        }
    }
}

/// Adds `.context(...)` to backend results.
pub trait BackendErrorExt<T> {
    /// Attaches a human-readable context to the error, replacing any previous one.
    ///
    /// # Errors
    /// Returns the original error converted into [`BackendError`] with the context set.
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, BackendError>;
}

impl<T> BackendErrorExt<T> for Result<T, BackendError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut e| {
            e.set_context(context.into());
            e
        })
    }
}

#[cfg(feature = "os-keyring")]
impl<T> BackendErrorExt<T> for Result<T, keyring::Error> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, BackendError> {
        self.map_err(|source| {
            let mut e = BackendError::from(source);
            e.set_context(context.into());
            e
        })
    }
}

#[cfg(feature = "os-keyring")]
impl From<keyring::Error> for BackendError {
    #[inline]
    fn from(source: keyring::Error) -> Self {
        match source {
            keyring::Error::NoEntry => Self::NotFound { context: None },
            source => Self::Keyring { source, context: None },
        }
    }
}

impl From<&'static str> for BackendError {
    #[inline]
    fn from(s: &'static str) -> Self {
        Self::Internal { message: Cow::Borrowed(s), context: None }
    }
}

impl From<String> for BackendError {
    #[inline]
    fn from(s: String) -> Self {
        Self::Internal { message: Cow::Owned(s), context: None }
    }
}

#[allow(clippy::ref_option)]
fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display_and_kind() {
        let err = BackendError::not_found();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Secret not found in backend");
    }

    #[test]
    fn test_context_is_rendered() {
        let res: Result<(), BackendError> = Err("disk on fire".into());
        let err = res.context("svc/key").unwrap_err();
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "Internal backend error (svc/key): disk on fire");
    }

    #[cfg(feature = "os-keyring")]
    #[test]
    fn test_keyring_no_entry_maps_to_not_found() {
        let res: Result<(), keyring::Error> = Err(keyring::Error::NoEntry);
        let err = res.context("lookup").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Secret not found in backend (lookup)");
    }
}
