//! # Storage Errors
//!
//! This module defines the [`StorageError`] enum returned by the storage façade. Every variant
//! carries an optional context naming the step that failed (`failed to write multipart data #2
//! to keyring`, ...), so a failure can be traced without ever printing secret content.

use crate::codec::CodecError;
use crate::envelope::EnvelopeError;
use keystash_backend::BackendError;
use std::borrow::Cow;

/// A specialized [`StorageError`] enum of this crate.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The namespace or key cannot name a secret.
    #[error("Invalid identity{}: {message}", format_context(.context))]
    InvalidIdentity { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A backend call failed; `NotFound` lives here.
    #[error("Backend error{}: {source}", format_context(.context))]
    Backend { source: BackendError, context: Option<Cow<'static, str>> },

    /// The main entry carries a malformed or out-of-range multipart marker.
    #[error("Invalid multipart record{}: {source}", format_context(.context))]
    InvalidRecord { source: EnvelopeError, context: Option<Cow<'static, str>> },

    /// The value could not be converted to or from its stored payload.
    #[error("Codec error{}: {source}", format_context(.context))]
    Codec { source: CodecError, context: Option<Cow<'static, str>> },

    /// Every page of a multipart value was written but the marker was not.
    ///
    /// The pages stay in place and are torn down by the next `set` or `delete`.
    #[error(
        "Multipart marker not written{}: {source} ({pages} pages left in place)",
        format_context(.context)
    )]
    OrphanedPages { pages: usize, source: BackendError, context: Option<Cow<'static, str>> },

    /// Several steps failed; reported together.
    #[error("Multiple errors{}: {}", format_context(.context), join_errors(.errors))]
    Aggregate { errors: Vec<StorageError>, context: Option<Cow<'static, str>> },
}

impl StorageError {
    /// Returns `true` if the failure (or any failure it aggregates) is a missing backend entry.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Backend { source, .. } => source.is_not_found(),
            Self::Aggregate { errors, .. } => errors.iter().any(Self::is_not_found),
            _ => false,
        }
    }

    /// Returns the attached context, if any.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::InvalidIdentity { context, .. }
            | Self::Backend { context, .. }
            | Self::InvalidRecord { context, .. }
            | Self::Codec { context, .. }
            | Self::OrphanedPages { context, .. }
            | Self::Aggregate { context, .. } => context.as_deref(),
        }
    }

    fn set_context(&mut self, value: Cow<'static, str>) {
        match self {
            Self::InvalidIdentity { context, .. }
            | Self::Backend { context, .. }
            | Self::InvalidRecord { context, .. }
            | Self::Codec { context, .. }
            | Self::OrphanedPages { context, .. }
            | Self::Aggregate { context, .. } => *context = Some(value),
        }
    }

    /// Combines an optional earlier failure with a later one.
    pub(crate) fn combine(first: Option<Self>, second: Self) -> Self {
        match first {
            None => second,
            Some(first) => Self::Aggregate { errors: vec![first, second], context: None },
        }
    }
}

/// Adds `.context(...)` to results whose error converts into [`StorageError`].
pub trait StorageErrorExt<T> {
    /// Attaches a context describing the failed step, replacing any previous one.
    ///
    /// # Errors
    /// Returns the original error converted into [`StorageError`] with the context set.
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, StorageError>;
}

impl<T, E: Into<StorageError>> StorageErrorExt<T> for Result<T, E> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, StorageError> {
        self.map_err(|e| {
            let mut e = e.into();
            e.set_context(context.into());
            e
        })
    }
}

impl From<BackendError> for StorageError {
    #[inline]
    fn from(source: BackendError) -> Self {
        Self::Backend { source, context: None }
    }
}

impl From<EnvelopeError> for StorageError {
    #[inline]
    fn from(source: EnvelopeError) -> Self {
        Self::InvalidRecord { source, context: None }
    }
}

impl From<CodecError> for StorageError {
    #[inline]
    fn from(source: CodecError) -> Self {
        Self::Codec { source, context: None }
    }
}

#[allow(clippy::ref_option)]
pub(crate) fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

fn join_errors(errors: &[StorageError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
