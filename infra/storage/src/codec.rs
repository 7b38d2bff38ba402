//! # Value Codecs
//!
//! Converts application values to the string payload written to the backend and back.
//! Three representations are supported, and the choice is made by the type system:
//!
//! | Value type          | Stored payload                          |
//! |---------------------|-----------------------------------------|
//! | [`String`]          | the text itself                          |
//! | [`Vec<u8>`]         | standard base64 of the bytes             |
//! | `T: `[`TextCodec`]  | the UTF-8 text produced by `encode_text` |
//!
//! Any other type fails to compile when used as a storage value:
//!
//! ```compile_fail
//! use keystash_storage::{MemoryBackend, SecretStorage};
//!
//! let storage = SecretStorage::<std::time::Duration>::builder()
//!     .backend(MemoryBackend::new())
//!     .build();
//! ```

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::borrow::Cow;
use std::error::Error as StdError;

/// Failures while converting between a value and its stored payload.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Encoded text or a stored payload is not valid UTF-8.
    #[error("Invalid UTF-8 text: {source}")]
    Utf8 { source: std::string::FromUtf8Error },

    /// A stored byte payload is not valid base64.
    #[error("Invalid base64 payload: {source}")]
    Base64 { source: base64::DecodeError },

    /// The value's own text encoding or decoding failed.
    #[error("{source}")]
    Text { source: Box<dyn StdError + Send + Sync> },
}

/// A structured value with its own text representation.
///
/// # Example
///
/// ```rust
/// use keystash_storage::TextCodec;
///
/// #[derive(Debug, PartialEq)]
/// struct Port(u16);
///
/// impl TextCodec for Port {
///     type Error = std::num::ParseIntError;
///
///     fn encode_text(&self) -> Result<Vec<u8>, Self::Error> {
///         Ok(self.0.to_string().into_bytes())
///     }
///
///     fn decode_text(text: &[u8]) -> Result<Self, Self::Error> {
///         String::from_utf8_lossy(text).parse().map(Port)
///     }
/// }
/// ```
pub trait TextCodec: Sized {
    type Error: StdError + Send + Sync + 'static;

    /// Encodes the value. The bytes must be valid UTF-8.
    ///
    /// # Errors
    /// Returns the type's own error if the value cannot be represented.
    fn encode_text(&self) -> Result<Vec<u8>, Self::Error>;

    /// Decodes a value previously produced by [`TextCodec::encode_text`].
    ///
    /// # Errors
    /// Returns the type's own error if `text` is not a valid encoding.
    fn decode_text(text: &[u8]) -> Result<Self, Self::Error>;
}

mod private {
    pub trait Sealed {}
    impl Sealed for String {}
    impl Sealed for Vec<u8> {}
    impl<T: super::TextCodec> Sealed for T {}
}

/// A value that can be stored by [`SecretStorage`](crate::SecretStorage).
///
/// Sealed: implemented for [`String`], [`Vec<u8>`] and every [`TextCodec`] type.
pub trait SecretValue: private::Sealed + Sized {
    /// Converts the value into its stored payload.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the value cannot be represented as text.
    fn marshal(&self) -> Result<Cow<'_, str>, CodecError>;

    /// Rebuilds a value from its stored payload.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the payload does not decode to this type.
    fn unmarshal(payload: String) -> Result<Self, CodecError>;
}

impl SecretValue for String {
    fn marshal(&self) -> Result<Cow<'_, str>, CodecError> {
        Ok(Cow::Borrowed(self.as_str()))
    }

    fn unmarshal(payload: String) -> Result<Self, CodecError> {
        Ok(payload)
    }
}

impl SecretValue for Vec<u8> {
    fn marshal(&self) -> Result<Cow<'_, str>, CodecError> {
        Ok(Cow::Owned(STANDARD.encode(self)))
    }

    fn unmarshal(payload: String) -> Result<Self, CodecError> {
        STANDARD.decode(payload).map_err(|source| CodecError::Base64 { source })
    }
}

impl<T: TextCodec> SecretValue for T {
    fn marshal(&self) -> Result<Cow<'_, str>, CodecError> {
        let bytes = self.encode_text().map_err(|e| CodecError::Text { source: Box::new(e) })?;
        String::from_utf8(bytes).map(Cow::Owned).map_err(|source| CodecError::Utf8 { source })
    }

    fn unmarshal(payload: String) -> Result<Self, CodecError> {
        T::decode_text(payload.as_bytes()).map_err(|e| CodecError::Text { source: Box::new(e) })
    }
}

#[cfg(feature = "json")]
pub use json::Json;

#[cfg(feature = "json")]
mod json {
    use super::TextCodec;
    use serde::Serialize;
    use serde::de::DeserializeOwned;
    use std::ops::{Deref, DerefMut};

    /// Stores any `serde` type as JSON text.
    ///
    /// ```rust
    /// use keystash_storage::{Json, MemoryBackend, SecretStorage};
    ///
    /// #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    /// struct Token {
    ///     access: String,
    ///     expires_in: u64,
    /// }
    ///
    /// # fn main() -> Result<(), keystash_storage::StorageError> {
    /// let storage = SecretStorage::<Json<Token>>::builder().backend(MemoryBackend::new()).build();
    ///
    /// let token = Json(Token { access: "abc".into(), expires_in: 3600 });
    /// storage.set("oauth", "github", &token)?;
    /// assert_eq!(storage.get("oauth", "github")?, token);
    /// # Ok(())
    /// # }
    /// ```
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct Json<T>(pub T);

    impl<T> Json<T> {
        pub fn into_inner(self) -> T {
            self.0
        }
    }

    impl<T> Deref for Json<T> {
        type Target = T;

        fn deref(&self) -> &T {
            &self.0
        }
    }

    impl<T> DerefMut for Json<T> {
        fn deref_mut(&mut self) -> &mut T {
            &mut self.0
        }
    }

    impl<T: Serialize + DeserializeOwned> TextCodec for Json<T> {
        type Error = serde_json::Error;

        fn encode_text(&self) -> Result<Vec<u8>, Self::Error> {
            serde_json::to_vec(&self.0)
        }

        fn decode_text(text: &[u8]) -> Result<Self, Self::Error> {
            serde_json::from_slice(text).map(Self)
        }
    }
}
