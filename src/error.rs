//! Error types for netabase_kv operations.
//!
//! Store operations return [`NetabaseResult<T>`], whose error carries a closed
//! [`ErrorKind`], a human-readable message naming the resource (and the key,
//! where one is involved) and, for internal failures, the underlying cause.
//!
//! Two lower-level error types feed into it:
//!
//! - [`KvError`]: failures reported by a backend (`Tx`, `Bucket`, `Cursor`).
//! - [`CodecError`]: failures while encoding an entity or decoding a stored value.
//!
//! # Example
//!
//! ```
//! use netabase_kv::error::{ErrorKind, NetabaseError, NetabaseResult};
//!
//! fn lookup(found: bool) -> NetabaseResult<u32> {
//!     if found {
//!         Ok(7)
//!     } else {
//!         Err(NetabaseError::not_found("user not found for key \"0000000000000001\""))
//!     }
//! }
//!
//! let err = lookup(false).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::NotFound);
//! assert!(err.to_string().contains("user not found"));
//! ```

use std::fmt;

use thiserror::Error;

use crate::id::IdError;

/// Boxed, thread-safe error used to preserve an underlying cause.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for store operations.
pub type NetabaseResult<T> = Result<T, NetabaseError>;

/// The closed set of error kinds a store operation can fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// A codec was missing or produced/rejected malformed input.
    InvalidInput,
    /// The key was absent on fetch or delete.
    NotFound,
    /// A uniqueness constraint would be violated.
    Conflict,
    /// Unexpected backend or decode failure.
    Internal,
}

/// Structured error returned by every store operation.
///
/// The message is suitable for surfacing directly to an API caller. When the
/// message is empty the underlying cause is displayed instead.
#[derive(Debug)]
pub struct NetabaseError {
    kind: ErrorKind,
    message: String,
    resource: Option<String>,
    source: Option<BoxError>,
}

impl NetabaseError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            resource: None,
            source: None,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Attach the name of the resource the failing operation acted on.
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl fmt::Display for NetabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, &self.source) {
            (msg, _) if !msg.is_empty() => write!(f, "{}", msg),
            (_, Some(source)) => write!(f, "{}", source),
            _ => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for NetabaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Errors reported by a key-value backend.
#[derive(Error, Debug)]
pub enum KvError {
    #[error("key not found")]
    KeyNotFound,

    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    #[error("transaction is read-only")]
    ReadOnly,

    /// Wraps errors from the sled database
    #[cfg(feature = "sled")]
    #[error(transparent)]
    Sled(#[from] sled::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

impl KvError {
    /// Distinguishes "key/bucket not found" from every other backend failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, KvError::KeyNotFound | KvError::BucketNotFound(_))
    }
}

/// Backend failures surfaced outside a store operation, e.g. from a
/// transaction closure. Not-found failures keep their kind.
impl From<KvError> for NetabaseError {
    fn from(err: KvError) -> Self {
        let kind = if err.is_not_found() {
            ErrorKind::NotFound
        } else {
            ErrorKind::Internal
        };
        NetabaseError::new(kind, "").with_source(err)
    }
}

/// Errors raised by entity encoders and bucket value decoders.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The entity lacks the facet an encoder needs, e.g. `"ID"`.
    #[error("no {0} provided")]
    Missing(&'static str),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("unexpected value decoded")]
    UnexpectedValue,

    #[error("{0}")]
    Other(String),
}
