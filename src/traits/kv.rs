//! Backend interface consumed by the entity store.
//!
//! A backend exposes named, key-ordered buckets inside a transaction. The store
//! never opens or commits transactions itself: every operation receives an open
//! [`Tx`] from the caller, so rollback and isolation are the backend's concern.
//!
//! Cursor primitives return `Ok(None)` once the cursor moves past either end of
//! the bucket, rather than overloading an empty key as an end marker.

use crate::error::KvError;

/// An owned key/value pair read from a bucket.
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// An open transaction over a backend.
pub trait Tx {
    type Bucket: Bucket;

    /// Look up an existing bucket. Fails with [`KvError::BucketNotFound`] when
    /// it was never created.
    fn bucket(&self, name: &[u8]) -> Result<Self::Bucket, KvError>;

    /// Create the bucket if it is missing. Idempotent.
    fn create_bucket_if_not_exists(&self, name: &[u8]) -> Result<Self::Bucket, KvError>;
}

/// A single named, key-ordered collection.
pub trait Bucket {
    type Cursor: Cursor;

    /// Fails with [`KvError::KeyNotFound`] when the key is absent.
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, KvError>;

    /// Insert or overwrite.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError>;

    /// Fails with [`KvError::KeyNotFound`] when the key is absent.
    fn delete(&self, key: &[u8]) -> Result<(), KvError>;

    fn cursor(&self) -> Result<Self::Cursor, KvError>;
}

/// Ordered traversal over one bucket.
///
/// Cursors must be `Send`: prefix scans drive the cursor from a background
/// producer thread while the consumer processes entries.
pub trait Cursor: Send {
    /// Position at the smallest key.
    fn first(&mut self) -> Result<Option<KeyValue>, KvError>;

    /// Position at the largest key.
    fn last(&mut self) -> Result<Option<KeyValue>, KvError>;

    /// Advance to the next larger key.
    fn next(&mut self) -> Result<Option<KeyValue>, KvError>;

    /// Move to the next smaller key.
    fn prev(&mut self) -> Result<Option<KeyValue>, KvError>;

    /// Position at the first key greater than or equal to `seek`.
    fn seek(&mut self, seek: &[u8]) -> Result<Option<KeyValue>, KvError>;
}
