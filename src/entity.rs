//! Entities and key composition.
//!
//! An [`Entity`] describes one record for a single store operation. It never
//! holds encoded bytes itself: the primary and unique keys are deferred
//! [`EncodeFn`]s so that a store can pick whichever key its codec needs and
//! report a missing or malformed one with the right field name.
//!
//! ```
//! use netabase_kv::entity::{Entity, enc_id, enc_string_case_insensitive, encode};
//! use netabase_kv::id::Id;
//!
//! let org = Id::new(1);
//! let ent: Entity<()> = Entity::new()
//!     .with_pk(enc_id(Id::new(7)))
//!     .with_unique_key(encode([enc_id(org), enc_string_case_insensitive("Ops")]));
//!
//! let unique = (ent.unique_key.as_ref().unwrap())().unwrap();
//! assert_eq!(&unique[..16], b"0000000000000001");
//! assert_eq!(&unique[16..], b"ops");
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::CodecError;
use crate::id::Id;

/// A deferred key encoder.
pub type EncodeFn = Arc<dyn Fn() -> Result<Vec<u8>, CodecError> + Send + Sync>;

/// A logical record description: optional primary key, optional unique key and
/// an optional body to serialize.
pub struct Entity<B> {
    pub pk: Option<EncodeFn>,
    pub unique_key: Option<EncodeFn>,
    pub body: Option<B>,
}

impl<B> Entity<B> {
    pub fn new() -> Self {
        Self {
            pk: None,
            unique_key: None,
            body: None,
        }
    }

    /// Shortcut for an entity identified only by its [`Id`].
    pub fn from_id(id: Id) -> Self {
        Self::new().with_pk(enc_id(id))
    }

    pub fn with_pk(mut self, pk: EncodeFn) -> Self {
        self.pk = Some(pk);
        self
    }

    pub fn with_unique_key(mut self, unique_key: EncodeFn) -> Self {
        self.unique_key = Some(unique_key);
        self
    }

    pub fn with_body(mut self, body: B) -> Self {
        self.body = Some(body);
        self
    }

    /// The same keys without a body.
    pub fn keys_only<C>(&self) -> Entity<C> {
        Entity {
            pk: self.pk.clone(),
            unique_key: self.unique_key.clone(),
            body: None,
        }
    }
}

impl<B> Default for Entity<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Clone> Clone for Entity<B> {
    fn clone(&self) -> Self {
        Self {
            pk: self.pk.clone(),
            unique_key: self.unique_key.clone(),
            body: self.body.clone(),
        }
    }
}

impl<B: fmt::Debug> fmt::Debug for Entity<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("pk", &self.pk.is_some())
            .field("unique_key", &self.unique_key.is_some())
            .field("body", &self.body)
            .finish()
    }
}

/// Concatenate the output of several encoders. The first failing part aborts.
pub fn encode<I>(parts: I) -> EncodeFn
where
    I: IntoIterator<Item = EncodeFn>,
{
    let parts: Vec<EncodeFn> = parts.into_iter().collect();
    Arc::new(move || {
        let mut key = Vec::new();
        for part in &parts {
            key.extend_from_slice(&part()?);
        }
        Ok(key)
    })
}

/// Encode an [`Id`]. Fails when the ID is zero.
pub fn enc_id(id: Id) -> EncodeFn {
    Arc::new(move || Ok(id.encode()?.to_vec()))
}

pub fn enc_string(s: impl Into<String>) -> EncodeFn {
    let s = s.into();
    Arc::new(move || Ok(s.as_bytes().to_vec()))
}

/// Encode a string lowercased, so names differing only in case collide.
pub fn enc_string_case_insensitive(s: impl AsRef<str>) -> EncodeFn {
    enc_string(s.as_ref().to_lowercase())
}

pub fn enc_bytes(b: impl Into<Vec<u8>>) -> EncodeFn {
    let b = b.into();
    Arc::new(move || Ok(b.clone()))
}
