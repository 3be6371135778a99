//! Codec contracts a [`StoreBase`](crate::store::StoreBase) is configured with.
//!
//! Each contract is a small trait so stores can be specialised without being
//! modified. Closures implement [`DecodeBucketVal`] and [`ConvertValToEnt`]
//! directly; field-labelled closure encoders are built with
//! [`encoder`](crate::codec::encoder).

use crate::entity::Entity;
use crate::error::CodecError;

/// A decoded bucket entry, or `None` when the decoder signals the end of the
/// sequence.
pub type Decoded<V> = Option<(Vec<u8>, V)>;

/// Encodes an entity into a key or a body.
pub trait EncodeEnt<B>: Send + Sync {
    /// Name of the encoded field, used in error messages only.
    fn field(&self) -> &'static str;

    fn encode(&self, ent: &Entity<B>) -> Result<Vec<u8>, CodecError>;
}

/// Decodes a raw bucket pair into the store's value type. The returned key may
/// be rewritten.
pub trait DecodeBucketVal<V>: Send + Sync {
    fn decode(&self, key: &[u8], value: &[u8]) -> Result<Decoded<V>, CodecError>;
}

impl<V, F> DecodeBucketVal<V> for F
where
    F: Fn(&[u8], &[u8]) -> Result<Decoded<V>, CodecError> + Send + Sync,
{
    fn decode(&self, key: &[u8], value: &[u8]) -> Result<Decoded<V>, CodecError> {
        self(key, value)
    }
}

/// Turns a decoded value back into an entity, e.g. to build the key of a
/// related index record.
pub trait ConvertValToEnt<B, V>: Send + Sync {
    fn convert(&self, key: &[u8], value: &V) -> Result<Entity<B>, CodecError>;
}

impl<B, V, F> ConvertValToEnt<B, V> for F
where
    F: Fn(&[u8], &V) -> Result<Entity<B>, CodecError> + Send + Sync,
{
    fn convert(&self, key: &[u8], value: &V) -> Result<Entity<B>, CodecError> {
        self(key, value)
    }
}
