//! Stock encoders and decoders.

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::entity::Entity;
use crate::error::CodecError;
use crate::id::Id;
use crate::traits::codec::{Decoded, DecodeBucketVal, EncodeEnt};

/// Encodes the entity's primary key.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncIdKey;

impl<B> EncodeEnt<B> for EncIdKey {
    fn field(&self) -> &'static str {
        "ID"
    }

    fn encode(&self, ent: &Entity<B>) -> Result<Vec<u8>, CodecError> {
        let pk = ent.pk.as_ref().ok_or(CodecError::Missing("ID"))?;
        pk()
    }
}

/// Encodes the entity's unique (secondary) key.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncUniqKey;

impl<B> EncodeEnt<B> for EncUniqKey {
    fn field(&self) -> &'static str {
        "Unique Key"
    }

    fn encode(&self, ent: &Entity<B>) -> Result<Vec<u8>, CodecError> {
        let unique_key = ent.unique_key.as_ref().ok_or(CodecError::Missing("unique key"))?;
        unique_key()
    }
}

/// JSON-encodes the entity body. A missing body encodes as `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncBodyJson;

impl<B: Serialize> EncodeEnt<B> for EncBodyJson {
    fn field(&self) -> &'static str {
        "entity body"
    }

    fn encode(&self, ent: &Entity<B>) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(&ent.body)?)
    }
}

/// Decodes a value holding an encoded [`Id`]; the key is passed through.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecIndexId;

impl DecodeBucketVal<Id> for DecIndexId {
    fn decode(&self, key: &[u8], value: &[u8]) -> Result<Decoded<Id>, CodecError> {
        Ok(Some((key.to_vec(), Id::decode(value)?)))
    }
}

/// Decodes a JSON value into `T`; the key is passed through.
pub struct DecBodyJson<T>(PhantomData<fn() -> T>);

impl<T> DecBodyJson<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for DecBodyJson<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> DecodeBucketVal<T> for DecBodyJson<T> {
    fn decode(&self, key: &[u8], value: &[u8]) -> Result<Decoded<T>, CodecError> {
        Ok(Some((key.to_vec(), serde_json::from_slice(value)?)))
    }
}

/// An [`EncodeEnt`] built from a field label and a closure.
pub struct FieldEncoder<F> {
    field: &'static str,
    f: F,
}

/// Wrap a closure as an entity encoder reporting `field` in errors.
pub fn encoder<B, F>(field: &'static str, f: F) -> FieldEncoder<F>
where
    F: Fn(&Entity<B>) -> Result<Vec<u8>, CodecError> + Send + Sync,
{
    FieldEncoder { field, f }
}

impl<B, F> EncodeEnt<B> for FieldEncoder<F>
where
    F: Fn(&Entity<B>) -> Result<Vec<u8>, CodecError> + Send + Sync,
{
    fn field(&self) -> &'static str {
        self.field
    }

    fn encode(&self, ent: &Entity<B>) -> Result<Vec<u8>, CodecError> {
        (self.f)(ent)
    }
}
