//! Fixed-width resource identifiers.
//!
//! An [`Id`] is a non-zero `u64` persisted as its 16-byte lowercase hex form.
//! The encoding is the fixed-width prefix of every uniqueness-index key, so it
//! must never change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of an encoded [`Id`] in bytes.
pub const ID_LENGTH: usize = 16;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IdError {
    #[error("invalid ID")]
    Invalid,

    #[error("id must have a length of 16 bytes, got {0}")]
    InvalidLength(usize),

    #[error("id is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// A 64-bit resource identifier. Zero is reserved as "no ID".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Id(u64);

impl Id {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Encode as 16 lowercase hex bytes. Fails for the zero ID.
    pub fn encode(self) -> Result<[u8; ID_LENGTH], IdError> {
        if !self.is_valid() {
            return Err(IdError::Invalid);
        }
        let mut out = [0u8; ID_LENGTH];
        hex::encode_to_slice(self.0.to_be_bytes(), &mut out)?;
        Ok(out)
    }

    /// Decode from exactly 16 hex bytes.
    pub fn decode(encoded: &[u8]) -> Result<Self, IdError> {
        if encoded.len() != ID_LENGTH {
            return Err(IdError::InvalidLength(encoded.len()));
        }
        let mut raw = [0u8; 8];
        hex::decode_to_slice(encoded, &mut raw)?;
        let id = Id(u64::from_be_bytes(raw));
        if !id.is_valid() {
            return Err(IdError::Invalid);
        }
        Ok(id)
    }
}

impl From<u64> for Id {
    fn from(value: u64) -> Self {
        Id(value)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Id {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Id::decode(s.as_bytes())
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
