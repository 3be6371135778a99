//! Prelude module for convenient imports.
//!
//! ```rust
//! use netabase_kv::prelude::*;
//! ```

pub use crate::codec::{DecBodyJson, DecIndexId, EncBodyJson, EncIdKey, EncUniqKey, encoder};
pub use crate::config::{SledConfig, StoreConfig};
pub use crate::databases::mem_store::MemKv;
#[cfg(feature = "sled")]
pub use crate::databases::sled_store::SledKv;
pub use crate::entity::{
    EncodeFn, Entity, enc_bytes, enc_id, enc_string, enc_string_case_insensitive, encode,
};
pub use crate::error::{CodecError, ErrorKind, KvError, NetabaseError, NetabaseResult};
pub use crate::id::Id;
pub use crate::store::{
    DeleteOpts, FindOpts, IndexStore, PutOpts, StoreBase, decode_org_name_key,
    new_org_name_key_store, org_name_unique_key,
};
pub use crate::traits::codec::{ConvertValToEnt, DecodeBucketVal, EncodeEnt};
pub use crate::traits::kv::{Bucket, Cursor, Tx};
