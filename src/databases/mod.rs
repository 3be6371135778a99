//! Backends implementing [`Tx`](crate::traits::kv::Tx).

pub mod mem_store;

#[cfg(feature = "sled")]
pub mod sled_store;
