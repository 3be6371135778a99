//! # Netabase KV
//!
//! A typed entity-store layer over ordered, transactional key-value backends.
//!
//! ## Features
//!
//! - **Entity stores**: [`StoreBase`] turns a raw bucket/cursor API into typed
//!   create, read, update and delete operations driven by pluggable codecs
//! - **Scans**: ascending or descending traversal, prefix seeks, filters and
//!   offset/limit pagination counted over accepted entries only
//! - **Cascading deletes**: filter-driven deletes with relation hooks run
//!   before each removal
//! - **Uniqueness indexes**: [`IndexStore`] keeps an entity store and its
//!   unique-key index consistent
//! - **Backends**: an in-memory backend with rollback, and sled behind the
//!   `sled` feature
//!
//! ## Quick Start
//!
//! ```rust
//! use netabase_kv::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct User {
//!     id: Id,
//!     name: String,
//! }
//!
//! fn user_ent(user: User) -> Entity<User> {
//!     Entity::from_id(user.id).with_body(user)
//! }
//!
//! # fn main() -> NetabaseResult<()> {
//! let users: StoreBase<User, User> =
//!     StoreBase::new("user", "users", EncIdKey, EncBodyJson, DecBodyJson::new());
//! let kv = MemKv::new();
//!
//! kv.update(|tx| {
//!     users.init(tx)?;
//!     users.put(tx, &user_ent(User { id: Id::new(1), name: "alice".into() }))
//! })?;
//!
//! let alice = kv.view(|tx| users.find_ent(tx, &Entity::from_id(Id::new(1))))?;
//! assert_eq!(alice.name, "alice");
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod databases;
pub mod entity;
pub mod error;
pub mod id;
pub mod prelude;
pub mod store;
pub mod traits;

pub use entity::Entity;
pub use error::{ErrorKind, NetabaseError, NetabaseResult};
pub use id::Id;
pub use store::{IndexStore, StoreBase};
