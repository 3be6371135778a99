//! Sled backend.
//!
//! Each bucket is a sled [`Tree`](sled::Tree) named after the bucket. Sled
//! trees are not transactional across operations, so a failed
//! [`SledKv::update`] does not undo the writes it already made; callers that
//! need rollback use [`MemKv`](crate::databases::mem_store::MemKv) or make
//! their writes idempotent.
//!
//! ```
//! use netabase_kv::config::SledConfig;
//! use netabase_kv::databases::sled_store::SledKv;
//! use netabase_kv::error::KvError;
//! use netabase_kv::traits::kv::{Bucket, Tx};
//!
//! let kv = SledKv::open(&SledConfig::temp()).unwrap();
//! kv.update(|tx| -> Result<(), KvError> {
//!     tx.create_bucket_if_not_exists(b"users")?.put(b"k", b"v")
//! })
//! .unwrap();
//! ```

use std::time::Instant;

use log::debug;

use crate::config::SledConfig;
use crate::error::KvError;

pub mod transaction;

pub use transaction::{SledBucket, SledCursor, SledTx};

/// A sled database exposed through [`Tx`](crate::traits::kv::Tx).
#[derive(Clone)]
pub struct SledKv {
    db: sled::Db,
}

impl SledKv {
    pub fn open(config: &SledConfig) -> Result<Self, KvError> {
        let start = Instant::now();
        debug!("SledKv: Opening database at {}", config.path.display());

        let db = sled::Config::new()
            .path(&config.path)
            .temporary(config.temporary)
            .cache_capacity(config.cache_capacity_bytes)
            .flush_every_ms(config.flush_every_ms)
            .open()?;

        debug!("SledKv: Opened in {:?}", start.elapsed());
        Ok(Self { db })
    }

    /// Get a reference to the underlying sled database
    pub fn sled_database(&self) -> &sled::Db {
        &self.db
    }

    /// Run `f` with write access. The database is flushed when `f` succeeds.
    pub fn update<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&SledTx) -> Result<R, E>,
        E: From<KvError>,
    {
        let out = f(&SledTx::new(self.db.clone(), true))?;
        let start = Instant::now();
        self.db.flush().map_err(KvError::from)?;
        debug!("SledKv: Flushed in {:?}", start.elapsed());
        Ok(out)
    }

    /// Run `f` with read access only.
    pub fn view<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&SledTx) -> Result<R, E>,
        E: From<KvError>,
    {
        f(&SledTx::new(self.db.clone(), false))
    }
}
