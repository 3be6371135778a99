//! The generic entity store.
//!
//! A [`StoreBase`] binds one resource to one bucket and a set of codecs. It is
//! stateless between calls: every operation takes an open transaction and
//! leaves commit or rollback to the caller.
//!
//! ```
//! use netabase_kv::codec::{DecBodyJson, EncBodyJson, EncIdKey};
//! use netabase_kv::databases::mem_store::MemKv;
//! use netabase_kv::entity::Entity;
//! use netabase_kv::error::NetabaseResult;
//! use netabase_kv::id::Id;
//! use netabase_kv::store::{FindOpts, StoreBase};
//!
//! # fn main() -> NetabaseResult<()> {
//! let store: StoreBase<String, String> =
//!     StoreBase::new("label", "labels", EncIdKey, EncBodyJson, DecBodyJson::new());
//! let kv = MemKv::new();
//!
//! kv.update(|tx| {
//!     store.init(tx)?;
//!     store.put(tx, &Entity::from_id(Id::new(1)).with_body("bug".to_string()))?;
//!     store.put(tx, &Entity::from_id(Id::new(2)).with_body("feature".to_string()))
//! })?;
//!
//! let mut names = Vec::new();
//! kv.view(|tx| {
//!     store.find(tx, FindOpts::new(|_key: &[u8], name: String| {
//!         names.push(name);
//!         Ok(())
//!     }))
//! })?;
//! assert_eq!(names, ["bug", "feature"]);
//! # Ok(())
//! # }
//! ```

pub mod index;
mod iterator;
pub mod options;

use std::time::Instant;

use log::{debug, trace};

use crate::config::StoreConfig;
use crate::entity::Entity;
use crate::error::{KvError, NetabaseError, NetabaseResult};
use crate::traits::codec::{ConvertValToEnt, DecodeBucketVal, EncodeEnt};
use crate::traits::kv::{Bucket, Tx};

use iterator::{Iter, IterParams};

pub use index::{
    IndexStore, OrgNameKeyConverter, PutOpts, decode_org_name_key, new_org_name_key_store,
    org_name_unique_key,
};
pub use options::{CaptureFn, DeleteOpts, DeleteRelationsFn, FilterFn, FindOpts};

/// Typed CRUD and scanning over a single bucket.
///
/// `B` is the body type carried by entities on write, `V` the value type the
/// decoder produces on read. They are usually the same type, but index stores
/// write an [`Entity`] whose body is irrelevant and read back an ID.
pub struct StoreBase<B, V> {
    resource: String,
    bkt_name: Vec<u8>,

    encode_ent_key: Box<dyn EncodeEnt<B>>,
    encode_ent_body: Box<dyn EncodeEnt<B>>,
    decode_ent: Box<dyn DecodeBucketVal<V>>,
    convert_val_to_ent: Option<Box<dyn ConvertValToEnt<B, V>>>,

    config: StoreConfig,
}

impl<B, V> StoreBase<B, V> {
    /// `resource` names the stored kind in error messages; `bkt_name` is the
    /// backing bucket.
    pub fn new(
        resource: impl Into<String>,
        bkt_name: impl Into<Vec<u8>>,
        encode_ent_key: impl EncodeEnt<B> + 'static,
        encode_ent_body: impl EncodeEnt<B> + 'static,
        decode_ent: impl DecodeBucketVal<V> + 'static,
    ) -> Self {
        Self {
            resource: resource.into(),
            bkt_name: bkt_name.into(),
            encode_ent_key: Box::new(encode_ent_key),
            encode_ent_body: Box::new(encode_ent_body),
            decode_ent: Box::new(decode_ent),
            convert_val_to_ent: None,
            config: StoreConfig::default(),
        }
    }

    /// Install the converter used to rebuild entities from decoded values.
    pub fn with_converter(mut self, convert: impl ConvertValToEnt<B, V> + 'static) -> Self {
        self.convert_val_to_ent = Some(Box::new(convert));
        self
    }

    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn bkt_name(&self) -> &[u8] {
        &self.bkt_name
    }

    pub fn has_converter(&self) -> bool {
        self.convert_val_to_ent.is_some()
    }

    /// Rebuild an entity from a decoded value with the configured converter.
    pub fn convert_val_to_ent(&self, key: &[u8], value: &V) -> NetabaseResult<Entity<B>> {
        let convert = self.convert_val_to_ent.as_ref().ok_or_else(|| {
            NetabaseError::invalid_input(format!("no converter was provided for {}", self.resource))
                .with_resource(&self.resource)
        })?;
        convert.convert(key, value).map_err(|e| {
            NetabaseError::internal(format!("failed to convert {} value", self.resource))
                .with_resource(&self.resource)
                .with_source(e)
        })
    }

    /// Create the bucket if it does not exist yet.
    pub fn init<T: Tx>(&self, tx: &T) -> NetabaseResult<()> {
        tx.create_bucket_if_not_exists(&self.bkt_name).map_err(|e| {
            NetabaseError::internal(format!(
                "failed to create bucket: {}",
                String::from_utf8_lossy(&self.bkt_name)
            ))
            .with_resource(&self.resource)
            .with_source(e)
        })?;
        debug!("{}: bucket {:?} ready", self.resource, String::from_utf8_lossy(&self.bkt_name));
        Ok(())
    }

    /// The primary key the entity is stored under.
    pub fn ent_key(&self, ent: &Entity<B>) -> NetabaseResult<Vec<u8>> {
        self.encode_ent(ent, self.encode_ent_key.as_ref())
    }

    /// The encoded body the entity would be stored with.
    pub fn ent_body(&self, ent: &Entity<B>) -> NetabaseResult<Vec<u8>> {
        self.encode_ent(ent, self.encode_ent_body.as_ref())
    }

    /// Upsert the entity. An existing value under the same key is overwritten.
    pub fn put<T: Tx>(&self, tx: &T, ent: &Entity<B>) -> NetabaseResult<()> {
        let key = self.ent_key(ent)?;
        let body = self.ent_body(ent)?;
        self.bucket_put(tx, &key, &body)
    }

    /// Fetch and decode the value stored under the entity's primary key.
    pub fn find_ent<T: Tx>(&self, tx: &T, ent: &Entity<B>) -> NetabaseResult<V> {
        let key = self.ent_key(ent)?;
        let body = self.bucket_get(tx, &key)?;
        self.decode_ent(&key, &body)
    }

    pub fn delete_ent<T: Tx>(&self, tx: &T, ent: &Entity<B>) -> NetabaseResult<()> {
        let key = self.ent_key(ent)?;
        self.bucket_delete(tx, &key)
    }

    /// Scan the bucket, handing every accepted entry inside the window to the
    /// capture callback in traversal order.
    ///
    /// The first decode or capture error aborts the scan. Entries captured
    /// before the error are not revisited.
    pub fn find<T: Tx>(&self, tx: &T, opts: FindOpts<'_, V>) -> NetabaseResult<()> {
        let bkt = self.bucket(tx)?;
        self.scan(&bkt, opts)
    }

    /// Delete every entry the filter accepts, running the relation hooks on
    /// each one first. Without a filter nothing is deleted.
    ///
    /// A failing hook aborts the call: its entry and every later one are kept,
    /// earlier deletions stand unless the caller rolls the transaction back.
    pub fn delete<T: Tx>(&self, tx: &T, opts: DeleteOpts<'_, V>) -> NetabaseResult<()> {
        let DeleteOpts {
            filter,
            mut delete_relations,
            cancel,
        } = opts;
        let Some(filter) = filter else {
            return Ok(());
        };

        let bkt = self.bucket(tx)?;
        let mut find_opts = FindOpts::new(|key: &[u8], value: V| {
            for delete_relation in delete_relations.iter_mut() {
                delete_relation(key, &value)?;
            }
            trace!("{}: deleting {:?}", self.resource, String::from_utf8_lossy(key));
            bkt.delete(key).map_err(|e| self.delete_error(key, e))
        });
        find_opts.filter = Some(filter);
        find_opts.cancel = cancel;

        self.scan(&bkt, find_opts)
    }

    fn scan<K: Bucket>(&self, bkt: &K, opts: FindOpts<'_, V>) -> NetabaseResult<()> {
        let FindOpts {
            descending,
            offset,
            limit,
            prefix,
            mut capture,
            filter,
            cancel,
        } = opts;

        let cursor = bkt.cursor().map_err(|e| {
            NetabaseError::internal("failed to retrieve cursor")
                .with_resource(&self.resource)
                .with_source(e)
        })?;

        let token = cancel.unwrap_or_default().child_token();
        let started = Instant::now();

        let captured = std::thread::scope(|s| -> NetabaseResult<usize> {
            let mut iter = Iter::new(
                s,
                cursor,
                IterParams {
                    descending,
                    limit,
                    offset,
                    prefix: &prefix,
                    resource: &self.resource,
                    decode: self.decode_ent.as_ref(),
                    filter: filter.as_ref(),
                    cancel: token.clone(),
                    poll_interval: self.config.cancel_poll_interval,
                },
            );
            // Stops the prefix producer on every exit path.
            let _cancel_on_return = token.clone().drop_guard();

            let mut captured = 0;
            while let Some((key, value)) = iter.next()? {
                trace!("{}: captured {:?}", self.resource, String::from_utf8_lossy(&key));
                capture(&key, value)?;
                captured += 1;
            }
            Ok(captured)
        })?;

        trace!(
            "{}: scan captured {} entries in {:?}",
            self.resource,
            captured,
            started.elapsed()
        );
        Ok(())
    }

    fn bucket<T: Tx>(&self, tx: &T) -> NetabaseResult<T::Bucket> {
        tx.bucket(&self.bkt_name).map_err(|e| {
            NetabaseError::internal(format!(
                "unexpected error retrieving bucket {:?}; Err {}",
                String::from_utf8_lossy(&self.bkt_name),
                e
            ))
            .with_resource(&self.resource)
            .with_source(e)
        })
    }

    fn bucket_get<T: Tx>(&self, tx: &T, key: &[u8]) -> NetabaseResult<Vec<u8>> {
        let bkt = self.bucket(tx)?;
        bkt.get(key).map_err(|e| {
            if e.is_not_found() {
                NetabaseError::not_found(format!(
                    "{} not found for key {:?}",
                    self.resource,
                    String::from_utf8_lossy(key)
                ))
                .with_resource(&self.resource)
            } else {
                NetabaseError::internal(format!("failed to read {}", self.resource))
                    .with_resource(&self.resource)
                    .with_source(e)
            }
        })
    }

    fn bucket_put<T: Tx>(&self, tx: &T, key: &[u8], body: &[u8]) -> NetabaseResult<()> {
        let bkt = self.bucket(tx)?;
        bkt.put(key, body).map_err(|e| {
            NetabaseError::internal(format!("failed to write {}", self.resource))
                .with_resource(&self.resource)
                .with_source(e)
        })?;
        trace!("{}: put {:?}", self.resource, String::from_utf8_lossy(key));
        Ok(())
    }

    fn bucket_delete<T: Tx>(&self, tx: &T, key: &[u8]) -> NetabaseResult<()> {
        let bkt = self.bucket(tx)?;
        bkt.delete(key).map_err(|e| self.delete_error(key, e))?;
        trace!("{}: deleted {:?}", self.resource, String::from_utf8_lossy(key));
        Ok(())
    }

    fn delete_error(&self, key: &[u8], err: KvError) -> NetabaseError {
        if err.is_not_found() {
            return NetabaseError::not_found(format!(
                "{} does not exist for key {:?}",
                self.resource,
                String::from_utf8_lossy(key)
            ))
            .with_resource(&self.resource);
        }
        NetabaseError::internal(format!("failed to delete {}", self.resource))
            .with_resource(&self.resource)
            .with_source(err)
    }

    fn decode_ent(&self, key: &[u8], body: &[u8]) -> NetabaseResult<V> {
        let decode_error = || {
            NetabaseError::internal(format!("failed to decode {} body", self.resource))
                .with_resource(&self.resource)
        };
        match self.decode_ent.decode(key, body) {
            Ok(Some((_, value))) => Ok(value),
            Ok(None) => Err(decode_error()),
            Err(e) => Err(decode_error().with_source(e)),
        }
    }

    fn encode_ent(&self, ent: &Entity<B>, enc: &dyn EncodeEnt<B>) -> NetabaseResult<Vec<u8>> {
        enc.encode(ent).map_err(|e| {
            NetabaseError::invalid_input(format!(
                "provided {} {} is an invalid format",
                self.resource,
                enc.field()
            ))
            .with_resource(&self.resource)
            .with_source(e)
        })
    }
}
