//! In-memory backend.
//!
//! Buckets are `BTreeMap`s behind a mutex. A read-write transaction works on a
//! private copy of every bucket and publishes it only when its closure
//! succeeds, so an `Err` from the closure rolls the whole transaction back.
//! Writers are serialised; readers see the last committed state.
//!
//! ```
//! use netabase_kv::databases::mem_store::MemKv;
//! use netabase_kv::error::KvError;
//! use netabase_kv::traits::kv::{Bucket, Tx};
//!
//! let kv = MemKv::new();
//! kv.update(|tx| -> Result<(), KvError> {
//!     tx.create_bucket_if_not_exists(b"users")?.put(b"k", b"v")
//! })
//! .unwrap();
//!
//! let value = kv.view(|tx| -> Result<Vec<u8>, KvError> { tx.bucket(b"users")?.get(b"k") });
//! assert_eq!(value.unwrap(), b"v");
//! ```

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included, Unbounded};
use std::sync::{Arc, Mutex, MutexGuard};

use log::trace;

use crate::error::KvError;
use crate::traits::kv::{Bucket, Cursor, KeyValue, Tx};

type Entries = BTreeMap<Vec<u8>, Vec<u8>>;
type Buckets = BTreeMap<Vec<u8>, Entries>;

fn lock(buckets: &Mutex<Buckets>) -> Result<MutexGuard<'_, Buckets>, KvError> {
    buckets
        .lock()
        .map_err(|_| KvError::Storage("memory store lock poisoned".to_string()))
}

fn bucket_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

/// A process-local key-value store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemKv {
    committed: Arc<Mutex<Buckets>>,
    writer: Arc<Mutex<()>>,
}

impl MemKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` in a read-write transaction, committing only if it returns `Ok`.
    pub fn update<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&MemTx) -> Result<R, E>,
        E: From<KvError>,
    {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| KvError::Storage("memory store writer lock poisoned".to_string()))?;

        let snapshot = lock(&self.committed)?.clone();
        let tx = MemTx::new(snapshot, true);
        let out = f(&tx)?;

        let staged = std::mem::take(&mut *lock(&tx.buckets)?);
        *lock(&self.committed)? = staged;
        trace!("MemKv: committed transaction");
        Ok(out)
    }

    /// Run `f` in a read-only transaction over the last committed state.
    pub fn view<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&MemTx) -> Result<R, E>,
        E: From<KvError>,
    {
        let snapshot = lock(&self.committed)?.clone();
        f(&MemTx::new(snapshot, false))
    }
}

/// A transaction over a [`MemKv`].
pub struct MemTx {
    buckets: Arc<Mutex<Buckets>>,
    writable: bool,
}

impl MemTx {
    fn new(buckets: Buckets, writable: bool) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(buckets)),
            writable,
        }
    }

    fn handle(&self, name: &[u8]) -> MemBucket {
        MemBucket {
            buckets: Arc::clone(&self.buckets),
            name: name.to_vec(),
            writable: self.writable,
        }
    }
}

impl Tx for MemTx {
    type Bucket = MemBucket;

    fn bucket(&self, name: &[u8]) -> Result<MemBucket, KvError> {
        if !lock(&self.buckets)?.contains_key(name) {
            return Err(KvError::BucketNotFound(bucket_name(name)));
        }
        Ok(self.handle(name))
    }

    fn create_bucket_if_not_exists(&self, name: &[u8]) -> Result<MemBucket, KvError> {
        if !self.writable {
            return Err(KvError::ReadOnly);
        }
        lock(&self.buckets)?.entry(name.to_vec()).or_default();
        Ok(self.handle(name))
    }
}

/// A handle to one bucket of a [`MemTx`].
pub struct MemBucket {
    buckets: Arc<Mutex<Buckets>>,
    name: Vec<u8>,
    writable: bool,
}

impl MemBucket {
    fn with_entries<R>(&self, f: impl FnOnce(&mut Entries) -> R) -> Result<R, KvError> {
        let mut buckets = lock(&self.buckets)?;
        let entries = buckets
            .get_mut(&self.name)
            .ok_or_else(|| KvError::BucketNotFound(bucket_name(&self.name)))?;
        Ok(f(entries))
    }

    fn check_writable(&self) -> Result<(), KvError> {
        if self.writable {
            Ok(())
        } else {
            Err(KvError::ReadOnly)
        }
    }
}

impl Bucket for MemBucket {
    type Cursor = MemCursor;

    fn get(&self, key: &[u8]) -> Result<Vec<u8>, KvError> {
        self.with_entries(|entries| entries.get(key).cloned())?
            .ok_or(KvError::KeyNotFound)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.check_writable()?;
        self.with_entries(|entries| {
            entries.insert(key.to_vec(), value.to_vec());
        })
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        self.check_writable()?;
        self.with_entries(|entries| entries.remove(key))?
            .map(|_| ())
            .ok_or(KvError::KeyNotFound)
    }

    fn cursor(&self) -> Result<MemCursor, KvError> {
        self.with_entries(|_| ())?;
        Ok(MemCursor {
            buckets: Arc::clone(&self.buckets),
            name: self.name.clone(),
            position: None,
        })
    }
}

/// Cursor over a [`MemBucket`].
///
/// Every move re-seeks relative to the last key returned, so entries may be
/// inserted or deleted while the cursor is live.
pub struct MemCursor {
    buckets: Arc<Mutex<Buckets>>,
    name: Vec<u8>,
    position: Option<Vec<u8>>,
}

impl MemCursor {
    fn find(
        &mut self,
        pick: impl FnOnce(&Entries, Option<&[u8]>) -> Option<KeyValue>,
    ) -> Result<Option<KeyValue>, KvError> {
        let found = {
            let buckets = lock(&self.buckets)?;
            let entries = buckets
                .get(&self.name)
                .ok_or_else(|| KvError::BucketNotFound(bucket_name(&self.name)))?;
            pick(entries, self.position.as_deref())
        };
        if let Some((key, _)) = &found {
            self.position = Some(key.clone());
        }
        Ok(found)
    }
}

fn owned((k, v): (&Vec<u8>, &Vec<u8>)) -> KeyValue {
    (k.clone(), v.clone())
}

impl Cursor for MemCursor {
    fn first(&mut self) -> Result<Option<KeyValue>, KvError> {
        self.find(|entries, _| entries.iter().next().map(owned))
    }

    fn last(&mut self) -> Result<Option<KeyValue>, KvError> {
        self.find(|entries, _| entries.iter().next_back().map(owned))
    }

    fn next(&mut self) -> Result<Option<KeyValue>, KvError> {
        self.find(|entries, position| match position {
            Some(pos) => entries
                .range::<[u8], _>((Excluded(pos), Unbounded))
                .next()
                .map(owned),
            None => entries.iter().next().map(owned),
        })
    }

    fn prev(&mut self) -> Result<Option<KeyValue>, KvError> {
        self.find(|entries, position| match position {
            Some(pos) => entries
                .range::<[u8], _>((Unbounded, Excluded(pos)))
                .next_back()
                .map(owned),
            None => entries.iter().next_back().map(owned),
        })
    }

    fn seek(&mut self, seek: &[u8]) -> Result<Option<KeyValue>, KvError> {
        self.find(|entries, _| {
            entries
                .range::<[u8], _>((Included(seek), Unbounded))
                .next()
                .map(owned)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn seeded(keys: &[&str]) -> MemKv {
        let kv = MemKv::new();
        kv.update(|tx| -> Result<(), KvError> {
            let bkt = tx.create_bucket_if_not_exists(b"b")?;
            for key in keys {
                bkt.put(key.as_bytes(), key.as_bytes())?;
            }
            Ok(())
        })
        .unwrap();
        kv
    }

    fn key(kv: Option<KeyValue>) -> Option<String> {
        kv.map(|(k, _)| String::from_utf8(k).unwrap())
    }

    #[test]
    fn failed_update_rolls_back() {
        let kv = seeded(&["a"]);
        let res = kv.update(|tx| -> Result<(), KvError> {
            let bkt = tx.bucket(b"b")?;
            bkt.put(b"z", b"z")?;
            bkt.delete(b"a")?;
            Err(KvError::Storage("abort".into()))
        });
        assert_matches!(res, Err(KvError::Storage(_)));

        kv.view(|tx| -> Result<(), KvError> {
            let bkt = tx.bucket(b"b")?;
            assert_eq!(bkt.get(b"a")?, b"a");
            assert_matches!(bkt.get(b"z"), Err(KvError::KeyNotFound));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn view_is_read_only() {
        let kv = seeded(&["a"]);
        kv.view(|tx| -> Result<(), KvError> {
            assert_matches!(tx.create_bucket_if_not_exists(b"c").err(), Some(KvError::ReadOnly));
            let bkt = tx.bucket(b"b")?;
            assert_matches!(bkt.put(b"x", b"x"), Err(KvError::ReadOnly));
            assert_matches!(bkt.delete(b"a"), Err(KvError::ReadOnly));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn missing_bucket_and_key() {
        let kv = seeded(&[]);
        kv.view(|tx| -> Result<(), KvError> {
            assert_matches!(
                tx.bucket(b"nope").err(),
                Some(KvError::BucketNotFound(name)) if name == "nope"
            );
            assert_matches!(tx.bucket(b"b")?.get(b"k"), Err(KvError::KeyNotFound));
            Ok(())
        })
        .unwrap();
        kv.update(|tx| -> Result<(), KvError> {
            assert_matches!(tx.bucket(b"b")?.delete(b"k"), Err(KvError::KeyNotFound));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn cursor_walks_both_ways() {
        let kv = seeded(&["b", "a", "c"]);
        kv.view(|tx| -> Result<(), KvError> {
            let mut cur = tx.bucket(b"b")?.cursor()?;
            assert_eq!(key(cur.first()?).as_deref(), Some("a"));
            assert_eq!(key(cur.next()?).as_deref(), Some("b"));
            assert_eq!(key(cur.next()?).as_deref(), Some("c"));
            assert_eq!(key(cur.next()?), None);
            assert_eq!(key(cur.prev()?).as_deref(), Some("b"));

            assert_eq!(key(cur.last()?).as_deref(), Some("c"));
            assert_eq!(key(cur.prev()?).as_deref(), Some("b"));
            assert_eq!(key(cur.seek(b"bb")?).as_deref(), Some("c"));
            assert_eq!(key(cur.seek(b"d")?), None);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn cursor_survives_deletes() {
        let kv = seeded(&["a", "b", "c", "d"]);
        kv.update(|tx| -> Result<(), KvError> {
            let bkt = tx.bucket(b"b")?;
            let mut cur = bkt.cursor()?;
            let mut seen = Vec::new();
            let mut entry = cur.first()?;
            while let Some((k, _)) = entry {
                bkt.delete(&k)?;
                seen.push(k);
                entry = cur.next()?;
            }
            assert_eq!(seen.len(), 4);
            assert_eq!(key(bkt.cursor()?.first()?), None);
            Ok(())
        })
        .unwrap();
    }
}
