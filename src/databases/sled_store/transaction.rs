//! Transaction, bucket and cursor handles for the sled backend.

use sled::IVec;

use crate::error::KvError;
use crate::traits::kv::{Bucket, Cursor, KeyValue, Tx};

fn owned((key, value): (IVec, IVec)) -> KeyValue {
    (key.to_vec(), value.to_vec())
}

/// A read or read-write view of a [`SledKv`](super::SledKv).
pub struct SledTx {
    db: sled::Db,
    writable: bool,
}

impl SledTx {
    pub(super) fn new(db: sled::Db, writable: bool) -> Self {
        Self { db, writable }
    }
}

impl Tx for SledTx {
    type Bucket = SledBucket;

    fn bucket(&self, name: &[u8]) -> Result<SledBucket, KvError> {
        // open_tree would create the tree, so check for it first.
        if !self.db.tree_names().iter().any(|n| n.as_ref() == name) {
            return Err(KvError::BucketNotFound(
                String::from_utf8_lossy(name).into_owned(),
            ));
        }
        Ok(SledBucket {
            tree: self.db.open_tree(name)?,
            writable: self.writable,
        })
    }

    fn create_bucket_if_not_exists(&self, name: &[u8]) -> Result<SledBucket, KvError> {
        if !self.writable {
            return Err(KvError::ReadOnly);
        }
        Ok(SledBucket {
            tree: self.db.open_tree(name)?,
            writable: true,
        })
    }
}

pub struct SledBucket {
    tree: sled::Tree,
    writable: bool,
}

impl SledBucket {
    fn check_writable(&self) -> Result<(), KvError> {
        if self.writable {
            Ok(())
        } else {
            Err(KvError::ReadOnly)
        }
    }
}

impl Bucket for SledBucket {
    type Cursor = SledCursor;

    fn get(&self, key: &[u8]) -> Result<Vec<u8>, KvError> {
        self.tree
            .get(key)?
            .map(|v| v.to_vec())
            .ok_or(KvError::KeyNotFound)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.check_writable()?;
        self.tree.insert(key, value)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        self.check_writable()?;
        self.tree
            .remove(key)?
            .map(|_| ())
            .ok_or(KvError::KeyNotFound)
    }

    fn cursor(&self) -> Result<SledCursor, KvError> {
        Ok(SledCursor {
            tree: self.tree.clone(),
            position: None,
        })
    }
}

/// Cursor over a sled tree. Moves are relative to the last key returned.
pub struct SledCursor {
    tree: sled::Tree,
    position: Option<Vec<u8>>,
}

impl SledCursor {
    fn at(&mut self, found: Option<(IVec, IVec)>) -> Option<KeyValue> {
        let found = found.map(owned);
        if let Some((key, _)) = &found {
            self.position = Some(key.clone());
        }
        found
    }
}

impl Cursor for SledCursor {
    fn first(&mut self) -> Result<Option<KeyValue>, KvError> {
        let found = self.tree.first()?;
        Ok(self.at(found))
    }

    fn last(&mut self) -> Result<Option<KeyValue>, KvError> {
        let found = self.tree.last()?;
        Ok(self.at(found))
    }

    fn next(&mut self) -> Result<Option<KeyValue>, KvError> {
        let found = match &self.position {
            Some(pos) => self.tree.get_gt(pos)?,
            None => self.tree.first()?,
        };
        Ok(self.at(found))
    }

    fn prev(&mut self) -> Result<Option<KeyValue>, KvError> {
        let found = match &self.position {
            Some(pos) => self.tree.get_lt(pos)?,
            None => self.tree.last()?,
        };
        Ok(self.at(found))
    }

    fn seek(&mut self, seek: &[u8]) -> Result<Option<KeyValue>, KvError> {
        let found = self.tree.range(seek..).next().transpose()?;
        Ok(self.at(found))
    }
}
