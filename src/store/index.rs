//! Uniqueness indexes.
//!
//! An index is itself a [`StoreBase`]: keyed by an entity's unique key, valued
//! by the entity's encoded ID. [`IndexStore`] pairs such an index with the
//! entity store it guards and keeps both in step on put and delete.
//!
//! The stock index is the organization-name index, keyed by
//! `org ID (16 bytes) ++ name`.

use log::debug;

use crate::codec::{DecIndexId, EncIdKey, EncUniqKey};
use crate::entity::{EncodeFn, Entity, enc_id, enc_string, enc_string_case_insensitive, encode};
use crate::error::{CodecError, NetabaseError, NetabaseResult};
use crate::id::{ID_LENGTH, Id};
use crate::traits::codec::ConvertValToEnt;
use crate::traits::kv::Tx;

use super::StoreBase;
use super::options::{DeleteOpts, FindOpts};

/// Split an org-name index key into the org ID and the name.
pub fn decode_org_name_key(key: &[u8]) -> Result<(Id, String), CodecError> {
    if key.len() < ID_LENGTH {
        return Err(CodecError::Other("malformed org name key".to_string()));
    }
    let org_id = Id::decode(&key[..ID_LENGTH])?;
    let name = String::from_utf8(key[ID_LENGTH..].to_vec())?;
    Ok((org_id, name))
}

/// The unique key of an entity named `name` within organization `org_id`.
pub fn org_name_unique_key(org_id: Id, name: &str, case_sensitive: bool) -> EncodeFn {
    let name = if case_sensitive {
        enc_string(name)
    } else {
        enc_string_case_insensitive(name)
    };
    encode([enc_id(org_id), name])
}

/// Rebuilds the indexed entity's keys from an org-name index entry.
#[derive(Debug, Clone, Copy)]
pub struct OrgNameKeyConverter {
    pub case_sensitive: bool,
}

impl<B> ConvertValToEnt<B, Id> for OrgNameKeyConverter {
    fn convert(&self, key: &[u8], value: &Id) -> Result<Entity<B>, CodecError> {
        let (org_id, name) = decode_org_name_key(key)?;
        Ok(Entity::from_id(*value).with_unique_key(org_name_unique_key(
            org_id,
            &name,
            self.case_sensitive,
        )))
    }
}

/// An index from `org ID ++ name` to the owning entity's ID.
///
/// When `case_sensitive` is false, names are lowercased before they reach the
/// key, so names differing only in case collide.
pub fn new_org_name_key_store<B>(
    resource: impl Into<String>,
    bkt_name: impl Into<Vec<u8>>,
    case_sensitive: bool,
) -> StoreBase<B, Id> {
    StoreBase::new(resource, bkt_name, EncUniqKey, EncIdKey, DecIndexId)
        .with_converter(OrgNameKeyConverter { case_sensitive })
}

/// Existence checks applied by [`IndexStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PutOpts {
    /// Write without checks.
    #[default]
    Upsert,
    /// Neither the ID nor the unique key may exist yet.
    New,
    /// The ID must exist and the unique key must be free or already its own.
    Update,
}

/// An entity store guarded by a uniqueness index.
pub struct IndexStore<B, V> {
    resource: String,
    ent_store: StoreBase<B, V>,
    index_store: StoreBase<B, Id>,
}

impl<B, V> IndexStore<B, V> {
    /// `ent_store` needs a converter that yields entities carrying both the
    /// ID and the unique key; it is how stale index entries are found.
    pub fn new(
        resource: impl Into<String>,
        ent_store: StoreBase<B, V>,
        index_store: StoreBase<B, Id>,
    ) -> NetabaseResult<Self> {
        let resource = resource.into();
        if !ent_store.has_converter() {
            return Err(NetabaseError::invalid_input(format!(
                "{} entity store has no value converter",
                resource
            ))
            .with_resource(resource));
        }
        Ok(Self {
            resource,
            ent_store,
            index_store,
        })
    }

    pub fn ent_store(&self) -> &StoreBase<B, V> {
        &self.ent_store
    }

    pub fn index_store(&self) -> &StoreBase<B, Id> {
        &self.index_store
    }

    pub fn init<T: Tx>(&self, tx: &T) -> NetabaseResult<()> {
        self.ent_store.init(tx)?;
        self.index_store.init(tx)
    }

    /// Look the entity up by ID, or through the index when only the unique key
    /// is set.
    pub fn find_ent<T: Tx>(&self, tx: &T, ent: &Entity<B>) -> NetabaseResult<V> {
        if ent.pk.is_some() {
            return self.ent_store.find_ent(tx, ent);
        }
        if ent.unique_key.is_some() {
            let id = self.index_store.find_ent(tx, ent)?;
            return self.ent_store.find_ent(tx, &Entity::from_id(id));
        }
        Err(
            NetabaseError::invalid_input(format!("no key was provided for {}", self.resource))
                .with_resource(&self.resource),
        )
    }

    pub fn find<T: Tx>(&self, tx: &T, opts: FindOpts<'_, V>) -> NetabaseResult<()> {
        self.ent_store.find(tx, opts)
    }

    /// Write the index entry, then the entity. `ent` needs its ID, unique key
    /// and body.
    pub fn put<T: Tx>(&self, tx: &T, ent: &Entity<B>, opts: PutOpts) -> NetabaseResult<()> {
        match opts {
            PutOpts::Upsert => {}
            PutOpts::New => self.valid_new(tx, ent)?,
            PutOpts::Update => self.valid_update(tx, ent)?,
        }
        self.index_store.put(tx, ent)?;
        self.ent_store.put(tx, ent)
    }

    /// Remove the entity and its index entry. `ent` needs its ID.
    pub fn delete_ent<T: Tx>(&self, tx: &T, ent: &Entity<B>) -> NetabaseResult<()> {
        let key = self.ent_store.ent_key(ent)?;
        let existing = self.ent_store.find_ent(tx, ent)?;
        let indexed = self.ent_store.convert_val_to_ent(&key, &existing)?;
        self.delete_index_entry(tx, &indexed)?;
        self.ent_store.delete_ent(tx, ent)
    }

    /// Filtered delete over the entity store. Index entries of deleted
    /// entities are removed after the caller's own relation hooks.
    pub fn delete<T: Tx>(&self, tx: &T, opts: DeleteOpts<'_, V>) -> NetabaseResult<()> {
        let DeleteOpts {
            filter,
            mut delete_relations,
            cancel,
        } = opts;
        delete_relations.push(Box::new(move |key: &[u8], value: &V| {
            let indexed = self.ent_store.convert_val_to_ent(key, value)?;
            self.index_store.delete_ent(tx, &indexed)
        }));
        self.ent_store.delete(
            tx,
            DeleteOpts {
                filter,
                delete_relations,
                cancel,
            },
        )
    }

    fn valid_new<T: Tx>(&self, tx: &T, ent: &Entity<B>) -> NetabaseResult<()> {
        match self.index_store.find_ent(tx, ent) {
            Ok(_) => {
                let key = self.index_store.ent_key(ent)?;
                return Err(NetabaseError::conflict(format!(
                    "{} is not unique for key {:?}",
                    self.resource,
                    String::from_utf8_lossy(&key)
                ))
                .with_resource(&self.resource));
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        match self.ent_store.find_ent(tx, ent) {
            Ok(_) => {
                let key = self.ent_store.ent_key(ent)?;
                Err(NetabaseError::conflict(format!(
                    "{} already exists for key {:?}",
                    self.resource,
                    String::from_utf8_lossy(&key)
                ))
                .with_resource(&self.resource))
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn valid_update<T: Tx>(&self, tx: &T, ent: &Entity<B>) -> NetabaseResult<()> {
        let key = self.ent_store.ent_key(ent)?;
        let existing = self.ent_store.find_ent(tx, &ent.keys_only())?;

        match self.index_store.find_ent(tx, ent) {
            Ok(owner) => {
                let own_id = self.index_store.ent_body(ent)?;
                if Id::decode(&own_id).ok() != Some(owner) {
                    let index_key = self.index_store.ent_key(ent)?;
                    return Err(NetabaseError::conflict(format!(
                        "{} entity update conflicts with an existing entity for key {:?}",
                        self.resource,
                        String::from_utf8_lossy(&index_key)
                    ))
                    .with_resource(&self.resource));
                }
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        // The unique key may have changed; the old entry is rewritten by put.
        let previous = self.ent_store.convert_val_to_ent(&key, &existing)?;
        self.delete_index_entry(tx, &previous)
    }

    fn delete_index_entry<T: Tx>(&self, tx: &T, indexed: &Entity<B>) -> NetabaseResult<()> {
        match self.index_store.delete_ent(tx, indexed) {
            Err(e) if e.is_not_found() => {
                debug!("{}: index entry already gone", self.resource);
                Ok(())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DecBodyJson, EncBodyJson};
    use crate::error::ErrorKind;
    use crate::traits::codec::EncodeEnt;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    #[test]
    fn org_name_key_layout() {
        let key = org_name_unique_key(Id::new(0xab), "Ops", true)().unwrap();
        assert_eq!(key, b"00000000000000abOps");
        assert_eq!(decode_org_name_key(&key).unwrap(), (Id::new(0xab), "Ops".to_string()));

        let folded = org_name_unique_key(Id::new(0xab), "Ops", false)().unwrap();
        assert_eq!(folded, b"00000000000000abops");
    }

    #[test]
    fn malformed_org_name_keys() {
        assert_matches!(decode_org_name_key(b"short"), Err(CodecError::Other(_)));
        assert_matches!(
            decode_org_name_key(b"zzzzzzzzzzzzzzzzname"),
            Err(CodecError::Id(_))
        );
        assert_matches!(
            decode_org_name_key(b"0000000000000000name"),
            Err(CodecError::Id(_))
        );

        let mut key = b"0000000000000001".to_vec();
        key.extend_from_slice(&[b'o', 0xff, b'p']);
        assert_matches!(decode_org_name_key(&key), Err(CodecError::Utf8(_)));
    }

    #[test]
    fn converter_rebuilds_both_keys() {
        let key = org_name_unique_key(Id::new(1), "Ops", false)().unwrap();
        let ent: Entity<()> = OrgNameKeyConverter { case_sensitive: false }
            .convert(&key, &Id::new(9))
            .unwrap();
        assert_eq!(EncIdKey.encode(&ent).unwrap(), b"0000000000000009");
        assert_eq!(EncUniqKey.encode(&ent).unwrap(), key);
    }

    #[test]
    fn index_store_requires_converter() {
        let ents: StoreBase<String, String> =
            StoreBase::new("label", "labels", EncIdKey, EncBodyJson, DecBodyJson::new());
        let index = new_org_name_key_store::<String>("label", "labelsindex", false);
        let err = IndexStore::new("label", ents, index).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    proptest! {
        #[test]
        fn org_name_key_round_trip(org in 1u64.., name in "[a-zA-Z0-9 _-]{0,32}") {
            let key = org_name_unique_key(Id::new(org), &name, true)().unwrap();
            let (decoded_org, decoded_name) = decode_org_name_key(&key).unwrap();
            prop_assert_eq!(decoded_org, Id::new(org));
            prop_assert_eq!(decoded_name, name.clone());

            let folded = org_name_unique_key(Id::new(org), &name, false)().unwrap();
            let upper = org_name_unique_key(Id::new(org), &name.to_uppercase(), false)().unwrap();
            prop_assert_eq!(folded, upper);
        }
    }
}
