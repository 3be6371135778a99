// Common test fixtures shared by the integration tests

#![allow(dead_code)]

use netabase_kv::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub key: String,
    pub n: u32,
}

pub type Notes = StoreBase<Note, Note>;

/// Notes keyed by their `key` string.
pub fn note_store() -> Notes {
    StoreBase::new("note", "notes", EncIdKey, EncBodyJson, DecBodyJson::new())
}

pub fn note(key: &str, n: u32) -> Entity<Note> {
    Entity::new().with_pk(enc_string(key)).with_body(Note {
        key: key.to_string(),
        n,
    })
}

pub fn note_key(key: &str) -> Entity<Note> {
    Entity::new().with_pk(enc_string(key))
}

/// Zero-padded keys "00", "01", ... so byte order matches numeric order.
pub fn numbered(count: u32) -> Vec<(String, u32)> {
    (0..count).map(|i| (format!("{:02}", i), i)).collect()
}

pub fn named(keys: &[&str]) -> Vec<(String, u32)> {
    keys.iter()
        .enumerate()
        .map(|(i, k)| (k.to_string(), i as u32))
        .collect()
}

pub fn seed<T: Tx>(store: &Notes, tx: &T, notes: &[(String, u32)]) -> NetabaseResult<()> {
    store.init(tx)?;
    for (key, n) in notes {
        store.put(tx, &note(key, *n))?;
    }
    Ok(())
}

pub fn seeded_mem(notes: &[(String, u32)]) -> (MemKv, Notes) {
    let kv = MemKv::new();
    let store = note_store();
    kv.update(|tx| seed(&store, tx, notes)).unwrap();
    (kv, store)
}

/// Run a scan inside `tx` and return the captured note keys in order.
pub fn find_keys_in<T, F>(store: &Notes, tx: &T, configure: F) -> NetabaseResult<Vec<String>>
where
    T: Tx,
    F: for<'a> FnOnce(FindOpts<'a, Note>) -> FindOpts<'a, Note>,
{
    let mut keys = Vec::new();
    let opts = configure(FindOpts::new(|_key: &[u8], note: Note| {
        keys.push(note.key);
        Ok(())
    }));
    store.find(tx, opts)?;
    Ok(keys)
}

pub fn find_keys<F>(kv: &MemKv, store: &Notes, configure: F) -> Vec<String>
where
    F: for<'a> FnOnce(FindOpts<'a, Note>) -> FindOpts<'a, Note>,
{
    kv.view(|tx| find_keys_in(store, tx, configure)).unwrap()
}

pub fn keys(range: std::ops::Range<u32>) -> Vec<String> {
    range.map(|i| format!("{:02}", i)).collect()
}
