//! Ordered traversal with filtering and offset/limit pagination.
//!
//! Offset and limit are counted over *accepted* entries only, i.e. entries the
//! filter let through. Unprefixed scans drive the cursor directly in either
//! direction. Prefix scans hand the cursor to a producer thread that seeks to
//! the prefix and feeds matching pairs through a single-slot channel; the
//! consumer waits on that channel or on cancellation, whichever comes first.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::Scope;
use std::time::Duration;

use log::{debug, trace};
use tokio_util::sync::CancellationToken;

use crate::error::{KvError, NetabaseError, NetabaseResult};
use crate::traits::codec::DecodeBucketVal;
use crate::traits::kv::{Cursor, KeyValue};

use super::options::FilterFn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Scanning,
    Exhausted,
}

/// Single-use scan state over one cursor.
pub(crate) struct Iter<'scope, 'env, 'o, C, V> {
    scope: &'scope Scope<'scope, 'env>,
    cursor: Option<C>,
    state: State,

    counter: usize,
    descending: bool,
    limit: usize,
    offset: usize,
    window_end: usize,
    prefix: &'o [u8],

    seek_rx: Option<Receiver<Result<KeyValue, KvError>>>,
    cancel: CancellationToken,
    poll_interval: Duration,

    resource: &'o str,
    decode: &'o dyn DecodeBucketVal<V>,
    filter: Option<&'o FilterFn<'o, V>>,
}

pub(crate) struct IterParams<'o, V> {
    pub descending: bool,
    pub limit: usize,
    pub offset: usize,
    pub prefix: &'o [u8],
    pub resource: &'o str,
    pub decode: &'o dyn DecodeBucketVal<V>,
    pub filter: Option<&'o FilterFn<'o, V>>,
    pub cancel: CancellationToken,
    pub poll_interval: Duration,
}

impl<'scope, 'env, 'o, C, V> Iter<'scope, 'env, 'o, C, V>
where
    C: Cursor + 'scope,
{
    pub(crate) fn new(
        scope: &'scope Scope<'scope, 'env>,
        cursor: C,
        params: IterParams<'o, V>,
    ) -> Self {
        Self {
            scope,
            cursor: Some(cursor),
            state: State::Start,
            counter: 0,
            descending: params.descending,
            limit: params.limit,
            offset: params.offset,
            window_end: params.limit.saturating_add(params.offset),
            prefix: params.prefix,
            seek_rx: None,
            cancel: params.cancel,
            poll_interval: params.poll_interval,
            resource: params.resource,
            decode: params.decode,
            filter: params.filter,
        }
    }

    /// Next accepted entry inside the pagination window, or `None` at the end.
    pub(crate) fn next(&mut self) -> NetabaseResult<Option<(Vec<u8>, V)>> {
        if self.state == State::Exhausted {
            return Ok(None);
        }
        if self.limit > 0 && self.counter >= self.window_end {
            self.state = State::Exhausted;
            return Ok(None);
        }

        loop {
            let Some((key, raw)) = self.step()? else {
                self.state = State::Exhausted;
                return Ok(None);
            };

            let decoded = self.decode.decode(&key, &raw).map_err(|e| {
                NetabaseError::internal(format!(
                    "failed to decode {} for key {:?}",
                    self.resource,
                    String::from_utf8_lossy(&key)
                ))
                .with_resource(self.resource)
                .with_source(e)
            })?;
            let Some((key, value)) = decoded else {
                self.state = State::Exhausted;
                return Ok(None);
            };

            if self.is_next(&key, &value) {
                return Ok(Some((key, value)));
            }
            trace!("{}: skipping {:?}", self.resource, String::from_utf8_lossy(&key));
        }
    }

    /// Filter and pagination gate. Accepted entries are counted even when the
    /// offset suppresses them.
    fn is_next(&mut self, key: &[u8], value: &V) -> bool {
        if let Some(filter) = self.filter {
            if !filter(key, value) {
                return false;
            }
        }

        self.counter += 1;

        if self.limit > 0 && self.counter >= self.window_end {
            return true;
        }
        if self.offset > 0 && self.counter <= self.offset {
            return false;
        }
        true
    }

    /// Pull the next raw pair in traversal order.
    fn step(&mut self) -> NetabaseResult<Option<KeyValue>> {
        if !self.prefix.is_empty() {
            self.seek();
            return self.recv_seek();
        }

        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        let entry = match (self.state, self.descending) {
            (State::Start, true) => cursor.last(),
            (State::Start, false) => cursor.first(),
            (_, true) => cursor.prev(),
            (_, false) => cursor.next(),
        };
        self.state = State::Scanning;
        entry.map_err(|e| cursor_error(self.resource, e))
    }

    /// Start the prefix producer. Runs at most once per iterator.
    fn seek(&mut self) {
        if self.seek_rx.is_some() {
            return;
        }
        let Some(mut cursor) = self.cursor.take() else {
            return;
        };
        self.state = State::Scanning;

        let (tx, rx) = mpsc::sync_channel(1);
        let prefix = self.prefix.to_vec();
        let cancel = self.cancel.clone();
        let resource = self.resource.to_string();

        debug!("{}: starting prefix seek producer", resource);
        self.scope.spawn(move || {
            let mut sent = 0usize;
            let mut entry = cursor.seek(&prefix);
            loop {
                match entry {
                    Ok(Some((key, value))) if key.starts_with(&prefix) => {
                        if cancel.is_cancelled() || tx.send(Ok((key, value))).is_err() {
                            break;
                        }
                        sent += 1;
                    }
                    Ok(_) => break,
                    Err(e) => {
                        // The consumer may already be gone; nothing left to report to.
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
                entry = cursor.next();
            }
            debug!("{}: prefix seek producer stopped after {} entries", resource, sent);
        });
        self.seek_rx = Some(rx);
    }

    /// Wait for the producer's next pair. Cancellation wins over a pending pair.
    fn recv_seek(&mut self) -> NetabaseResult<Option<KeyValue>> {
        let Some(rx) = self.seek_rx.as_ref() else {
            return Ok(None);
        };
        loop {
            if self.cancel.is_cancelled() {
                debug!("{}: prefix scan cancelled", self.resource);
                return Ok(None);
            }
            match rx.recv_timeout(self.poll_interval) {
                Ok(Ok(kv)) => return Ok(Some(kv)),
                Ok(Err(e)) => return Err(cursor_error(self.resource, e)),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
            }
        }
    }
}

fn cursor_error(resource: &str, err: KvError) -> NetabaseError {
    NetabaseError::internal(format!("failed to read {} cursor", resource))
        .with_resource(resource)
        .with_source(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CodecError, ErrorKind};
    use crate::traits::codec::Decoded;
    use std::collections::BTreeMap;
    use std::ops::Bound::{Excluded, Included, Unbounded};

    /// Cursor over a fixed map, enough to exercise the iterator in isolation.
    struct VecCursor {
        entries: BTreeMap<Vec<u8>, Vec<u8>>,
        position: Option<Vec<u8>>,
    }

    impl VecCursor {
        fn new(keys: &[&str]) -> Self {
            let entries = keys
                .iter()
                .map(|k| (k.as_bytes().to_vec(), k.as_bytes().to_vec()))
                .collect();
            Self { entries, position: None }
        }

        fn at(&mut self, found: Option<(&Vec<u8>, &Vec<u8>)>) -> Result<Option<KeyValue>, KvError> {
            let found = found.map(|(k, v)| (k.clone(), v.clone()));
            if let Some((k, _)) = &found {
                self.position = Some(k.clone());
            }
            Ok(found)
        }
    }

    impl Cursor for VecCursor {
        fn first(&mut self) -> Result<Option<KeyValue>, KvError> {
            let entries = std::mem::take(&mut self.entries);
            let out = self.at(entries.iter().next());
            self.entries = entries;
            out
        }

        fn last(&mut self) -> Result<Option<KeyValue>, KvError> {
            let entries = std::mem::take(&mut self.entries);
            let out = self.at(entries.iter().next_back());
            self.entries = entries;
            out
        }

        fn next(&mut self) -> Result<Option<KeyValue>, KvError> {
            let pos = self.position.clone().unwrap_or_default();
            let entries = std::mem::take(&mut self.entries);
            let out = self.at(entries.range::<[u8], _>((Excluded(pos.as_slice()), Unbounded)).next());
            self.entries = entries;
            out
        }

        fn prev(&mut self) -> Result<Option<KeyValue>, KvError> {
            let pos = self.position.clone().unwrap_or_default();
            let entries = std::mem::take(&mut self.entries);
            let out = self.at(entries.range::<[u8], _>((Unbounded, Excluded(pos.as_slice()))).next_back());
            self.entries = entries;
            out
        }

        fn seek(&mut self, seek: &[u8]) -> Result<Option<KeyValue>, KvError> {
            let entries = std::mem::take(&mut self.entries);
            let out = self.at(entries.range::<[u8], _>((Included(seek), Unbounded)).next());
            self.entries = entries;
            out
        }
    }

    /// Serves `healthy` moves from the inner cursor, then fails every move.
    struct FailingCursor {
        inner: VecCursor,
        healthy: usize,
    }

    impl FailingCursor {
        fn new(keys: &[&str], healthy: usize) -> Self {
            Self {
                inner: VecCursor::new(keys),
                healthy,
            }
        }

        fn step(
            &mut self,
            f: impl FnOnce(&mut VecCursor) -> Result<Option<KeyValue>, KvError>,
        ) -> Result<Option<KeyValue>, KvError> {
            if self.healthy == 0 {
                return Err(KvError::Storage("disk on fire".to_string()));
            }
            self.healthy -= 1;
            f(&mut self.inner)
        }
    }

    impl Cursor for FailingCursor {
        fn first(&mut self) -> Result<Option<KeyValue>, KvError> {
            self.step(|c| c.first())
        }

        fn last(&mut self) -> Result<Option<KeyValue>, KvError> {
            self.step(|c| c.last())
        }

        fn next(&mut self) -> Result<Option<KeyValue>, KvError> {
            self.step(|c| c.next())
        }

        fn prev(&mut self) -> Result<Option<KeyValue>, KvError> {
            self.step(|c| c.prev())
        }

        fn seek(&mut self, seek: &[u8]) -> Result<Option<KeyValue>, KvError> {
            self.step(|c| c.seek(seek))
        }
    }

    fn decode_string(key: &[u8], value: &[u8]) -> Result<Decoded<String>, CodecError> {
        Ok(Some((key.to_vec(), String::from_utf8_lossy(value).into_owned())))
    }

    /// Drain a scan, returning what was yielded before the first error.
    fn drain<C: Cursor>(
        cursor: C,
        descending: bool,
        prefix: &[u8],
    ) -> (Vec<String>, NetabaseResult<()>) {
        let decode = decode_string;
        std::thread::scope(|s| {
            let mut iter = Iter::new(
                s,
                cursor,
                IterParams::<String> {
                    descending,
                    limit: 0,
                    offset: 0,
                    prefix,
                    resource: "test",
                    decode: &decode,
                    filter: None,
                    cancel: CancellationToken::new(),
                    poll_interval: Duration::from_millis(1),
                },
            );
            let mut out = Vec::new();
            loop {
                match iter.next() {
                    Ok(Some((_, v))) => out.push(v),
                    Ok(None) => return (out, Ok(())),
                    Err(e) => return (out, Err(e)),
                }
            }
        })
    }

    fn collect(
        keys: &[&str],
        descending: bool,
        offset: usize,
        limit: usize,
        prefix: &[u8],
        filter: Option<FilterFn<'_, String>>,
    ) -> Vec<String> {
        let decode = decode_string;
        std::thread::scope(|s| {
            let mut iter = Iter::new(
                s,
                VecCursor::new(keys),
                IterParams {
                    descending,
                    limit,
                    offset,
                    prefix,
                    resource: "test",
                    decode: &decode,
                    filter: filter.as_ref(),
                    cancel: CancellationToken::new(),
                    poll_interval: Duration::from_millis(1),
                },
            );
            let mut out = Vec::new();
            while let Some((_, v)) = iter.next().unwrap() {
                out.push(v);
            }
            out
        })
    }

    #[test]
    fn ascending_and_descending() {
        let keys = ["c", "a", "b"];
        assert_eq!(collect(&keys, false, 0, 0, b"", None), ["a", "b", "c"]);
        assert_eq!(collect(&keys, true, 0, 0, b"", None), ["c", "b", "a"]);
    }

    #[test]
    fn offset_and_limit_window() {
        let keys = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
        assert_eq!(collect(&keys, false, 3, 4, b"", None), ["3", "4", "5", "6"]);
        assert_eq!(collect(&keys, false, 0, 1, b"", None), ["0"]);
        assert_eq!(collect(&keys, true, 8, 5, b"", None), ["1", "0"]);
        assert!(collect(&keys, false, 10, 0, b"", None).is_empty());
    }

    #[test]
    fn huge_offset_saturates_the_window() {
        let keys = ["0", "1", "2"];
        assert!(collect(&keys, false, usize::MAX, 1, b"", None).is_empty());
        assert!(collect(&keys, false, usize::MAX, 2, b"", None).is_empty());
        assert!(collect(&keys, true, usize::MAX - 1, usize::MAX, b"", None).is_empty());
        assert_eq!(collect(&keys, false, 1, usize::MAX, b"", None), ["1", "2"]);
    }

    #[test]
    fn cursor_error_aborts_a_plain_scan() {
        for descending in [false, true] {
            let (seen, res) = drain(FailingCursor::new(&["a", "b", "c"], 2), descending, b"");
            assert_eq!(seen.len(), 2);
            let err = res.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Internal);
            assert_eq!(err.message(), "failed to read test cursor");
            assert_eq!(err.resource(), Some("test"));
        }
    }

    #[test]
    fn cursor_error_crosses_the_prefix_producer() {
        let (seen, res) = drain(FailingCursor::new(&["a/1", "a/2", "a/3"], 1), false, b"a/");
        assert_eq!(seen, ["a/1"]);
        let err = res.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.message(), "failed to read test cursor");

        let (seen, res) = drain(FailingCursor::new(&["a/1"], 0), false, b"a/");
        assert!(seen.is_empty());
        assert_eq!(res.unwrap_err().kind(), ErrorKind::Internal);
    }

    #[test]
    fn window_counts_only_accepted_entries() {
        let keys = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
        let even: FilterFn<'_, String> =
            Box::new(|_: &[u8], v: &String| v.parse::<u32>().unwrap() % 2 == 0);
        assert_eq!(collect(&keys, false, 1, 2, b"", Some(even)), ["2", "4"]);
    }

    #[test]
    fn prefix_scan_is_forward_only() {
        let keys = ["a/1", "a/2", "b/1", "a/3"];
        assert_eq!(collect(&keys, true, 0, 0, b"a/", None), ["a/1", "a/2", "a/3"]);
        assert_eq!(collect(&keys, false, 1, 1, b"a/", None), ["a/2"]);
        assert!(collect(&keys, false, 0, 0, b"c/", None).is_empty());
    }

    #[test]
    fn decoder_end_signal_stops_iteration() {
        let stop_at_b = |key: &[u8], value: &[u8]| -> Result<Decoded<String>, CodecError> {
            if key == b"b" {
                return Ok(None);
            }
            decode_string(key, value)
        };
        let out = std::thread::scope(|s| {
            let mut iter = Iter::new(
                s,
                VecCursor::new(&["a", "b", "c"]),
                IterParams::<String> {
                    descending: false,
                    limit: 0,
                    offset: 0,
                    prefix: b"",
                    resource: "test",
                    decode: &stop_at_b,
                    filter: None,
                    cancel: CancellationToken::new(),
                    poll_interval: Duration::from_millis(1),
                },
            );
            let mut out = Vec::new();
            while let Some((_, v)) = iter.next().unwrap() {
                out.push(v);
            }
            assert!(iter.next().unwrap().is_none());
            out
        });
        assert_eq!(out, ["a"]);
    }
}
