//! Scan and delete options.
//!
//! Options are built per call and consumed by it.

use tokio_util::sync::CancellationToken;

use crate::error::NetabaseResult;

/// Receives every key/decoded value pair a scan yields.
pub type CaptureFn<'a, V> = Box<dyn FnMut(&[u8], V) -> NetabaseResult<()> + 'a>;

/// Decides whether a scanned entry is accepted. Only accepted entries count
/// towards offset and limit.
pub type FilterFn<'a, V> = Box<dyn Fn(&[u8], &V) -> bool + 'a>;

/// Hook run for each entry a filtered delete removes, before the removal.
pub type DeleteRelationsFn<'a, V> = Box<dyn FnMut(&[u8], &V) -> NetabaseResult<()> + 'a>;

/// Options for [`StoreBase::find`](super::StoreBase::find).
///
/// # Example
///
/// ```
/// use netabase_kv::store::FindOpts;
///
/// let mut seen = Vec::new();
/// let opts = FindOpts::new(|key: &[u8], _value: u32| {
///     seen.push(key.to_vec());
///     Ok(())
/// })
/// .descending()
/// .with_offset(2)
/// .with_limit(5);
///
/// assert!(opts.descending);
/// assert_eq!((opts.offset, opts.limit), (2, 5));
/// ```
pub struct FindOpts<'a, V> {
    pub descending: bool,
    pub offset: usize,
    /// Zero means unbounded.
    pub limit: usize,
    /// Restricts the scan to keys starting with this prefix. Prefix scans
    /// always run in ascending order.
    pub prefix: Vec<u8>,
    pub capture: CaptureFn<'a, V>,
    pub filter: Option<FilterFn<'a, V>>,
    /// Caller-level cancellation. The scan derives its own child scope.
    pub cancel: Option<CancellationToken>,
}

impl<'a, V> FindOpts<'a, V> {
    pub fn new(capture: impl FnMut(&[u8], V) -> NetabaseResult<()> + 'a) -> Self {
        Self {
            descending: false,
            offset: 0,
            limit: 0,
            prefix: Vec::new(),
            capture: Box::new(capture),
            filter: None,
            cancel: None,
        }
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_filter(mut self, filter: impl Fn(&[u8], &V) -> bool + 'a) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Options for [`StoreBase::delete`](super::StoreBase::delete).
///
/// Without a filter the delete is a no-op.
pub struct DeleteOpts<'a, V> {
    pub filter: Option<FilterFn<'a, V>>,
    pub delete_relations: Vec<DeleteRelationsFn<'a, V>>,
    pub cancel: Option<CancellationToken>,
}

impl<'a, V> DeleteOpts<'a, V> {
    pub fn new() -> Self {
        Self {
            filter: None,
            delete_relations: Vec::new(),
            cancel: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Fn(&[u8], &V) -> bool + 'a) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Register a cascading hook. Hooks run in registration order.
    pub fn with_relation(
        mut self,
        hook: impl FnMut(&[u8], &V) -> NetabaseResult<()> + 'a,
    ) -> Self {
        self.delete_relations.push(Box::new(hook));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl<V> Default for DeleteOpts<'_, V> {
    fn default() -> Self {
        Self::new()
    }
}
