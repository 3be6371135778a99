//! Configuration for stores and backends.
//!
//! All configuration structs use the builder pattern via `typed-builder`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use typed_builder::TypedBuilder;

/// Tuning for a [`StoreBase`](crate::store::StoreBase).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use netabase_kv::config::StoreConfig;
///
/// let config = StoreConfig::builder()
///     .cancel_poll_interval(Duration::from_millis(1))
///     .build();
/// assert_eq!(config.cancel_poll_interval, Duration::from_millis(1));
/// ```
#[derive(Debug, Clone, TypedBuilder)]
#[builder(doc)]
pub struct StoreConfig {
    /// How long a prefix scan blocks on its producer before re-checking the
    /// cancellation token. Bounds the time a cancelled scan takes to stop.
    #[builder(default = Duration::from_millis(5))]
    pub cancel_poll_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Configuration for the sled backend.
///
/// # Examples
///
/// ```
/// use netabase_kv::config::SledConfig;
///
/// let config = SledConfig::builder()
///     .path("/data/store.sled")
///     .cache_capacity_bytes(64 * 1024 * 1024)
///     .build();
/// assert!(!config.temporary);
/// ```
#[derive(Debug, Clone, TypedBuilder)]
#[builder(doc)]
pub struct SledConfig {
    /// Directory holding the database
    #[builder(setter(into))]
    pub path: PathBuf,

    /// Remove the database when it is dropped
    #[builder(default = false)]
    pub temporary: bool,

    /// Page cache size
    #[builder(default = 256 * 1024 * 1024)]
    pub cache_capacity_bytes: u64,

    /// Background flush interval; `None` disables background flushing
    #[builder(default = Some(500))]
    pub flush_every_ms: Option<u64>,
}

impl SledConfig {
    /// Create a basic configuration with just a path
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self::builder().path(path).build()
    }

    /// Configuration for a throwaway database under the system temp dir.
    pub fn temp() -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let name = format!(
            "netabase_kv_{}_{:x}_{}",
            std::process::id(),
            nanos,
            COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        Self::builder()
            .path(std::env::temp_dir().join(name))
            .temporary(true)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.cancel_poll_interval, Duration::from_millis(5));
    }

    #[test]
    fn test_sled_config_builder() {
        let config = SledConfig::builder()
            .path(PathBuf::from("/tmp/test.sled"))
            .cache_capacity_bytes(1024)
            .flush_every_ms(None)
            .build();

        assert_eq!(config.path, PathBuf::from("/tmp/test.sled"));
        assert_eq!(config.cache_capacity_bytes, 1024);
        assert_eq!(config.flush_every_ms, None);
        assert!(!config.temporary);
    }

    #[test]
    fn test_sled_config_temp_paths_are_unique() {
        let a = SledConfig::temp();
        let b = SledConfig::temp();
        assert!(a.temporary);
        assert_ne!(a.path, b.path);
    }
}
