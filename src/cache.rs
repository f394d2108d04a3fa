//! Read-through cache with a pluggable freshness check.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};
use tracing::debug;

/// When a cached value must be reloaded.
#[derive(Debug, Clone)]
pub enum Freshness {
    /// Reload whenever the file's modification time differs from the one
    /// seen at load time.
    ModifiedAt(PathBuf),
    /// Reload once the value is older than the given duration.
    Ttl(Duration),
    /// Load once; keep for the rest of the process.
    ProcessLifetime,
    /// Always reload.
    Disabled,
}

impl Freshness {
    fn stamp(&self) -> Option<SystemTime> {
        match self {
            Freshness::ModifiedAt(path) => std::fs::metadata(path).and_then(|m| m.modified()).ok(),
            _ => None,
        }
    }

    fn is_fresh<V>(&self, entry: &Entry<V>) -> bool {
        match self {
            Freshness::ModifiedAt(_) => entry.modified.is_some() && entry.modified == self.stamp(),
            Freshness::Ttl(ttl) => entry.loaded_at.elapsed() < *ttl,
            Freshness::ProcessLifetime => true,
            Freshness::Disabled => false,
        }
    }
}

struct Entry<V> {
    value: Arc<V>,
    loaded_at: Instant,
    modified: Option<SystemTime>,
}

pub struct ReadThroughCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V> Default for ReadThroughCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> ReadThroughCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key` if `freshness` says it is still
    /// valid, otherwise runs `load` and caches its result. Failed loads are
    /// not cached.
    pub async fn get_or_reload<F, Fut, E>(&self, key: &str, freshness: &Freshness, load: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(entry) = self.lock().get(key) {
            if freshness.is_fresh(entry) {
                debug!(key, "Cache hit");
                return Ok(entry.value.clone());
            }
        }

        debug!(key, "Cache miss, loading");
        let modified = freshness.stamp();
        let value = Arc::new(load().await?);

        self.lock().insert(
            key.to_string(),
            Entry {
                value: value.clone(),
                loaded_at: Instant::now(),
                modified,
            },
        );
        Ok(value)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry<V>>> {
        // A panic while holding the lock cannot leave a map entry half-written.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
