//! Generic get-or-compute cache boundary.
//!
//! The schema cache stores remote model descriptors through this interface so
//! deployments can swap the backend. The contract that matters is
//! at-most-one in-flight compute per key: concurrent callers for the same key
//! must block on the first caller's compute instead of racing their own.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::error::OrmError;

/// Values stored in a cache backend.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// Failure of the cache backend itself (lock poisoning, I/O, eviction races).
#[derive(Debug, Error)]
#[error("cache backend failure on key \"{key}\": {message}")]
pub struct CacheError {
    /// The key being accessed.
    pub key: String,
    /// Backend-specific description.
    pub message: String,
}

/// Outcome of a failed `get_or_compute`.
///
/// Backend failures are kept distinct from compute failures so the engine can
/// translate the former into its own runtime-error kind while passing the
/// latter through untouched.
#[derive(Debug, Error)]
pub enum CacheFailure {
    #[error(transparent)]
    Backend(#[from] CacheError),

    #[error(transparent)]
    Compute(OrmError),
}

/// Compute callback invoked on a cache miss.
pub type ComputeFn<'a> = &'a mut dyn FnMut() -> Result<CachedValue, OrmError>;

/// Key/value cache with a compute-if-absent primitive.
///
/// Implementations must guarantee that for any key at most one compute runs at
/// a time; later callers wait for the in-flight result. Failed computes are
/// never cached.
pub trait Cache: Send + Sync {
    /// Returns the cached value for `key`, computing and storing it on a miss.
    fn get_or_compute(&self, key: &str, compute: ComputeFn<'_>) -> Result<CachedValue, CacheFailure>;

    /// Drops the entry for `key`, if any.
    fn delete(&self, key: &str);
}

#[derive(Default)]
struct KeySlot {
    value: Mutex<Option<CachedValue>>,
}

/// In-memory cache backend.
///
/// Each key owns its own lock, so computes for distinct keys proceed
/// independently while concurrent callers of one key serialize on its slot.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Arc<KeySlot>>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Result<Arc<KeySlot>, CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError {
            key: key.to_string(),
            message: "poisoned entry map lock".to_string(),
        })?;
        Ok(entries.entry(key.to_string()).or_default().clone())
    }
}

impl Cache for MemoryCache {
    fn get_or_compute(&self, key: &str, compute: ComputeFn<'_>) -> Result<CachedValue, CacheFailure> {
        let slot = self.slot(key)?;

        // Per-key serialization point: the first caller computes while later
        // callers block here and then observe the stored value.
        let mut value = slot.value.lock().map_err(|_| CacheError {
            key: key.to_string(),
            message: "poisoned key slot lock".to_string(),
        })?;

        if let Some(cached) = value.as_ref() {
            return Ok(cached.clone());
        }

        let computed = compute().map_err(CacheFailure::Compute)?;
        *value = Some(computed.clone());
        Ok(computed)
    }

    fn delete(&self, key: &str) {
        // A compute still in flight on the removed slot finishes against the
        // orphaned slot; the next lookup starts from a fresh one.
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}
