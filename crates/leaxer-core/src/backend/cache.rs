//! Detection result cache.
//!
//! Hardware rarely changes within a session and the probes behind these
//! entries cost hundreds of milliseconds each, so every probe result is
//! memoized under its own key until [`DetectionCache::clear`] is called.
//!
//! Each key owns a `OnceLock` cell handed out under the map lock. The lock is
//! released before the probe runs, so probes for different keys proceed in
//! parallel while concurrent misses on one key run the probe once and the
//! other callers block on the cell until the value is stored.

use super::kind::BackendKind;
use crate::system::VendorGpuInfo;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, warn};

/// Well-known cache keys.
pub struct CacheKeys;

impl CacheKeys {
    pub const AVAILABLE_BACKENDS: &'static str = "available_backends";
    pub const CUDA: &'static str = "cuda";
    pub const ROCM: &'static str = "rocm";
    pub const DIRECTML: &'static str = "directml";
    pub const APPLE_SILICON: &'static str = "apple_silicon";
    pub const NVIDIA_INFO: &'static str = "nvidia_info";
    pub const AMD_INFO: &'static str = "amd_info";
    pub const APPLE_INFO: &'static str = "apple_info";
}

/// A memoized probe result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Flag(bool),
    Backends(Vec<BackendKind>),
    Vendor(VendorGpuInfo),
}

type Cell = Arc<OnceLock<CachedValue>>;

/// Process-wide detection cache. Share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct DetectionCache {
    entries: Mutex<HashMap<String, Cell>>,
}

impl DetectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the value cached under `key`, computing it on first use.
    ///
    /// If the map lock is poisoned the value is computed and returned without
    /// being stored.
    pub fn get_or_compute<F>(&self, key: &str, compute: F) -> CachedValue
    where
        F: FnOnce() -> CachedValue,
    {
        let cell = match self.entries.lock() {
            Ok(mut entries) => entries.entry(key.to_string()).or_default().clone(),
            Err(_) => {
                warn!("Detection cache unavailable, probing {} uncached", key);
                return compute();
            }
        };

        cell.get_or_init(|| {
            debug!("Detection cache miss for {}", key);
            compute()
        })
        .clone()
    }

    /// Cached boolean probe result.
    pub fn flag<F>(&self, key: &str, compute: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        match self.get_or_compute(key, || CachedValue::Flag(compute())) {
            CachedValue::Flag(value) => value,
            other => mismatch(key, other, false),
        }
    }

    /// Cached backend list.
    pub fn backends<F>(&self, key: &str, compute: F) -> Vec<BackendKind>
    where
        F: FnOnce() -> Vec<BackendKind>,
    {
        match self.get_or_compute(key, || CachedValue::Backends(compute())) {
            CachedValue::Backends(value) => value,
            other => mismatch(key, other, vec![BackendKind::Cpu]),
        }
    }

    /// Cached vendor GPU record.
    pub fn vendor<F>(&self, key: &str, compute: F) -> VendorGpuInfo
    where
        F: FnOnce() -> VendorGpuInfo,
    {
        match self.get_or_compute(key, || CachedValue::Vendor(compute())) {
            CachedValue::Vendor(value) => value,
            other => mismatch(key, other, VendorGpuInfo::unavailable()),
        }
    }

    /// Whether a value is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.get(key).is_some_and(|cell| cell.get().is_some()))
            .unwrap_or(false)
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|cell| cell.get().is_some()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. The next query of each key probes again.
    pub fn clear(&self) {
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.clear();
            }
            Err(poisoned) => {
                // Recover the map so the cache becomes usable again.
                let mut entries = poisoned.into_inner();
                entries.clear();
                self.entries.clear_poison();
            }
        }
        debug!("Detection cache cleared");
    }
}

fn mismatch<T>(key: &str, found: CachedValue, fallback: T) -> T {
    warn!("Detection cache key {} holds unexpected {:?}", key, found);
    fallback
}
