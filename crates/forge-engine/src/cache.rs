//! Result cache
//!
//! Keeps completed bundles keyed by request fingerprint under a byte
//! budget. Eviction is least-recently-used among unpinned entries;
//! pinned entries are never evicted by the budget, only by an
//! explicit `clear`. Only deterministic backends feed the cache, so a
//! hit is always equivalent to rerunning the task.

use forge_conform::AssetBundle;
use forge_core::{CacheConfig, Fingerprint};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

struct CacheEntry {
    bundle: Arc<AssetBundle>,
    size_bytes: usize,
    pinned: bool,
    last_used: u64,
}

struct CacheInner {
    capacity_bytes: usize,
    used_bytes: usize,
    /// Logical clock for LRU ordering
    tick: u64,
    entries: HashMap<Fingerprint, CacheEntry>,
}

impl CacheInner {
    fn touch(&mut self, fingerprint: &Fingerprint) {
        self.tick += 1;
        let tick = self.tick;
        if let Some(entry) = self.entries.get_mut(fingerprint) {
            entry.last_used = tick;
        }
    }

    fn evict_to_budget(&mut self) {
        while self.used_bytes > self.capacity_bytes {
            let victim = self
                .entries
                .iter()
                .filter(|(_, e)| !e.pinned)
                .min_by_key(|(_, e)| e.last_used)
                .map(|(fp, _)| *fp);
            match victim {
                Some(fp) => {
                    if let Some(entry) = self.entries.remove(&fp) {
                        self.used_bytes -= entry.size_bytes;
                    }
                }
                // Everything left is pinned; the budget is allowed to
                // overshoot until something is unpinned
                None => break,
            }
        }
    }
}

/// Cache occupancy snapshot
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub entries: usize,
    pub used_bytes: usize,
    pub capacity_bytes: usize,
}

pub struct ResultCache {
    enabled: bool,
    inner: Mutex<CacheInner>,
}

impl ResultCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            inner: Mutex::new(CacheInner {
                capacity_bytes: (config.size_mb as usize) * 1024 * 1024,
                used_bytes: 0,
                tick: 0,
                entries: HashMap::new(),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<Arc<AssetBundle>> {
        if !self.enabled {
            return None;
        }
        let mut inner = self.lock();
        inner.touch(fingerprint);
        inner
            .entries
            .get(fingerprint)
            .map(|e| Arc::clone(&e.bundle))
    }

    /// Insert a bundle. Oversized bundles (larger than the whole
    /// budget) are not stored.
    pub fn store(&self, fingerprint: Fingerprint, bundle: Arc<AssetBundle>) {
        if !self.enabled {
            return;
        }
        let size_bytes = bundle.size_estimate_bytes();
        let mut inner = self.lock();
        if size_bytes > inner.capacity_bytes {
            return;
        }
        inner.tick += 1;
        let tick = inner.tick;
        if let Some(old) = inner.entries.insert(
            fingerprint,
            CacheEntry {
                bundle,
                size_bytes,
                pinned: false,
                last_used: tick,
            },
        ) {
            inner.used_bytes -= old.size_bytes;
        }
        inner.used_bytes += size_bytes;
        inner.evict_to_budget();
    }

    /// Protect an entry from budget eviction. Returns false when the
    /// fingerprint is not cached.
    pub fn pin(&self, fingerprint: &Fingerprint) -> bool {
        let mut inner = self.lock();
        match inner.entries.get_mut(fingerprint) {
            Some(entry) => {
                entry.pinned = true;
                true
            }
            None => false,
        }
    }

    pub fn unpin(&self, fingerprint: &Fingerprint) -> bool {
        let mut inner = self.lock();
        match inner.entries.get_mut(fingerprint) {
            Some(entry) => {
                entry.pinned = false;
                true
            }
            None => false,
        }
    }

    /// Drop every entry, pinned included. Returns how many were
    /// removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let count = inner.entries.len();
        inner.entries.clear();
        inner.used_bytes = 0;
        count
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            used_bytes: inner.used_bytes,
            capacity_bytes: inner.capacity_bytes,
        }
    }
}
