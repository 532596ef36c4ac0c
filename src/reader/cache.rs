//! Bounded cache of summed spectra.
//!
//! A cache entry covers one `(frame range, frame type)` window: the decoded
//! and frame-summed intensities per scan, plus the whole-window sum for
//! queries spanning every scan. Entries are reused by any query over the
//! same window, which is what makes repeated multi-frame spectrum pulls
//! (e.g. stepping through scan windows in a viewer) cheap.
//!
//! Eviction is LRU with two caps: a soft cap on entry count and a hard cap
//! on estimated memory. The estimate is a simple per-pair cost; the
//! contract is only that the caps bound the cache, not that the estimate is
//! exact.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::params::FrameType;

/// Eviction bounds for the spectrum cache
#[derive(Debug, Clone, Copy)]
pub struct SpectrumCacheConfig {
    /// Soft cap on the number of cached frame-range entries
    pub max_entries: usize,
    /// Hard cap on the estimated memory held by the cache, in bytes
    pub max_memory_bytes: usize,
}

impl Default for SpectrumCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10,
            max_memory_bytes: 750 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CacheKey {
    pub start_frame: i32,
    pub end_frame: i32,
    pub frame_type: FrameType,
}

/// Decoded intensities for one frame-range window
#[derive(Debug, Default)]
pub(crate) struct CacheEntry {
    /// Per scan: ordered bin-to-summed-intensity map (summed across the
    /// window's frames)
    pub per_scan: BTreeMap<i32, BTreeMap<i32, i64>>,
    /// Summed across every scan of the window
    pub summed: BTreeMap<i32, i64>,
}

impl CacheEntry {
    /// Rough live-heap cost of the entry.
    pub fn estimated_bytes(&self) -> usize {
        // B-tree node overhead amortizes to roughly 3x the payload of an
        // (i32, i64) pair.
        const PAIR_COST: usize = 36;
        let pairs: usize =
            self.per_scan.values().map(BTreeMap::len).sum::<usize>() + self.summed.len();
        pairs * PAIR_COST + self.per_scan.len() * 64
    }
}

pub(crate) struct SpectrumCache {
    config: SpectrumCacheConfig,
    // Recency order: most recently used last.
    slots: Vec<(CacheKey, Rc<CacheEntry>)>,
}

impl SpectrumCache {
    pub fn new(config: SpectrumCacheConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
        }
    }

    /// Fetch an entry, marking it most recently used.
    pub fn get(&mut self, key: CacheKey) -> Option<Rc<CacheEntry>> {
        let index = self.slots.iter().position(|(k, _)| *k == key)?;
        let slot = self.slots.remove(index);
        let entry = Rc::clone(&slot.1);
        self.slots.push(slot);
        Some(entry)
    }

    /// Insert a freshly built entry and trim to the configured bounds.
    pub fn insert(&mut self, key: CacheKey, entry: CacheEntry) -> Rc<CacheEntry> {
        let entry = Rc::new(entry);
        self.slots.retain(|(k, _)| *k != key);
        self.slots.push((key, Rc::clone(&entry)));
        self.trim();
        entry
    }

    /// Drop every cached entry.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    fn total_bytes(&self) -> usize {
        self.slots.iter().map(|(_, e)| e.estimated_bytes()).sum()
    }

    fn trim(&mut self) {
        while self.slots.len() > self.config.max_entries {
            self.slots.remove(0);
        }
        // The newest entry always survives, even when it alone exceeds the
        // memory bound.
        while self.slots.len() > 1 && self.total_bytes() > self.config.max_memory_bytes {
            self.slots.remove(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with_pairs(pairs: usize) -> CacheEntry {
        let mut entry = CacheEntry::default();
        let mut bins = BTreeMap::new();
        for bin in 0..pairs as i32 {
            bins.insert(bin, 1i64);
        }
        entry.per_scan.insert(0, bins);
        entry
    }

    fn key(start: i32) -> CacheKey {
        CacheKey {
            start_frame: start,
            end_frame: start,
            frame_type: FrameType::Ms1,
        }
    }

    #[test]
    fn entry_count_is_bounded() {
        let mut cache = SpectrumCache::new(SpectrumCacheConfig {
            max_entries: 3,
            max_memory_bytes: usize::MAX,
        });
        for start in 0..10 {
            cache.insert(key(start), entry_with_pairs(4));
        }
        assert_eq!(cache.slots.len(), 3);
        assert!(cache.get(key(9)).is_some());
        assert!(cache.get(key(0)).is_none());
    }

    #[test]
    fn least_recently_used_is_evicted_first() {
        let mut cache = SpectrumCache::new(SpectrumCacheConfig {
            max_entries: 2,
            max_memory_bytes: usize::MAX,
        });
        cache.insert(key(1), entry_with_pairs(4));
        cache.insert(key(2), entry_with_pairs(4));
        // Touch 1 so that 2 becomes the eviction candidate.
        cache.get(key(1));
        cache.insert(key(3), entry_with_pairs(4));
        assert!(cache.get(key(1)).is_some());
        assert!(cache.get(key(2)).is_none());
    }

    #[test]
    fn memory_bound_trims_oldest_entries() {
        let mut cache = SpectrumCache::new(SpectrumCacheConfig {
            max_entries: 10,
            max_memory_bytes: 10_000,
        });
        for start in 0..5 {
            cache.insert(key(start), entry_with_pairs(100));
        }
        assert!(cache.total_bytes() <= 10_000);
        assert!(cache.slots.len() < 5);
        assert!(cache.get(key(4)).is_some());
    }

    #[test]
    fn oversized_newest_entry_survives() {
        let mut cache = SpectrumCache::new(SpectrumCacheConfig {
            max_entries: 10,
            max_memory_bytes: 100,
        });
        cache.insert(key(1), entry_with_pairs(1000));
        assert_eq!(cache.slots.len(), 1);
    }
}
