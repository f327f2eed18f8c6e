//! Per-timeframe cache of derived analysis.
//!
//! An entry computed at `t` for granularity `g` is valid while
//! `now < t + g.duration()`. Expired entries are dropped on lookup, so
//! repeated ticks inside one candle period reuse the same analysis and the
//! first tick after the period refetches.

use super::granularity::Granularity;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub computed_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub payload: Arc<T>,
}

impl<T> CacheEntry<T> {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.valid_until
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisCache<T> {
    entries: HashMap<Granularity, CacheEntry<T>>,
}

impl<T> Default for AnalysisCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> AnalysisCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Valid payload for `granularity`, invalidating the entry if it expired.
    pub fn get(&mut self, granularity: Granularity, now: DateTime<Utc>) -> Option<Arc<T>> {
        match self.entries.get(&granularity) {
            Some(entry) if entry.is_valid_at(now) => Some(Arc::clone(&entry.payload)),
            Some(_) => {
                self.entries.remove(&granularity);
                None
            }
            None => None,
        }
    }

    pub fn insert(&mut self, granularity: Granularity, now: DateTime<Utc>, payload: T) -> Arc<T> {
        let payload = Arc::new(payload);
        self.entries.insert(
            granularity,
            CacheEntry {
                computed_at: now,
                valid_until: now + granularity.duration(),
                payload: Arc::clone(&payload),
            },
        );
        payload
    }

    pub fn invalidate(&mut self, granularity: Granularity) {
        self.entries.remove(&granularity);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap()
    }

    #[test]
    fn entry_valid_within_window() {
        let mut cache = AnalysisCache::new();
        cache.insert(Granularity::M5, t0(), 7u32);
        let hit = cache.get(Granularity::M5, t0() + Duration::minutes(4));
        assert_eq!(hit.as_deref(), Some(&7));
    }

    #[test]
    fn entry_invalidated_after_window() {
        let mut cache = AnalysisCache::new();
        cache.insert(Granularity::M5, t0(), 7u32);
        assert!(cache.get(Granularity::M5, t0() + Duration::minutes(5)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn timeframes_are_independent() {
        let mut cache = AnalysisCache::new();
        cache.insert(Granularity::M5, t0(), 1u32);
        cache.insert(Granularity::H4, t0(), 2u32);
        let later = t0() + Duration::minutes(30);
        assert!(cache.get(Granularity::M5, later).is_none());
        assert_eq!(cache.get(Granularity::H4, later).as_deref(), Some(&2));
    }
}
