//! Bounded TTL cache of validation outcomes, keyed by canonical digest.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    written_at: Instant,
    passed: bool,
    /// Write sequence number; matches the entry's slot in `order`.
    seq: u64,
}

/// Validation results keyed by the submission's canonical digest.
///
/// Entries expire `ttl` after they were written. Expiry is enforced on read;
/// the size bound is enforced on write by purging expired entries and then
/// evicting the oldest writes.
#[derive(Debug)]
pub struct ValidationCache {
    ttl: Duration,
    max_entries: usize,
    entries: HashMap<String, CacheEntry>,
    /// Keys in write order. Slots whose `seq` no longer matches the entry
    /// were superseded or removed and are skipped.
    order: VecDeque<(u64, String)>,
    next_seq: u64,
}

impl ValidationCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: HashMap::new(),
            order: VecDeque::new(),
            next_seq: 0,
        }
    }

    /// Cached outcome for `key` if it is younger than the TTL at `now`.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<bool> {
        let entry = *self.entries.get(key)?;
        if now.saturating_duration_since(entry.written_at) < self.ttl {
            Some(entry.passed)
        } else {
            self.entries.remove(key);
            None
        }
    }

    /// Record an outcome written at `now`.
    pub fn insert(&mut self, key: String, passed: bool, now: Instant) {
        if self.max_entries == 0 {
            return;
        }

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.purge_expired(now);
            while self.entries.len() >= self.max_entries {
                if !self.evict_oldest() {
                    break;
                }
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.push_back((seq, key.clone()));
        self.entries.insert(
            key,
            CacheEntry {
                written_at: now,
                passed,
                seq,
            },
        );

        if self.order.len() > self.max_entries.saturating_mul(2) {
            let entries = &self.entries;
            self.order
                .retain(|(seq, key)| entries.get(key).is_some_and(|e| e.seq == *seq));
        }
    }

    /// Drop every entry that has outlived the TTL at `now`.
    pub fn purge_expired(&mut self, now: Instant) {
        let before = self.entries.len();
        while let Some((seq, key)) = self.order.front() {
            let live = match self.entries.get(key) {
                Some(e) if e.seq == *seq => *e,
                _ => {
                    self.order.pop_front();
                    continue;
                }
            };
            if now.saturating_duration_since(live.written_at) < self.ttl {
                break;
            }
            if let Some((_, key)) = self.order.pop_front() {
                self.entries.remove(&key);
            }
        }
        let purged = before - self.entries.len();
        if purged > 0 {
            tracing::debug!(purged, "purged expired validation cache entries");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove the oldest live write. Returns `false` when nothing is left.
    fn evict_oldest(&mut self) -> bool {
        while let Some((seq, key)) = self.order.pop_front() {
            if self.entries.get(&key).is_some_and(|e| e.seq == seq) {
                self.entries.remove(&key);
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_expires_after_ttl_from_write() {
        let mut cache = ValidationCache::new(Duration::from_secs(3600), 10);
        let t0 = Instant::now();
        cache.insert("a".into(), true, t0);

        assert_eq!(cache.get("a", t0 + Duration::from_secs(10)), Some(true));
        // Reading does not refresh the entry.
        assert_eq!(cache.get("a", t0 + Duration::from_secs(3599)), Some(true));
        assert_eq!(cache.get("a", t0 + Duration::from_secs(3600)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn missing_key() {
        let mut cache = ValidationCache::new(Duration::from_secs(60), 10);
        assert_eq!(cache.get("nope", Instant::now()), None);
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut cache = ValidationCache::new(Duration::from_secs(3600), 2);
        let t0 = Instant::now();
        cache.insert("a".into(), true, t0);
        cache.insert("b".into(), true, t0 + Duration::from_secs(1));
        cache.insert("c".into(), true, t0 + Duration::from_secs(2));

        assert_eq!(cache.len(), 2);
        let now = t0 + Duration::from_secs(3);
        assert_eq!(cache.get("a", now), None);
        assert_eq!(cache.get("b", now), Some(true));
        assert_eq!(cache.get("c", now), Some(true));
    }

    #[test]
    fn purges_expired_before_evicting_live_entries() {
        let mut cache = ValidationCache::new(Duration::from_secs(10), 2);
        let t0 = Instant::now();
        cache.insert("stale".into(), true, t0);
        cache.insert("live".into(), true, t0 + Duration::from_secs(8));
        cache.insert("new".into(), true, t0 + Duration::from_secs(12));

        let now = t0 + Duration::from_secs(13);
        assert_eq!(cache.get("live", now), Some(true));
        assert_eq!(cache.get("new", now), Some(true));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn rewriting_existing_key_does_not_evict() {
        let mut cache = ValidationCache::new(Duration::from_secs(3600), 2);
        let t0 = Instant::now();
        cache.insert("a".into(), true, t0);
        cache.insert("b".into(), true, t0);
        cache.insert("a".into(), true, t0 + Duration::from_secs(5));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b", t0 + Duration::from_secs(6)), Some(true));
    }

    #[test]
    fn rewritten_key_moves_to_back_of_eviction_order() {
        let mut cache = ValidationCache::new(Duration::from_secs(3600), 2);
        let t0 = Instant::now();
        cache.insert("a".into(), true, t0);
        cache.insert("b".into(), true, t0 + Duration::from_secs(1));
        cache.insert("a".into(), true, t0 + Duration::from_secs(2));
        cache.insert("c".into(), true, t0 + Duration::from_secs(3));

        let now = t0 + Duration::from_secs(4);
        assert_eq!(cache.get("b", now), None);
        assert_eq!(cache.get("a", now), Some(true));
        assert_eq!(cache.get("c", now), Some(true));
    }

    #[test]
    fn write_order_stays_bounded_under_churn() {
        let mut cache = ValidationCache::new(Duration::from_secs(3600), 3);
        let t0 = Instant::now();
        for n in 0..100u64 {
            cache.insert(format!("k{}", n % 2), true, t0 + Duration::from_secs(n));
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.order.len() <= 6);
    }
}
