//! Bounded, time-windowed record of webhook message ids.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use tracing::debug;

pub struct MessageIdCache {
    seen: DashMap<String, DateTime<Utc>>,
    /// Insertion order. An entry whose timestamp no longer matches `seen` is
    /// stale and skipped on eviction.
    order: Mutex<VecDeque<(String, DateTime<Utc>)>>,
    window: Duration,
    max_entries: usize,
}

impl MessageIdCache {
    pub fn new(window: Duration, max_entries: usize) -> Self {
        Self {
            seen: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            window,
            max_entries: max_entries.max(1),
        }
    }

    /// Records `message_id` and returns `true` if it was not seen inside the
    /// window. The check and the insert happen under the same shard lock, so
    /// two racing deliveries of one id cannot both get `true`.
    pub fn check_and_insert(&self, message_id: &str, now: DateTime<Utc>) -> bool {
        let fresh = match self.seen.entry(message_id.to_string()) {
            Entry::Occupied(mut e) => {
                if now - *e.get() < self.window {
                    false
                } else {
                    e.insert(now);
                    true
                }
            }
            Entry::Vacant(v) => {
                v.insert(now);
                true
            }
        };

        // The shard guard is released here; `order` is never locked while
        // holding one.
        if fresh {
            self.order.lock().push_back((message_id.to_string(), now));
            if self.seen.len() > self.max_entries {
                self.evict_oldest();
            }
        }
        fresh
    }

    /// Drops `message_id` so a redelivery is accepted again. Used when an
    /// accepted delivery could not be handed off.
    pub fn forget(&self, message_id: &str) -> bool {
        self.seen.remove(message_id).is_some()
    }

    /// Forgets ids older than the window. Returns how many were dropped.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let before = self.seen.len();
        self.seen.retain(|_, seen_at| now - *seen_at < self.window);
        self.order
            .lock()
            .retain(|(id, at)| self.seen.get(id).is_some_and(|seen_at| *seen_at == *at));
        before.saturating_sub(self.seen.len())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn evict_oldest(&self) {
        let mut order = self.order.lock();
        let mut evicted = 0;
        while self.seen.len() > self.max_entries {
            let Some((id, at)) = order.pop_front() else { break };
            if self.seen.remove_if(&id, |_, seen_at| *seen_at == at).is_some() {
                evicted += 1;
            }
        }
        debug!("[Dedup] evicted {} message ids over capacity", evicted);
    }

    #[cfg(test)]
    fn order_len(&self) -> usize {
        self.order.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn duplicate_inside_window_is_rejected() {
        let cache = MessageIdCache::new(Duration::minutes(10), 100);
        assert!(cache.check_and_insert("m1", t0()));
        assert!(!cache.check_and_insert("m1", t0() + Duration::minutes(9)));
        assert!(cache.check_and_insert("m1", t0() + Duration::minutes(11)));
    }

    #[test]
    fn prune_forgets_old_ids() {
        let cache = MessageIdCache::new(Duration::minutes(10), 100);
        cache.check_and_insert("old", t0());
        cache.check_and_insert("new", t0() + Duration::minutes(8));
        assert_eq!(cache.prune(t0() + Duration::minutes(12)), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.check_and_insert("old", t0() + Duration::minutes(12)));
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let cache = MessageIdCache::new(Duration::minutes(10), 2);
        cache.check_and_insert("a", t0());
        cache.check_and_insert("b", t0() + Duration::seconds(1));
        cache.check_and_insert("c", t0() + Duration::seconds(2));
        assert_eq!(cache.len(), 2);
        assert!(cache.check_and_insert("a", t0() + Duration::seconds(3)));
        assert!(!cache.check_and_insert("c", t0() + Duration::seconds(3)));
    }

    #[test]
    fn eviction_follows_insertion_order() {
        let cache = MessageIdCache::new(Duration::minutes(1), 3);
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            cache.check_and_insert(id, t0() + Duration::seconds(i as i64));
        }
        // "a" expires and is re-inserted, so "b" is now the oldest.
        assert!(cache.check_and_insert("a", t0() + Duration::minutes(2)));
        assert!(cache.check_and_insert("d", t0() + Duration::minutes(2)));
        assert_eq!(cache.len(), 3);
        assert!(cache.check_and_insert("b", t0() + Duration::minutes(2)));
        assert!(!cache.check_and_insert("a", t0() + Duration::minutes(2)));
        assert!(!cache.check_and_insert("d", t0() + Duration::minutes(2)));
    }

    #[test]
    fn many_inserts_stay_bounded() {
        let cache = MessageIdCache::new(Duration::hours(1), 100);
        for i in 0..10_000 {
            assert!(cache.check_and_insert(&format!("m{}", i), t0()));
        }
        assert_eq!(cache.len(), 100);
        assert_eq!(cache.order_len(), 100);
        assert!(!cache.check_and_insert("m9999", t0()));
        assert!(cache.check_and_insert("m0", t0()));
    }

    #[test]
    fn forgotten_id_is_accepted_again() {
        let cache = MessageIdCache::new(Duration::minutes(10), 10);
        assert!(cache.check_and_insert("m1", t0()));
        assert!(cache.forget("m1"));
        assert!(!cache.forget("m1"));
        assert!(cache.check_and_insert("m1", t0() + Duration::seconds(1)));
        assert!(!cache.check_and_insert("m1", t0() + Duration::seconds(2)));
        cache.prune(t0() + Duration::minutes(1));
        assert_eq!(cache.order_len(), 1);
    }

    #[test]
    fn racing_inserts_admit_exactly_one() {
        let cache = Arc::new(MessageIdCache::new(Duration::minutes(10), 1000));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.check_and_insert("same-id", t0()))
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
    }
}
