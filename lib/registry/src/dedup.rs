//! Bounded recency-ordered set used to skip redundant writes.
//!
//! The cache is volatile and only ever suppresses writes that are
//! idempotent downstream, so losing it (restart, eviction) costs at most one
//! redundant write per key.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

/// A set that remembers the most recently seen keys.
///
/// Lookups and recency updates are O(1): keys are indexed by a hash map
/// into a slab-backed doubly linked list ordered from most to least
/// recently seen.
#[derive(Debug)]
pub struct LeastRecentlySeen<K> {
    capacity: usize,
    inner: Mutex<RecencyList<K>>,
}

impl<K: Hash + Eq + Clone> LeastRecentlySeen<K> {
    /// Creates a cache holding at most `capacity` keys.
    ///
    /// A capacity of zero means unbounded.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(RecencyList::new()),
        }
    }

    /// Reports whether `key` was already seen, remembering it either way.
    ///
    /// Returns `false` and records the key as most recently seen when it is
    /// new; returns `true` and moves it to the most recently seen position
    /// otherwise. The check and the update happen under one lock, so two
    /// concurrent callers can never both observe "not seen" for a key.
    pub fn look_and_remember(&self, key: &K) -> bool {
        let mut list = self.lock();
        if let Some(&slot) = list.index.get(key) {
            list.move_to_front(slot);
            return true;
        }

        list.push_front(key.clone());
        if self.capacity > 0 && list.len() > self.capacity {
            list.evict_least_recent();
        }
        false
    }

    /// Drops `key` from the cache so its next sighting counts as new.
    ///
    /// Returns whether the key was present.
    pub fn forget(&self, key: &K) -> bool {
        let mut list = self.lock();
        match list.index.remove(key) {
            Some(slot) => {
                list.detach(slot);
                list.free.push(slot);
                true
            }
            None => false,
        }
    }

    /// Number of keys currently remembered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity (zero when unbounded).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecencyList<K>> {
        // Every mutation leaves the list consistent before it can panic, so
        // a poisoned lock still guards a usable list.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
struct Slot<K> {
    key: K,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Slab-backed list, head is the most recently seen key.
#[derive(Debug)]
struct RecencyList<K> {
    index: HashMap<K, usize>,
    slots: Vec<Slot<K>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K: Hash + Eq + Clone> RecencyList<K> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn push_front(&mut self, key: K) {
        let slot = Slot {
            key: key.clone(),
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = slot;
                idx
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };
        self.index.insert(key, idx);
        self.attach_front(idx);
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.detach(idx);
        self.attach_front(idx);
    }

    fn evict_least_recent(&mut self) {
        if let Some(idx) = self.tail {
            self.detach(idx);
            let key = self.slots[idx].key.clone();
            self.index.remove(&key);
            self.free.push(idx);
        }
    }

    fn attach_front(&mut self, idx: usize) {
        self.slots[idx].prev = None;
        self.slots[idx].next = self.head;
        if let Some(old_head) = self.head {
            self.slots[old_head].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
        self.slots[idx].prev = None;
        self.slots[idx].next = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_look_is_unseen_then_seen() {
        let cache = LeastRecentlySeen::new(10);
        assert!(!cache.look_and_remember(&"k"));
        assert!(cache.look_and_remember(&"k"));
        assert!(cache.look_and_remember(&"k"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn overflow_evicts_least_recently_seen() {
        let cache = LeastRecentlySeen::new(3);
        for key in ["a", "b", "c", "d"] {
            assert!(!cache.look_and_remember(&key));
        }
        assert_eq!(cache.len(), 3);
        assert!(!cache.look_and_remember(&"a"), "a should have been evicted");
    }

    #[test]
    fn looking_refreshes_recency() {
        let cache = LeastRecentlySeen::new(3);
        cache.look_and_remember(&"a");
        cache.look_and_remember(&"b");
        cache.look_and_remember(&"c");
        // a becomes most recent, b is now the eviction candidate
        assert!(cache.look_and_remember(&"a"));
        cache.look_and_remember(&"d");

        assert!(cache.look_and_remember(&"a"));
        assert!(cache.look_and_remember(&"c"));
        assert!(cache.look_and_remember(&"d"));
        assert!(!cache.look_and_remember(&"b"));
    }

    #[test]
    fn zero_capacity_is_unbounded() {
        let cache = LeastRecentlySeen::new(0);
        for i in 0..1000 {
            cache.look_and_remember(&i);
        }
        assert_eq!(cache.len(), 1000);
        assert!(cache.look_and_remember(&0));
    }

    #[test]
    fn forget_makes_key_new_again() {
        let cache = LeastRecentlySeen::new(4);
        cache.look_and_remember(&"a");
        cache.look_and_remember(&"b");
        assert!(cache.forget(&"a"));
        assert!(!cache.forget(&"a"));
        assert!(!cache.look_and_remember(&"a"));
        assert!(cache.look_and_remember(&"b"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn slots_are_reused_after_eviction() {
        let cache = LeastRecentlySeen::new(2);
        for i in 0..100 {
            cache.look_and_remember(&i);
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.look_and_remember(&98));
        assert!(cache.look_and_remember(&99));
        assert_eq!(cache.lock().slots.len(), 3);
    }

    #[test]
    fn single_entry_cache_keeps_latest() {
        let cache = LeastRecentlySeen::new(1);
        cache.look_and_remember(&"a");
        cache.look_and_remember(&"b");
        assert!(cache.look_and_remember(&"b"));
        assert!(!cache.look_and_remember(&"a"));
    }

    #[test]
    fn concurrent_callers_see_a_key_as_new_exactly_once() {
        let cache = Arc::new(LeastRecentlySeen::new(64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    (0..32)
                        .filter(|key| !cache.look_and_remember(key))
                        .count()
                })
            })
            .collect();

        let unseen: usize = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .sum();
        assert_eq!(unseen, 32);
    }
}
