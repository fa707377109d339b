// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::collections::BTreeMap;

/// Fixed-capacity lookup cache with least-recently-used eviction.
/// A capacity of zero disables caching entirely.
///
/// Recency is a monotonically increasing tick per access, indexed in a
/// second map, so touching and evicting are both logarithmic.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    capacity: usize,
    entries: BTreeMap<K, (V, u64)>,
    recency: BTreeMap<u64, K>,
    tick: u64,
}

impl<K: Ord + Clone, V: Clone> BoundedCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: BTreeMap::new(),
            recency: BTreeMap::new(),
            tick: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        let tick = self.next_tick();
        let (value, last_used) = self.entries.get_mut(key)?;
        self.recency.remove(last_used);
        *last_used = tick;
        self.recency.insert(tick, key.clone());
        Some(value.clone())
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        let tick = self.next_tick();
        if let Some((_, last_used)) = self.entries.insert(key.clone(), (value, tick)) {
            self.recency.remove(&last_used);
        }
        self.recency.insert(tick, key);
        self.prune();
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let (value, last_used) = self.entries.remove(key)?;
        self.recency.remove(&last_used);
        Some(value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn prune(&mut self) {
        while self.entries.len() > self.capacity {
            match self.recency.pop_first() {
                Some((_, evicted)) => {
                    self.entries.remove(&evicted);
                }
                None => break,
            }
        }
    }
}
