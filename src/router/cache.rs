use std::sync::Arc;

use dashmap::DashMap;

use super::decision::RouteDecision;

/// Key/value store for route decisions
///
/// Entries are only ever inserted; an existing entry is never replaced.
pub trait RouteCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Arc<RouteDecision>>;

    /// Insert `decision` unless `key` is already present
    ///
    /// Returns `true` when this call inserted the entry.
    fn put_if_absent(&self, key: String, decision: Arc<RouteDecision>) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the cache key for a statement
pub fn cache_key(schema: Option<&str>, user: &str, sql: &str) -> String {
    format!("{}_{}_{}", schema.unwrap_or("NULL"), user, sql)
}

/// Concurrent, capacity-bounded route cache
///
/// Once full, further inserts are skipped rather than evicting.
pub struct SqlRouteCache {
    entries: DashMap<String, Arc<RouteDecision>>,
    capacity: usize,
}

impl SqlRouteCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl RouteCache for SqlRouteCache {
    fn get(&self, key: &str) -> Option<Arc<RouteDecision>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn put_if_absent(&self, key: String, decision: Arc<RouteDecision>) -> bool {
        // Approximate bound: concurrent inserts may overshoot by a few entries
        if self.entries.len() >= self.capacity {
            return false;
        }
        match self.entries.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(decision);
                true
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
