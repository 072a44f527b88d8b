use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::CacheStats;
use crate::model::NodeId;

/// Identity of a cached route.
///
/// The epoch is part of the key: once the route cache's epoch advances, keys
/// built at older epochs can no longer be produced by a lookup, so their
/// entries are orphaned without being purged.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct RouteKey {
    /// Start node.
    pub source: NodeId,
    /// End node.
    pub destination: NodeId,
    /// Search algorithm tag.
    pub algorithm: &'static str,
    /// Route cache epoch observed before the lookup.
    pub epoch: u64,
}

#[derive(Default)]
struct RouteCounters {
    gets: AtomicU64,
    hits: AtomicU64,
    puts: AtomicU64,
}

/// Epoch-keyed cache of computed paths.
///
/// Unbounded: entries are only reclaimed by [`reset`](Self::reset). The
/// epoch is an independent atomic; callers read it before a lookup and use
/// it in the key, no atomicity with the adjacency cache is implied.
#[derive(Default)]
pub struct RouteCache {
    epoch: AtomicU64,
    routes: RwLock<HashMap<RouteKey, Arc<[NodeId]>>>,
    counters: RouteCounters,
}

impl RouteCache {
    /// Creates an empty cache at epoch 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the path stored under `key`.
    pub fn get(&self, key: &RouteKey) -> Option<Arc<[NodeId]>> {
        self.counters.gets.fetch_add(1, Ordering::Relaxed);
        let found = self.routes.read().get(key).cloned();
        if found.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Stores `path` under `key`, replacing any previous value.
    pub fn put(&self, key: RouteKey, path: Arc<[NodeId]>) {
        self.routes.write().insert(key, path);
        self.counters.puts.fetch_add(1, Ordering::Relaxed);
    }

    /// Current epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Advances the epoch by one and returns the new value.
    pub fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Counter snapshot. Evictions are always zero.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            gets: self.counters.gets.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
            puts: self.counters.puts.load(Ordering::Relaxed),
            evictions: 0,
        }
    }

    /// Number of stored entries, orphaned ones included.
    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry and zeroes the counters.
    ///
    /// The epoch is advanced rather than rewound, so a fill racing with the
    /// reset lands under a key no later lookup can build.
    pub fn reset(&self) {
        let mut routes = self.routes.write();
        routes.clear();
        self.counters.gets.store(0, Ordering::Relaxed);
        self.counters.hits.store(0, Ordering::Relaxed);
        self.counters.puts.store(0, Ordering::Relaxed);
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}
