use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

use super::CacheStats;
use crate::model::{AdjacencyList, NodeId};

/// Number of adjacency entries held when no capacity is configured.
pub const DEFAULT_ADJACENCY_CAPACITY: usize = 2048;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(DEFAULT_ADJACENCY_CAPACITY) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

/// Invalidation generations are tracked per stripe of node ids rather than
/// per node, so the table stays fixed-size.
const GENERATION_STRIPES: usize = 64;

struct AdjacencyState {
    entries: LruCache<NodeId, AdjacencyList>,
    stats: CacheStats,
    generations: [u64; GENERATION_STRIPES],
}

impl AdjacencyState {
    fn insert(&mut self, node: NodeId, edges: AdjacencyList) {
        self.stats.puts += 1;
        if let Some((evicted, _)) = self.entries.push(node, edges) {
            if evicted != node {
                self.stats.evictions += 1;
                trace!(evicted, inserted = node, "adjacency entry evicted");
            }
        }
    }

    fn generation_mut(&mut self, node: NodeId) -> &mut u64 {
        &mut self.generations[stripe(node)]
    }
}

fn stripe(node: NodeId) -> usize {
    node.rem_euclid(GENERATION_STRIPES as i64) as usize
}

/// Bounded LRU cache of node id → outgoing edge snapshot.
///
/// One mutex guards the entry table, the recency order and the counters, so a
/// [`stats`](Self::stats) snapshot always matches the structural state it
/// describes. The lock is held for a single operation and never across a
/// store call.
///
/// Read-through fills race with invalidation: a reader may load edges from
/// the store, lose the CPU while a writer commits and invalidates the node,
/// then store its now stale snapshot. To reject such fills the cache keeps an
/// invalidation generation per node stripe. A filler captures
/// [`generation`](Self::generation) before reading the store and stores with
/// [`put_if_current`](Self::put_if_current), which drops the snapshot if an
/// invalidation of that stripe happened in between.
pub struct AdjacencyCache {
    state: Mutex<AdjacencyState>,
}

impl Default for AdjacencyCache {
    fn default() -> Self {
        Self::new(DEFAULT_ADJACENCY_CAPACITY)
    }
}

impl AdjacencyCache {
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// A capacity of zero falls back to [`DEFAULT_ADJACENCY_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            state: Mutex::new(AdjacencyState {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
                generations: [0; GENERATION_STRIPES],
            }),
        }
    }

    /// Looks up `node`, promoting it to most-recently-used on a hit.
    pub fn get(&self, node: NodeId) -> Option<AdjacencyList> {
        let mut state = self.state.lock();
        state.stats.gets += 1;
        let found = state.entries.get(&node).cloned();
        if found.is_some() {
            state.stats.hits += 1;
        }
        found
    }

    /// Stores `edges` for `node` as the most-recently-used entry.
    ///
    /// Replacing an existing entry never evicts. Inserting a new entry into a
    /// full cache evicts exactly the least-recently-used one.
    pub fn put(&self, node: NodeId, edges: AdjacencyList) {
        self.state.lock().insert(node, edges);
    }

    /// Stores `edges` for `node` only if no invalidation touched the node's
    /// stripe since `generation` was captured. Returns whether it was stored.
    ///
    /// A dropped fill counts as neither a put nor an eviction.
    pub fn put_if_current(&self, node: NodeId, generation: u64, edges: AdjacencyList) -> bool {
        let mut state = self.state.lock();
        if *state.generation_mut(node) != generation {
            trace!(node, "stale adjacency fill dropped");
            return false;
        }
        state.insert(node, edges);
        true
    }

    /// Invalidation generation covering `node`, to pass to
    /// [`put_if_current`](Self::put_if_current).
    pub fn generation(&self, node: NodeId) -> u64 {
        self.state.lock().generations[stripe(node)]
    }

    /// Drops the entry for `node` if present. Returns whether one was removed.
    ///
    /// Counters are left untouched: this is a correctness operation, not a
    /// capacity-driven eviction. Fills of the node's stripe that started
    /// before this call are rejected by [`put_if_current`](Self::put_if_current).
    pub fn invalidate(&self, node: NodeId) -> bool {
        let mut state = self.state.lock();
        *state.generation_mut(node) += 1;
        state.entries.pop(&node).is_some()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }

    /// Clears every entry and zeroes the counters.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.stats = CacheStats::default();
        for generation in state.generations.iter_mut() {
            *generation += 1;
        }
    }

    /// Returns true if `node` is cached, without touching recency or counters.
    pub fn contains(&self, node: NodeId) -> bool {
        self.state.lock().entries.contains(&node)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.state.lock().entries.cap().get()
    }
}
