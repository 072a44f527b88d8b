//! Shortest-path search over cached adjacency lists.

mod cost;
mod dijkstra;

use std::sync::Arc;

use tracing::trace;

pub use cost::{distance_cost, travel_time_cost, CostModel};
pub use dijkstra::{shortest_path, PathResult};

use crate::cache::AdjacencyCache;
use crate::error::StoreResult;
use crate::model::{AdjacencyList, NodeId};
use crate::store::EdgeStore;

/// Source of outgoing edges for the search.
pub trait Neighbors {
    /// Returns the open outgoing edges of `node`.
    fn neighbors(&self, node: NodeId) -> StoreResult<AdjacencyList>;
}

/// Read-through view of the store via the adjacency cache.
#[derive(Clone)]
pub struct CachedGraph {
    store: Arc<dyn EdgeStore>,
    adjacency: Arc<AdjacencyCache>,
}

impl CachedGraph {
    /// Wraps `store` behind `adjacency`.
    pub fn new(store: Arc<dyn EdgeStore>, adjacency: Arc<AdjacencyCache>) -> Self {
        Self { store, adjacency }
    }

    /// The adjacency cache in front of the store.
    pub fn adjacency(&self) -> &Arc<AdjacencyCache> {
        &self.adjacency
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn EdgeStore> {
        &self.store
    }

    /// Drops any cached entry for `node` and reloads it from the store.
    ///
    /// Used after a committed write so the next search finds a warm, current
    /// entry. The invalidation also rejects read-through fills of `node` that
    /// loaded edges before the write. If the reload fails, or a later
    /// invalidation overtakes it, the node stays uncached.
    pub fn refresh(&self, node: NodeId) -> StoreResult<AdjacencyList> {
        self.adjacency.invalidate(node);
        self.load(node)
    }

    fn load(&self, node: NodeId) -> StoreResult<AdjacencyList> {
        let generation = self.adjacency.generation(node);
        let edges: AdjacencyList = self.store.outgoing(node)?.into();
        self.adjacency.put_if_current(node, generation, Arc::clone(&edges));
        Ok(edges)
    }
}

impl Neighbors for CachedGraph {
    fn neighbors(&self, node: NodeId) -> StoreResult<AdjacencyList> {
        if let Some(edges) = self.adjacency.get(node) {
            return Ok(edges);
        }
        trace!(node, "adjacency miss");
        self.load(node)
    }
}
