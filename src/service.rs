//! Route lookup and edge update entry points.
//!
//! [`RouteService`] composes the store, the adjacency cache, the route cache
//! and the search. It is transport-agnostic and fully synchronous; the HTTP
//! layer runs each call on a blocking worker.
//!
//! There is no atomicity across the two caches. Between an update's
//! adjacency refresh and its epoch bump a concurrent lookup may pair the old
//! epoch with the new adjacency entry, or the reverse. Results are
//! consistent once the update call has returned, not while it runs.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::cache::{AdjacencyCache, CacheStats, RouteCache, RouteKey};
use crate::error::{Result, RouteError, StoreResult};
use crate::graph::{distance_cost, shortest_path, CachedGraph, CostModel};
use crate::model::{Cost, EdgeUpdate, NodeId, RouteResponse, UpdateAck};
use crate::store::EdgeStore;

/// Algorithm tag stored in every route key.
pub const ALGORITHM: &str = "dijkstra";

/// Edge weight function `(distance_m, speed_kmph) -> cost`.
pub type CostFn = Arc<dyn Fn(u32, u32) -> Cost + Send + Sync>;

/// Counters of both caches plus the current epoch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CacheStatsReport {
    /// Adjacency cache counters.
    pub adjacency: CacheStats,
    /// Route cache counters.
    pub routes: CacheStats,
    /// Stored route entries, orphaned ones included.
    pub route_entries: usize,
    /// Current route cache epoch.
    pub epoch: u64,
}

/// Query and update handlers over shared, injectable caches.
#[derive(Clone)]
pub struct RouteService {
    graph: CachedGraph,
    routes: Arc<RouteCache>,
    cost: CostFn,
}

impl fmt::Debug for RouteService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteService")
            .field("adjacency_capacity", &self.graph.adjacency().capacity())
            .field("epoch", &self.routes.epoch())
            .finish_non_exhaustive()
    }
}

impl RouteService {
    /// Builds a service using distance as the edge cost.
    pub fn new(
        store: Arc<dyn EdgeStore>,
        adjacency: Arc<AdjacencyCache>,
        routes: Arc<RouteCache>,
    ) -> Self {
        Self {
            graph: CachedGraph::new(store, adjacency),
            routes,
            cost: Arc::new(distance_cost),
        }
    }

    /// Replaces the cost function with a built-in model.
    pub fn with_cost_model(self, model: CostModel) -> Self {
        self.with_cost(move |distance_m, speed_kmph| model.cost(distance_m, speed_kmph))
    }

    /// Replaces the cost function.
    pub fn with_cost<F>(mut self, cost: F) -> Self
    where
        F: Fn(u32, u32) -> Cost + Send + Sync + 'static,
    {
        self.cost = Arc::new(cost);
        self
    }

    /// Adjacency cache shared with the search.
    pub fn adjacency(&self) -> &Arc<AdjacencyCache> {
        self.graph.adjacency()
    }

    /// Route cache and epoch holder.
    pub fn routes(&self) -> &Arc<RouteCache> {
        &self.routes
    }

    /// Backing edge store.
    pub fn store(&self) -> &Arc<dyn EdgeStore> {
        self.graph.store()
    }

    /// Shortest path from `source` to `destination`.
    ///
    /// The epoch is read once and the same key is used for both the lookup
    /// and the fill. A hit returns the cached path with zero total and zero
    /// explored nodes: only paths are cached.
    pub fn route(&self, source: NodeId, destination: NodeId) -> Result<RouteResponse> {
        let key = RouteKey {
            source,
            destination,
            algorithm: ALGORITHM,
            epoch: self.routes.epoch(),
        };

        if let Some(path) = self.routes.get(&key) {
            trace!(source, destination, epoch = key.epoch, "route cache hit");
            return Ok(RouteResponse {
                path: path.to_vec(),
                total: 0,
                explored_nodes: 0,
                cache_hit: true,
            });
        }

        let cost = Arc::clone(&self.cost);
        let result = shortest_path(&self.graph, source, destination, |d, s| cost(d, s))?;
        debug!(
            source,
            destination,
            epoch = key.epoch,
            explored = result.explored,
            total = result.total,
            found = result.is_found(),
            "route computed"
        );

        if result.is_found() {
            self.routes.put(key, Arc::from(result.path.as_slice()));
        }

        Ok(RouteResponse {
            path: result.path,
            total: result.total,
            explored_nodes: result.explored,
            cache_hit: false,
        })
    }

    /// Applies an edge update and invalidates what it affects.
    ///
    /// Speed and closure are written as two independent locked writes, in
    /// that order; a failing write stops the remaining ones. When
    /// `src_node` is given its adjacency entry is dropped and reloaded. The
    /// epoch is bumped exactly once per validated request, also when a write
    /// fails, because an earlier write in the same request may have
    /// committed.
    pub fn update_edge(&self, update: &EdgeUpdate) -> Result<UpdateAck> {
        validate_update(update)?;

        let written = self.write_fields(update);

        if let Some(node) = update.src_node {
            if let Err(err) = self.graph.refresh(node) {
                warn!(node, edge_id = update.edge_id, %err, "adjacency refill failed");
            }
        }

        let epoch = self.routes.bump_epoch();
        written?;

        info!(
            edge_id = update.edge_id,
            speed_kmph = ?update.speed_kmph,
            closed = ?update.closed,
            src_node = ?update.src_node,
            epoch,
            "edge updated"
        );
        Ok(UpdateAck { ok: true, epoch })
    }

    /// Adjacency cache counters.
    pub fn adjacency_stats(&self) -> CacheStats {
        self.adjacency().stats()
    }

    /// Counters of both caches and the current epoch.
    pub fn cache_stats(&self) -> CacheStatsReport {
        CacheStatsReport {
            adjacency: self.adjacency().stats(),
            routes: self.routes.stats(),
            route_entries: self.routes.len(),
            epoch: self.routes.epoch(),
        }
    }

    /// Empties both caches and zeroes their counters.
    pub fn clear_caches(&self) {
        self.adjacency().reset();
        self.routes.reset();
        info!(epoch = self.routes.epoch(), "caches cleared");
    }

    fn write_fields(&self, update: &EdgeUpdate) -> StoreResult<()> {
        let store = self.store();
        if let Some(speed) = update.speed_kmph {
            store.update_speed(update.edge_id, speed)?;
        }
        if let Some(closed) = update.closed {
            store.update_closed(update.edge_id, closed)?;
        }
        Ok(())
    }
}

fn validate_update(update: &EdgeUpdate) -> Result<()> {
    if update.speed_kmph == Some(0) {
        return Err(RouteError::invalid("speed_kmph must be positive"));
    }
    Ok(())
}
