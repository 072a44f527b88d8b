//! Graphion: shortest-path route server over a relational road network.
//!
//! Route lookups go through an epoch-keyed [`RouteCache`], then a Dijkstra
//! search that reads adjacency lists through a bounded LRU
//! [`AdjacencyCache`] in front of an [`EdgeStore`]. Edge updates write
//! through the store, refresh the affected adjacency entry and bump the
//! route cache epoch.

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod import;
pub mod logging;
pub mod model;
pub mod server;
pub mod service;
pub mod store;

pub use cache::{AdjacencyCache, CacheStats, RouteCache, RouteKey};
pub use error::{Result, RouteError, SearchError, StoreError};
pub use graph::{shortest_path, CostModel, PathResult};
pub use model::{Edge, EdgeId, EdgeRecord, EdgeUpdate, NodeId, RouteResponse, UpdateAck};
pub use service::{RouteService, ALGORITHM};
pub use store::{EdgeStore, MemoryEdgeStore, SqliteEdgeStore, StoreOptions};
