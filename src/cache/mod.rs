//! In-memory caches shielding the edge store from repeated reads.

mod adjacency;
mod route;
mod stats;

pub use adjacency::{AdjacencyCache, DEFAULT_ADJACENCY_CAPACITY};
pub use route::{RouteCache, RouteKey};
pub use stats::CacheStats;
