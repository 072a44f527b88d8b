//! Edge storage backends.
//!
//! The route server only needs two things from its relational backend: the
//! open outgoing edges of a node, and a locked point update of one edge.
//! Anything implementing [`EdgeStore`] can stand in for SQLite.

mod memory;
mod sqlite;

pub use memory::MemoryEdgeStore;
pub use sqlite::{EdgeInserter, SqliteEdgeStore, StoreOptions};

use crate::error::StoreResult;
use crate::model::{Edge, EdgeId, NodeId};

/// Query contract consumed by the adjacency layer and the update path.
pub trait EdgeStore: Send + Sync {
    /// Returns every non-closed outgoing edge of `node`.
    ///
    /// A node with no edges yields an empty list. On error no partial result
    /// is returned.
    fn outgoing(&self, node: NodeId) -> StoreResult<Vec<Edge>>;

    /// Sets the speed of one edge under an exclusive lock on that edge.
    ///
    /// Either the write commits or nothing changes.
    fn update_speed(&self, edge_id: EdgeId, speed_kmph: u32) -> StoreResult<()>;

    /// Sets the closure flag of one edge under an exclusive lock on that edge.
    ///
    /// Either the write commits or nothing changes.
    fn update_closed(&self, edge_id: EdgeId, closed: bool) -> StoreResult<()>;
}
