//! Road network value types shared by the store, the caches and the HTTP layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque node identifier. Nodes exist only as edge endpoints and cache keys.
pub type NodeId = i64;
/// Primary key of a directed edge in the store.
pub type EdgeId = i64;
/// Scalar path cost produced by a cost function.
pub type Cost = u64;

/// Immutable snapshot of a node's open outgoing edges.
///
/// Snapshots are replaced wholesale on refresh and never mutated in place,
/// so a cache hit can be handed out without copying.
pub type AdjacencyList = Arc<[Edge]>;

/// An open directed edge as seen by the search.
///
/// Closed edges are filtered by the store and never become `Edge` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Store id of the edge.
    pub id: EdgeId,
    /// Tail node.
    pub source: NodeId,
    /// Head node.
    pub target: NodeId,
    /// Segment length in meters.
    pub distance_m: u32,
    /// Posted speed in km/h.
    pub speed_kmph: u32,
}

/// A row to be written into the store by seeding or import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Tail node.
    #[serde(rename = "src_node")]
    pub source: NodeId,
    /// Head node.
    #[serde(rename = "dst_node")]
    pub target: NodeId,
    /// Segment length in meters.
    pub distance_m: u32,
    /// Posted speed in km/h.
    pub speed_kmph: u32,
    /// Whether the segment is closed to traffic.
    #[serde(default)]
    pub closed: bool,
}

impl EdgeRecord {
    /// Creates an open edge record.
    pub fn new(source: NodeId, target: NodeId, distance_m: u32, speed_kmph: u32) -> Self {
        Self {
            source,
            target,
            distance_m,
            speed_kmph,
            closed: false,
        }
    }

    /// Marks the record as closed.
    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }
}

/// Answer to a route query.
///
/// An empty `path` with a zero `total` means the destination is unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteResponse {
    /// Node ids from source to destination.
    pub path: Vec<NodeId>,
    /// Sum of edge costs along `path`.
    pub total: Cost,
    /// Number of nodes expanded by the search.
    pub explored_nodes: usize,
    /// Whether the path came from the route cache.
    pub cache_hit: bool,
}

impl RouteResponse {
    /// Returns true when no path was found.
    pub fn is_unreachable(&self) -> bool {
        self.path.is_empty()
    }
}

/// Point update to a single edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeUpdate {
    /// Edge to modify.
    pub edge_id: EdgeId,
    /// New closure flag, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed: Option<bool>,
    /// New speed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_kmph: Option<u32>,
    /// Tail node of the edge; when present its adjacency entry is refreshed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_node: Option<NodeId>,
}

impl EdgeUpdate {
    /// Starts an update for `edge_id` with no fields set.
    pub fn new(edge_id: EdgeId) -> Self {
        Self {
            edge_id,
            ..Self::default()
        }
    }

    /// Sets the new speed.
    pub fn speed(mut self, speed_kmph: u32) -> Self {
        self.speed_kmph = Some(speed_kmph);
        self
    }

    /// Sets the new closure flag.
    pub fn closed(mut self, closed: bool) -> Self {
        self.closed = Some(closed);
        self
    }

    /// Names the edge's tail node so its adjacency entry gets refreshed.
    pub fn source_node(mut self, node: NodeId) -> Self {
        self.src_node = Some(node);
        self
    }
}

/// Acknowledgement returned by an edge update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAck {
    /// Always true on success.
    pub ok: bool,
    /// Route cache epoch after the update's bump.
    pub epoch: u64,
}
