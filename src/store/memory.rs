use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::EdgeStore;
use crate::error::{StoreError, StoreResult};
use crate::model::{Edge, EdgeId, EdgeRecord, NodeId};

#[derive(Default)]
struct MemoryGraph {
    edges: BTreeMap<EdgeId, EdgeRecord>,
    by_source: HashMap<NodeId, Vec<EdgeId>>,
    next_id: EdgeId,
}

/// In-process [`EdgeStore`] with the same contract as the SQLite backend.
///
/// Writes hold the table's write lock across the read-check-write sequence,
/// which serializes writers the way a row lock would. The store also counts
/// `outgoing` calls so callers can observe how much read load reaches it.
#[derive(Default)]
pub struct MemoryEdgeStore {
    graph: RwLock<MemoryGraph>,
    outgoing_reads: AtomicU64,
}

impl MemoryEdgeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store holding `records`, with ids assigned from 1 in order.
    pub fn from_records(records: &[EdgeRecord]) -> Self {
        let store = Self::new();
        store.insert_edges(records);
        store
    }

    /// Inserts `records` and returns the assigned edge ids.
    pub fn insert_edges(&self, records: &[EdgeRecord]) -> Vec<EdgeId> {
        let mut graph = self.graph.write();
        records
            .iter()
            .map(|record| {
                graph.next_id += 1;
                let id = graph.next_id;
                graph.edges.insert(id, *record);
                graph.by_source.entry(record.source).or_default().push(id);
                id
            })
            .collect()
    }

    /// Reads one edge row, closed or not.
    pub fn edge(&self, edge_id: EdgeId) -> Option<EdgeRecord> {
        self.graph.read().edges.get(&edge_id).copied()
    }

    /// Number of `outgoing` calls served so far.
    pub fn outgoing_reads(&self) -> u64 {
        self.outgoing_reads.load(Ordering::Relaxed)
    }

    fn modify(&self, edge_id: EdgeId, apply: impl FnOnce(&mut EdgeRecord)) -> StoreResult<()> {
        let mut graph = self.graph.write();
        let record = graph
            .edges
            .get_mut(&edge_id)
            .ok_or(StoreError::EdgeNotFound(edge_id))?;
        apply(record);
        Ok(())
    }
}

impl EdgeStore for MemoryEdgeStore {
    fn outgoing(&self, node: NodeId) -> StoreResult<Vec<Edge>> {
        self.outgoing_reads.fetch_add(1, Ordering::Relaxed);
        let graph = self.graph.read();
        let Some(ids) = graph.by_source.get(&node) else {
            return Ok(Vec::new());
        };
        let edges = ids
            .iter()
            .filter_map(|id| graph.edges.get(id).map(|record| (*id, record)))
            .filter(|(_, record)| !record.closed)
            .map(|(id, record)| Edge {
                id,
                source: record.source,
                target: record.target,
                distance_m: record.distance_m,
                speed_kmph: record.speed_kmph,
            })
            .collect();
        Ok(edges)
    }

    fn update_speed(&self, edge_id: EdgeId, speed_kmph: u32) -> StoreResult<()> {
        self.modify(edge_id, |record| record.speed_kmph = speed_kmph)
    }

    fn update_closed(&self, edge_id: EdgeId, closed: bool) -> StoreResult<()> {
        self.modify(edge_id, |record| record.closed = closed)
    }
}
