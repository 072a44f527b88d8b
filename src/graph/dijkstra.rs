use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use super::Neighbors;
use crate::error::SearchError;
use crate::model::{Cost, NodeId};

/// Outcome of a completed search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathResult {
    /// Nodes from source to destination; empty when unreachable.
    pub path: Vec<NodeId>,
    /// Sum of edge costs along `path`; zero when unreachable.
    pub total: Cost,
    /// Nodes expanded before the search stopped.
    pub explored: usize,
}

impl PathResult {
    /// Returns true when the destination was reached.
    pub fn is_found(&self) -> bool {
        !self.path.is_empty()
    }
}

/// Dijkstra search from `source` to `destination`.
///
/// The frontier is a binary heap with lazy deletion: superseded entries stay
/// in the heap and are re-expanded harmlessly when popped. The search stops
/// the first time the destination is popped. Among equal-cost paths the
/// winner depends on heap order and is unspecified.
///
/// `cost` maps `(distance_m, speed_kmph)` to the weight of one edge. An edge
/// weighing `Cost::MAX` is impassable and never relaxed. Path totals saturate
/// at `Cost::MAX`.
///
/// Any neighbor fetch failure aborts the search with the explored count so
/// far; no partial path is returned.
pub fn shortest_path<G, F>(
    graph: &G,
    source: NodeId,
    destination: NodeId,
    cost: F,
) -> Result<PathResult, SearchError>
where
    G: Neighbors + ?Sized,
    F: Fn(u32, u32) -> Cost,
{
    let mut dist: HashMap<NodeId, Cost> = HashMap::from([(source, 0)]);
    let mut prev: HashMap<NodeId, NodeId> = HashMap::new();
    let mut frontier = BinaryHeap::new();
    frontier.push(Reverse((0, source)));
    let mut explored = 0usize;
    let mut reached = false;

    while let Some(Reverse((_, node))) = frontier.pop() {
        if node == destination {
            reached = true;
            break;
        }
        explored += 1;

        let edges = graph
            .neighbors(node)
            .map_err(|err| SearchError {
                explored,
                source: err,
            })?;
        let base = dist.get(&node).copied().unwrap_or(0);

        for edge in edges.iter() {
            let weight = cost(edge.distance_m, edge.speed_kmph);
            if weight == Cost::MAX {
                continue;
            }
            let candidate = base.saturating_add(weight);
            let improves = dist
                .get(&edge.target)
                .map_or(true, |&known| candidate < known);
            if improves {
                dist.insert(edge.target, candidate);
                prev.insert(edge.target, node);
                frontier.push(Reverse((candidate, edge.target)));
            }
        }
    }

    if !reached {
        return Ok(PathResult {
            explored,
            ..PathResult::default()
        });
    }

    let mut path = vec![destination];
    let mut cursor = destination;
    while cursor != source {
        match prev.get(&cursor) {
            Some(&parent) => {
                path.push(parent);
                cursor = parent;
            }
            None => break,
        }
    }
    path.reverse();

    Ok(PathResult {
        path,
        total: dist.get(&destination).copied().unwrap_or(0),
        explored,
    })
}
