use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use graphion::error::StoreResult;
use graphion::{
    AdjacencyCache, Edge, EdgeId, EdgeRecord, EdgeStore, EdgeUpdate, MemoryEdgeStore, NodeId,
    Result, RouteCache, RouteService,
};

const READERS: usize = 6;
const WRITERS: usize = 2;
const ROUNDS: usize = 200;
const LADDER: i64 = 20;

/// Two parallel lanes from node 0 to node `2 * LADDER`: a fast one through odd
/// ids and a slow one through ids above 1000. Returns the store and the
/// `(edge id, source node)` pairs of the fast lane.
fn ladder() -> (Arc<MemoryEdgeStore>, Vec<(i64, i64)>) {
    let mut records = Vec::new();
    let mut fast = Vec::new();
    for step in 0..LADDER {
        let from = if step == 0 { 0 } else { 2 * step - 1 };
        let to = if step == LADDER - 1 { LADDER * 2 } else { 2 * step + 1 };
        fast.push((records.len() as i64 + 1, from));
        records.push(EdgeRecord::new(from, to, 1, 50));
    }
    for step in 0..LADDER {
        let from = if step == 0 { 0 } else { 1000 + step };
        let to = if step == LADDER - 1 { LADDER * 2 } else { 1000 + step + 1 };
        records.push(EdgeRecord::new(from, to, 5, 50));
    }
    (Arc::new(MemoryEdgeStore::from_records(&records)), fast)
}

fn service(store: &Arc<MemoryEdgeStore>, capacity: usize) -> RouteService {
    RouteService::new(
        store.clone(),
        Arc::new(AdjacencyCache::new(capacity)),
        Arc::new(RouteCache::new()),
    )
}

#[test]
fn lookups_and_updates_interleave_and_settle() -> Result<()> {
    let (store, fast) = ladder();
    let shared = service(&store, 16);
    let destination = LADDER * 2;
    let barrier = Arc::new(Barrier::new(READERS + WRITERS));

    let mut handles = Vec::new();
    for _ in 0..READERS {
        let service = shared.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || -> Result<()> {
            barrier.wait();
            for _ in 0..ROUNDS {
                let response = service.route(0, destination)?;
                // Either lane is a valid answer while the graph is in flux.
                if !response.is_unreachable() {
                    assert_eq!(response.path.first(), Some(&0));
                    assert_eq!(response.path.last(), Some(&destination));
                }
            }
            Ok(())
        }));
    }
    for writer in 0..WRITERS {
        let service = shared.clone();
        let barrier = Arc::clone(&barrier);
        let fast = fast.clone();
        handles.push(thread::spawn(move || -> Result<()> {
            barrier.wait();
            for round in 0..ROUNDS {
                let (edge_id, source) = fast[(round + writer) % fast.len()];
                let update = EdgeUpdate::new(edge_id)
                    .closed(round % 3 == 0)
                    .source_node(source);
                service.update_edge(&update)?;
            }
            Ok(())
        }));
    }
    for handle in handles {
        handle.join().unwrap()?;
    }

    assert_eq!(shared.routes().epoch(), (WRITERS * ROUNDS) as u64);

    // Once writers are quiescent, reopening every fast-lane edge with a
    // refill leaves the caches consistent with the store.
    for &(edge_id, source) in &fast {
        shared.update_edge(&EdgeUpdate::new(edge_id).closed(false).source_node(source))?;
    }
    let settled = shared.route(0, destination)?;
    let oracle = service(&store, 16).route(0, destination)?;
    assert!(!settled.cache_hit);
    assert_eq!(settled.total, oracle.total);
    assert_eq!(settled.total, LADDER as u64);
    assert_eq!(settled.path, oracle.path);
    Ok(())
}

#[test]
fn adjacency_counters_stay_consistent_under_contention() {
    const THREADS: usize = 8;
    const KEYS_PER_THREAD: i64 = 64;
    const GETS_PER_KEY: usize = 3;

    let cache = Arc::new(AdjacencyCache::new(32));
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|thread_id| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let base = thread_id as i64 * KEYS_PER_THREAD;
                for node in base..base + KEYS_PER_THREAD {
                    let edges: Arc<[Edge]> = Arc::from(Vec::new());
                    cache.put(node, edges);
                    for _ in 0..GETS_PER_KEY {
                        cache.get(node);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = cache.stats();
    let total_keys = THREADS as u64 * KEYS_PER_THREAD as u64;
    assert_eq!(stats.puts, total_keys);
    assert_eq!(stats.gets, total_keys * GETS_PER_KEY as u64);
    assert!(stats.hits <= stats.gets);
    assert_eq!(cache.len(), 32);
    // Every key was new when inserted, so each one is either resident or was
    // evicted exactly once.
    assert_eq!(stats.evictions, stats.puts - cache.len() as u64);
}

/// Pauses the first read of `node` after it has loaded the edges, until the
/// test releases it.
struct GatedStore {
    inner: MemoryEdgeStore,
    node: NodeId,
    armed: AtomicBool,
    loaded: Barrier,
    release: Barrier,
}

impl EdgeStore for GatedStore {
    fn outgoing(&self, node: NodeId) -> StoreResult<Vec<Edge>> {
        let edges = self.inner.outgoing(node)?;
        if node == self.node && self.armed.swap(false, Ordering::SeqCst) {
            self.loaded.wait();
            self.release.wait();
        }
        Ok(edges)
    }

    fn update_speed(&self, edge_id: EdgeId, speed_kmph: u32) -> StoreResult<()> {
        self.inner.update_speed(edge_id, speed_kmph)
    }

    fn update_closed(&self, edge_id: EdgeId, closed: bool) -> StoreResult<()> {
        self.inner.update_closed(edge_id, closed)
    }
}

#[test]
fn reader_paused_across_an_update_cannot_restore_closed_edge() -> Result<()> {
    let store = Arc::new(GatedStore {
        inner: MemoryEdgeStore::from_records(&[
            EdgeRecord::new(1, 2, 1, 50),
            EdgeRecord::new(1, 3, 1, 50),
            EdgeRecord::new(3, 2, 1, 50),
        ]),
        node: 1,
        armed: AtomicBool::new(true),
        loaded: Barrier::new(2),
        release: Barrier::new(2),
    });
    let service = RouteService::new(
        store.clone(),
        Arc::new(AdjacencyCache::new(16)),
        Arc::new(RouteCache::new()),
    );

    let reader = {
        let service = service.clone();
        thread::spawn(move || service.route(1, 2))
    };

    // The reader holds node 1's edges, 1 -> 2 still open among them.
    store.loaded.wait();
    service.update_edge(&EdgeUpdate::new(1).closed(true).source_node(1))?;
    store.release.wait();
    reader.join().unwrap()?;

    let cached = service.adjacency().get(1).unwrap();
    let targets: Vec<_> = cached.iter().map(|edge| edge.target).collect();
    assert_eq!(targets, vec![3]);

    let response = service.route(1, 2)?;
    assert!(!response.cache_hit);
    assert_eq!(response.path, vec![1, 3, 2]);
    assert_eq!(response.total, 2);
    Ok(())
}
