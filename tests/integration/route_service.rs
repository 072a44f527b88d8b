use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use graphion::error::StoreResult;
use graphion::{
    AdjacencyCache, Edge, EdgeId, EdgeRecord, EdgeStore, EdgeUpdate, NodeId, Result, RouteCache,
    RouteKey, RouteService, SqliteEdgeStore, StoreOptions, ALGORITHM,
};
use tempfile::TempDir;

/// Counts reads that reach the SQLite store.
struct CountingStore {
    inner: SqliteEdgeStore,
    reads: AtomicU64,
}

impl CountingStore {
    fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

impl EdgeStore for CountingStore {
    fn outgoing(&self, node: NodeId) -> StoreResult<Vec<Edge>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.outgoing(node)
    }

    fn update_speed(&self, edge_id: EdgeId, speed_kmph: u32) -> StoreResult<()> {
        self.inner.update_speed(edge_id, speed_kmph)
    }

    fn update_closed(&self, edge_id: EdgeId, closed: bool) -> StoreResult<()> {
        self.inner.update_closed(edge_id, closed)
    }
}

struct Fixture {
    _dir: TempDir,
    store: Arc<CountingStore>,
    service: RouteService,
    ids: Vec<EdgeId>,
}

/// 1 -> 2 -> 3 -> 4 costs 3, the shortcut 1 -> 4 costs 10, 2 -> 4 is closed.
fn setup() -> Fixture {
    let dir = TempDir::new().unwrap();
    let sqlite =
        SqliteEdgeStore::open(dir.path().join("roads.db"), StoreOptions::default()).unwrap();
    let ids = sqlite
        .insert_edges(&[
            EdgeRecord::new(1, 2, 1, 50),
            EdgeRecord::new(2, 3, 1, 50),
            EdgeRecord::new(3, 4, 1, 50),
            EdgeRecord::new(1, 4, 10, 90),
            EdgeRecord::new(2, 4, 1, 90).closed(),
        ])
        .unwrap();
    let store = Arc::new(CountingStore {
        inner: sqlite,
        reads: AtomicU64::new(0),
    });
    let service = RouteService::new(
        store.clone(),
        Arc::new(AdjacencyCache::new(64)),
        Arc::new(RouteCache::new()),
    );
    Fixture {
        _dir: dir,
        store,
        service,
        ids,
    }
}

#[test]
fn repeat_lookup_is_a_cache_hit_without_exploration() -> Result<()> {
    let fx = setup();

    let miss = fx.service.route(1, 2)?;
    assert!(!miss.cache_hit);
    assert_eq!(miss.path, vec![1, 2]);
    assert_eq!(miss.total, 1);
    let reads = fx.store.reads();

    let hit = fx.service.route(1, 2)?;
    assert!(hit.cache_hit);
    assert_eq!(hit.path, miss.path);
    assert_eq!(hit.explored_nodes, 0);
    assert_eq!(fx.store.reads(), reads);
    Ok(())
}

#[test]
fn closed_edge_never_influences_search() -> Result<()> {
    let fx = setup();
    let response = fx.service.route(1, 4)?;
    // The closed 2 -> 4 edge would make [1, 2, 4] the cheapest path.
    assert_eq!(response.path, vec![1, 2, 3, 4]);
    assert_eq!(response.total, 3);
    Ok(())
}

#[test]
fn adjacency_cache_spares_the_store_across_routes() -> Result<()> {
    let fx = setup();
    fx.service.route(1, 4)?;
    let reads = fx.store.reads();

    // Different key, same neighborhood: the search is served from cache.
    let response = fx.service.route(1, 3)?;
    assert!(!response.cache_hit);
    assert_eq!(fx.store.reads(), reads);
    assert!(fx.service.adjacency_stats().hits > 0);
    Ok(())
}

#[test]
fn update_forces_refill_and_orphans_cached_routes() -> Result<()> {
    let fx = setup();
    let before = fx.service.route(1, 4)?;
    let old_key = RouteKey {
        source: 1,
        destination: 4,
        algorithm: ALGORITHM,
        epoch: fx.service.routes().epoch(),
    };
    assert!(fx.service.routes().get(&old_key).is_some());
    let reads = fx.store.reads();

    // Close 1 -> 2; the only way left is the 1 -> 4 shortcut.
    let ack = fx
        .service
        .update_edge(&EdgeUpdate::new(fx.ids[0]).closed(true).source_node(1))?;
    assert!(ack.ok);
    assert_eq!(ack.epoch, old_key.epoch + 1);

    // The refill read node 1 straight from the store and re-cached it.
    assert_eq!(fx.store.reads(), reads + 1);
    let refreshed = fx.service.adjacency().get(1).unwrap();
    assert_eq!(refreshed.len(), 1);
    assert_eq!(refreshed[0].target, 4);

    let after = fx.service.route(1, 4)?;
    assert!(!after.cache_hit);
    assert_ne!(after.path, before.path);
    assert_eq!(after.path, vec![1, 4]);
    assert_eq!(after.total, 10);
    Ok(())
}

#[test]
fn update_without_source_node_leaves_adjacency_stale_until_evicted() -> Result<()> {
    let fx = setup();
    fx.service.route(1, 2)?;

    fx.service
        .update_edge(&EdgeUpdate::new(fx.ids[0]).closed(true))?;

    // The epoch moved, so the route is recomputed, but the cached adjacency
    // entry for node 1 still lists the closed edge.
    let response = fx.service.route(1, 2)?;
    assert!(!response.cache_hit);
    assert_eq!(response.path, vec![1, 2]);

    fx.service.clear_caches();
    assert!(fx.service.route(1, 2)?.is_unreachable());
    Ok(())
}

#[test]
fn speed_update_is_persisted() -> Result<()> {
    let fx = setup();
    fx.service
        .update_edge(&EdgeUpdate::new(fx.ids[3]).speed(120).source_node(1))?;
    let row = fx.store.inner.edge(fx.ids[3]).unwrap().unwrap();
    assert_eq!(row.speed_kmph, 120);
    let cached = fx.service.adjacency().get(1).unwrap();
    assert!(cached.iter().any(|edge| edge.id == fx.ids[3] && edge.speed_kmph == 120));
    Ok(())
}

#[test]
fn unreachable_destination_reports_exploration() -> Result<()> {
    let fx = setup();
    let response = fx.service.route(4, 1)?;
    assert!(response.is_unreachable());
    assert_eq!(response.total, 0);
    assert_eq!(response.explored_nodes, 1);
    assert!(fx.service.routes().is_empty());
    Ok(())
}
