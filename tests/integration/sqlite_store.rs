use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use graphion::{EdgeRecord, EdgeStore, SqliteEdgeStore, StoreError, StoreOptions};
use rusqlite::{Connection, TransactionBehavior};
use tempfile::TempDir;

const NUM_THREADS: usize = 8;
const UPDATES_PER_THREAD: usize = 25;

fn open(dir: &TempDir, busy_timeout: Duration) -> SqliteEdgeStore {
    SqliteEdgeStore::open(
        dir.path().join("roads.db"),
        StoreOptions {
            busy_timeout,
            pool_size: 4,
        },
    )
    .unwrap()
}

#[test]
fn concurrent_writers_to_one_edge_all_commit() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open(&dir, Duration::from_secs(10)));
    let ids = store.insert_edges(&[EdgeRecord::new(1, 2, 100, 50)]).unwrap();
    let edge = ids[0];

    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|thread_id| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || -> Result<(), StoreError> {
                barrier.wait();
                for i in 0..UPDATES_PER_THREAD {
                    let speed = (thread_id * UPDATES_PER_THREAD + i + 1) as u32;
                    store.update_speed(edge, speed)?;
                    store.update_closed(edge, i % 2 == 0)?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let row = store.edge(edge).unwrap().unwrap();
    let max_speed = (NUM_THREADS * UPDATES_PER_THREAD) as u32;
    assert!((1..=max_speed).contains(&row.speed_kmph));
    assert_eq!(store.edge_count().unwrap(), 1);
}

#[test]
fn writer_waits_for_lock_holder_to_commit() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open(&dir, Duration::from_secs(5)));
    let ids = store.insert_edges(&[EdgeRecord::new(1, 2, 100, 50)]).unwrap();
    let edge = ids[0];
    let path = store.path().to_path_buf();

    let locked = Arc::new(Barrier::new(2));
    let holder = {
        let locked = Arc::clone(&locked);
        thread::spawn(move || {
            let mut conn = Connection::open(path).unwrap();
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .unwrap();
            tx.execute("UPDATE edges SET speed_kmph = 10 WHERE edge_id = ?1", [edge])
                .unwrap();
            locked.wait();
            thread::sleep(Duration::from_millis(200));
            tx.commit().unwrap();
        })
    };

    locked.wait();
    // Readers are not blocked by the held write lock.
    assert_eq!(store.outgoing(1).unwrap()[0].speed_kmph, 50);

    let started = Instant::now();
    store.update_speed(edge, 70).unwrap();
    assert!(started.elapsed() >= Duration::from_millis(100));
    holder.join().unwrap();

    // The blocked writer ran after the holder committed, so its value wins.
    assert_eq!(store.edge(edge).unwrap().unwrap().speed_kmph, 70);
}

#[test]
fn writer_gives_up_after_busy_timeout_without_writing() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, Duration::from_millis(50));
    let ids = store.insert_edges(&[EdgeRecord::new(1, 2, 100, 50)]).unwrap();

    let mut conn = Connection::open(store.path()).unwrap();
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .unwrap();

    let err = store.update_closed(ids[0], true).unwrap_err();
    assert!(matches!(err, StoreError::Sqlite(_)));

    tx.rollback().unwrap();
    assert!(!store.edge(ids[0]).unwrap().unwrap().closed);
    store.update_closed(ids[0], true).unwrap();
    assert!(store.outgoing(1).unwrap().is_empty());
}

#[test]
fn store_reopens_existing_database() {
    let dir = TempDir::new().unwrap();
    {
        let store = open(&dir, Duration::from_secs(1));
        store
            .insert_edges(&[EdgeRecord::new(5, 6, 10, 30), EdgeRecord::new(5, 7, 20, 30)])
            .unwrap();
    }
    let store = open(&dir, Duration::from_secs(1));
    let targets: Vec<_> = store.outgoing(5).unwrap().iter().map(|e| e.target).collect();
    assert_eq!(targets, vec![6, 7]);
}
