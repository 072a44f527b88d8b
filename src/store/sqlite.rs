use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, CachedStatement, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, trace};

use super::EdgeStore;
use crate::error::{StoreError, StoreResult};
use crate::model::{Edge, EdgeId, EdgeRecord, NodeId};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS edges (
        edge_id INTEGER PRIMARY KEY,
        src_node INTEGER NOT NULL,
        dst_node INTEGER NOT NULL,
        distance_m INTEGER NOT NULL,
        speed_kmph INTEGER NOT NULL,
        closed INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_edges_src ON edges (src_node);
";

const SELECT_OUTGOING: &str = "SELECT edge_id, dst_node, distance_m, speed_kmph
     FROM edges
     WHERE src_node = ?1 AND closed = 0
     ORDER BY edge_id";

const SELECT_EDGE: &str = "SELECT src_node, dst_node, distance_m, speed_kmph, closed
     FROM edges
     WHERE edge_id = ?1";

const INSERT_EDGE: &str = "INSERT INTO edges (src_node, dst_node, distance_m, speed_kmph, closed)
     VALUES (?1, ?2, ?3, ?4, ?5)";

/// Tuning knobs for [`SqliteEdgeStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long a writer waits for a competing writer's lock before failing.
    pub busy_timeout: Duration,
    /// Maximum number of idle connections kept for reuse.
    pub pool_size: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5_000),
            pool_size: 8,
        }
    }
}

/// SQLite-backed edge store.
///
/// SQLite has no `SELECT ... FOR UPDATE`. Point updates instead run in a
/// `BEGIN IMMEDIATE` transaction, which takes the database writer lock before
/// the row is read; a second writer to the same edge waits (up to the busy
/// timeout) until the first commits or rolls back. Readers run against the
/// WAL snapshot and are never blocked by a writer.
///
/// The store is file-backed: every pooled connection opens the same path, so
/// `:memory:` databases are not supported.
pub struct SqliteEdgeStore {
    path: PathBuf,
    options: StoreOptions,
    idle: Mutex<Vec<Connection>>,
}

impl SqliteEdgeStore {
    /// Opens (creating if needed) the database at `path` and ensures the schema.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> StoreResult<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            options,
            idle: Mutex::new(Vec::new()),
        };
        let conn = store.connect()?;
        conn.execute_batch(SCHEMA)?;
        store.release(conn);
        debug!(path = %store.path.display(), "edge store opened");
        Ok(store)
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts `records` in one transaction and returns the assigned edge ids.
    pub fn insert_edges(&self, records: &[EdgeRecord]) -> StoreResult<Vec<EdgeId>> {
        self.bulk_insert(|inserter| {
            records
                .iter()
                .map(|record| inserter.insert(record))
                .collect::<StoreResult<Vec<_>>>()
        })
    }

    /// Runs `fill` inside one write transaction.
    ///
    /// Every row inserted through the [`EdgeInserter`] commits together when
    /// `fill` returns `Ok`; an `Err` from `fill` or from the commit rolls all
    /// of them back.
    pub fn bulk_insert<T, E, F>(&self, fill: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut EdgeInserter<'_>) -> Result<T, E>,
    {
        let pooled = self.idle.lock().pop();
        let mut conn = match pooled {
            Some(conn) => conn,
            None => self.connect()?,
        };
        let result = Self::fill_transaction(&mut conn, fill);
        self.release(conn);
        result
    }

    fn fill_transaction<T, E, F>(conn: &mut Connection, fill: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut EdgeInserter<'_>) -> Result<T, E>,
    {
        let tx = conn.transaction().map_err(StoreError::from)?;
        let output = {
            let stmt = tx.prepare_cached(INSERT_EDGE).map_err(StoreError::from)?;
            let mut inserter = EdgeInserter {
                conn: &tx,
                stmt,
                inserted: 0,
            };
            let output = fill(&mut inserter)?;
            debug!(rows = inserter.inserted, "edge batch inserted");
            output
        };
        tx.commit().map_err(StoreError::from)?;
        Ok(output)
    }

    /// Reads one edge row, closed or not.
    pub fn edge(&self, edge_id: EdgeId) -> StoreResult<Option<EdgeRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(SELECT_EDGE)?;
            let record = stmt
                .query_row(params![edge_id], |row| {
                    Ok(EdgeRecord {
                        source: row.get(0)?,
                        target: row.get(1)?,
                        distance_m: row.get(2)?,
                        speed_kmph: row.get(3)?,
                        closed: row.get(4)?,
                    })
                })
                .optional()?;
            Ok(record)
        })
    }

    /// Number of edge rows, closed ones included.
    pub fn edge_count(&self) -> StoreResult<u64> {
        self.with_connection(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
            u64::try_from(count).map_err(|_| StoreError::Corruption(format!("edge count {count}")))
        })
    }

    fn connect(&self) -> StoreResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.options.busy_timeout)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(conn)
    }

    fn release(&self, conn: Connection) {
        let mut idle = self.idle.lock();
        if idle.len() < self.options.pool_size {
            idle.push(conn);
        }
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let pooled = self.idle.lock().pop();
        let mut conn = match pooled {
            Some(conn) => conn,
            None => self.connect()?,
        };
        let result = f(&mut conn);
        // Transactions roll back on drop, so the connection is clean either way.
        self.release(conn);
        result
    }

    fn locked_update(
        &self,
        edge_id: EdgeId,
        select_sql: &str,
        update_sql: &str,
        value: i64,
    ) -> StoreResult<()> {
        self.with_connection(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let previous: Option<i64> = tx
                .query_row(select_sql, params![edge_id], |row| row.get(0))
                .optional()?;
            let Some(previous) = previous else {
                return Err(StoreError::EdgeNotFound(edge_id));
            };
            tx.execute(update_sql, params![value, edge_id])?;
            tx.commit()?;
            trace!(edge_id, previous, value, "edge row updated");
            Ok(())
        })
    }
}

/// Row writer handed out by [`SqliteEdgeStore::bulk_insert`].
pub struct EdgeInserter<'a> {
    conn: &'a Connection,
    stmt: CachedStatement<'a>,
    inserted: u64,
}

impl EdgeInserter<'_> {
    /// Inserts one row and returns its assigned id.
    pub fn insert(&mut self, record: &EdgeRecord) -> StoreResult<EdgeId> {
        self.stmt.execute(params![
            record.source,
            record.target,
            record.distance_m,
            record.speed_kmph,
            record.closed
        ])?;
        self.inserted += 1;
        Ok(self.conn.last_insert_rowid())
    }

    /// Rows inserted so far in this transaction.
    pub fn inserted(&self) -> u64 {
        self.inserted
    }
}

impl EdgeStore for SqliteEdgeStore {
    fn outgoing(&self, node: NodeId) -> StoreResult<Vec<Edge>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(SELECT_OUTGOING)?;
            let rows = stmt.query_map(params![node], |row| {
                Ok(Edge {
                    id: row.get(0)?,
                    source: node,
                    target: row.get(1)?,
                    distance_m: row.get(2)?,
                    speed_kmph: row.get(3)?,
                })
            })?;
            let edges = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(edges)
        })
    }

    fn update_speed(&self, edge_id: EdgeId, speed_kmph: u32) -> StoreResult<()> {
        self.locked_update(
            edge_id,
            "SELECT speed_kmph FROM edges WHERE edge_id = ?1",
            "UPDATE edges SET speed_kmph = ?1 WHERE edge_id = ?2",
            i64::from(speed_kmph),
        )
    }

    fn update_closed(&self, edge_id: EdgeId, closed: bool) -> StoreResult<()> {
        self.locked_update(
            edge_id,
            "SELECT closed FROM edges WHERE edge_id = ?1",
            "UPDATE edges SET closed = ?1 WHERE edge_id = ?2",
            i64::from(closed),
        )
    }
}
