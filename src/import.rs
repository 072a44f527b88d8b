//! CSV edge import for seeding a road network.
//!
//! Expected header: `src_node,dst_node,distance_m,speed_kmph[,closed]`.
//! `closed` accepts `0`/`1`/`true`/`false` and defaults to open.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::error::StoreError;
use crate::model::{EdgeRecord, NodeId};
use crate::store::SqliteEdgeStore;

/// Error type for edge imports.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Opening the input failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// CSV parsing failed.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Writing to the store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A row carried an unusable value.
    #[error("line {line}: {message}")]
    InvalidRow {
        /// 1-based line number in the input.
        line: u64,
        /// What was wrong with the row.
        message: String,
    },
}

/// Summary of a completed import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Rows written.
    pub edges_imported: u64,
    /// Rows written with the closed flag set.
    pub closed_edges: u64,
}

#[derive(Debug, Deserialize)]
struct EdgeRow {
    src_node: NodeId,
    dst_node: NodeId,
    distance_m: u32,
    speed_kmph: u32,
    #[serde(default)]
    closed: Option<String>,
}

/// Imports the CSV file at `path` into `store`.
pub fn import_edges_csv(
    path: impl AsRef<Path>,
    store: &SqliteEdgeStore,
) -> Result<ImportSummary, ImportError> {
    let file = File::open(path.as_ref())?;
    let summary = import_edges(file, store)?;
    info!(
        path = %path.as_ref().display(),
        edges = summary.edges_imported,
        closed = summary.closed_edges,
        "edge import finished"
    );
    Ok(summary)
}

/// Imports CSV rows from `input` into `store`.
///
/// The whole input is written in one transaction: a malformed row or a store
/// failure anywhere in the file leaves the store untouched.
pub fn import_edges<R: Read>(
    input: R,
    store: &SqliteEdgeStore,
) -> Result<ImportSummary, ImportError> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);
    let headers = reader.headers()?.clone();

    store.bulk_insert(|inserter| -> Result<ImportSummary, ImportError> {
        let mut summary = ImportSummary::default();
        let mut raw = StringRecord::new();
        while reader.read_record(&mut raw)? {
            let line = raw.position().map_or(0, |pos| pos.line());
            let row: EdgeRow = raw.deserialize(Some(&headers))?;
            let record = convert_row(row, line)?;
            inserter.insert(&record)?;
            if record.closed {
                summary.closed_edges += 1;
            }
        }
        summary.edges_imported = inserter.inserted();
        Ok(summary)
    })
}

fn convert_row(row: EdgeRow, line: u64) -> Result<EdgeRecord, ImportError> {
    let closed = match row.closed.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("") | Some("0") | Some("false") => false,
        Some("1") | Some("true") => true,
        Some(other) => {
            return Err(ImportError::InvalidRow {
                line,
                message: format!("closed must be 0/1/true/false, got '{other}'"),
            })
        }
    };
    if row.speed_kmph == 0 {
        return Err(ImportError::InvalidRow {
            line,
            message: "speed_kmph must be positive".into(),
        });
    }
    Ok(EdgeRecord {
        source: row.src_node,
        target: row.dst_node,
        distance_m: row.distance_m,
        speed_kmph: row.speed_kmph,
        closed,
    })
}
