//! Error types for the store, search and request layers.

use std::io;

use thiserror::Error;

use crate::model::EdgeId;

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result alias for route and update requests.
pub type Result<T> = std::result::Result<T, RouteError>;

/// Failure of the backing edge store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Query, connection or transaction failure reported by SQLite.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The edge named by an update does not exist.
    #[error("edge {0} not found")]
    EdgeNotFound(EdgeId),
    /// I/O error while preparing the store.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A stored value could not be represented.
    #[error("corrupt edge row: {0}")]
    Corruption(String),
}

/// Neighbor fetch failure that aborted a search.
///
/// Carries the number of nodes explored before the failure; no partial path
/// survives an abort.
#[derive(Debug, Error)]
#[error("search aborted after exploring {explored} nodes: {source}")]
pub struct SearchError {
    /// Nodes expanded before the failing fetch.
    pub explored: usize,
    /// Underlying store failure.
    #[source]
    pub source: StoreError,
}

/// Failure of a route lookup or edge update request.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Store failure outside a search.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Store failure during a search.
    #[error(transparent)]
    Search(#[from] SearchError),
    /// Malformed request rejected before touching any cache or store.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl RouteError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        RouteError::InvalidInput(message.into())
    }

    /// Returns the underlying store error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            RouteError::Store(err) => Some(err),
            RouteError::Search(err) => Some(&err.source),
            RouteError::InvalidInput(_) => None,
        }
    }
}
