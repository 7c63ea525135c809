//! Database session collaborators.
//!
//! The transfer engine talks to the database only through two narrow traits:
//!
//! - [`Session`] runs a query (with paging handled by the implementation) or
//!   a write statement
//! - [`SchemaCache`] supplies the ordered column list of a table
//!
//! [`MemorySession`] implements both over in-memory tables. It backs the
//! command-line tool when no cluster driver is plugged in, and the tests.

mod memory;

pub use memory::MemorySession;

use crate::Result;
use crate::models::{ColumnSpec, RowRecord};

/// Lazily produced rows of a query.
pub type RowIterator = Box<dyn Iterator<Item = Result<RowRecord>> + Send>;

/// Result of a query: column metadata and a row stream.
pub struct QueryResult {
    /// Result columns in select order.
    pub columns: Vec<ColumnSpec>,
    /// Rows; an `Err` item ends the stream with a mid-stream failure.
    pub rows: RowIterator,
}

impl std::fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// A connection to the database.
///
/// Implementations must be shareable across the import worker threads.
pub trait Session: Send + Sync {
    /// Runs a query, fetching `page_size` rows per round trip.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Execution`] if the query is rejected.
    fn execute_query(&self, statement: &str, page_size: usize) -> Result<QueryResult>;

    /// Runs a write statement.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Execution`] if the statement fails.
    fn execute_statement(&self, statement: &str) -> Result<()>;

    /// Keyspace that unqualified table names refer to.
    fn current_keyspace(&self) -> Option<String> {
        None
    }
}

/// Source of table column lists.
pub trait SchemaCache: Send + Sync {
    /// Ordered columns of `table`, or `None` when the table is unknown.
    fn table_columns(&self, keyspace: Option<&str>, table: &str) -> Option<Vec<ColumnSpec>>;
}
