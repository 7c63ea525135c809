//! # Tablecopy
//!
//! Bulk import/export engine behind the `COPY` command of a shell for
//! distributed tabular (CQL-style) databases.
//!
//! Tablecopy streams query results into delimited text, JSON lines, single
//! Parquet files or partitioned Parquet datasets, and loads those files back
//! into tables through a bounded pool of concurrent writers.
//!
//! ## Features
//!
//! - Delimited text with configurable delimiter, quote and NULL token
//! - Columnar export with row groups, pluggable compression and type metadata
//! - Partitioned datasets (`col=value/part-00000.parquet`) with LRU-bounded file handles
//! - Concurrent write-back with backpressure and error budgets
//!
//! ## Example
//!
//! ```rust,ignore
//! use tablecopy::io::services::CopyService;
//! use tablecopy::session::MemorySession;
//!
//! let session = MemorySession::new();
//! let service = CopyService::new(&session).with_schema_cache(&session);
//! let status = service.execute("COPY ks.users TO '/tmp/users.csv' WITH HEADER=true");
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
// Current duplicates: arrow/parquet transitive deps.
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod io;
pub mod models;
pub mod observability;
pub mod session;

// Re-exports for convenience
pub use config::CopyConfig;
pub use io::services::{CopyService, TransferSummary};
pub use models::{ColumnSpec, ColumnType, CopyOptions, RowRecord, RowValue, TransferSpec};
pub use session::{MemorySession, SchemaCache, Session};

/// Error type for tablecopy operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Unknown columns, malformed `COPY` commands, STDIN with a columnar format |
/// | `OperationFailed` | File or directory cannot be opened or created, writer failures |
/// | `Parse` | A source record cannot be turned into a row |
/// | `Execution` | A statement fails against the database session |
/// | `Config` | The configuration file cannot be read or parsed |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised before any I/O when:
    /// - A named column does not exist in the table or source schema
    /// - STDIN is used with a format that needs random access
    /// - The `COPY` command does not match the grammar
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - Filesystem I/O errors occur
    /// - Arrow or Parquet encoding fails
    /// - A query cannot be started against the session
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A source record could not be parsed.
    ///
    /// Recoverable inside the import pipeline, where it is counted against
    /// the parse error budget.
    #[error("record {record}: {message}")]
    Parse {
        /// 1-based index of the record in the source.
        record: u64,
        /// What was wrong with it.
        message: String,
    },

    /// A write statement failed against the database.
    ///
    /// Recoverable inside the import pipeline, where it is counted against
    /// the insert error budget.
    #[error("execution failed: {0}")]
    Execution(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for tablecopy operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::OperationFailed {
            operation: "test".to_string(),
            cause: "failed".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'test' failed: failed");

        let err = Error::Parse {
            record: 7,
            message: "expected 3 fields, found 2".to_string(),
        };
        assert_eq!(err.to_string(), "record 7: expected 3 fields, found 2");

        let err = Error::Execution("write timeout".to_string());
        assert_eq!(err.to_string(), "execution failed: write timeout");
    }
}
