//! Bulk transfer I/O.
//!
//! # Architecture
//!
//! - **Format adapters** implement [`RowReader`] and [`RowWriter`]
//! - **Value formatting** turns row values into file fields and statement
//!   literals; the literal parser goes the other way
//! - **Services** run the export and import pipelines behind [`CopyService`]
//!
//! # Supported Formats
//!
//! | Format | Import | Export | Notes |
//! |--------|--------|--------|-------|
//! | Delimited | ✓ | ✓ | Configurable delimiter, quote, escape and NULL token |
//! | JSON | ✓ | ✓ | Newline-delimited (NDJSON), arrays accepted on import |
//! | Columnar | ✓ | ✓ | Parquet files or partitioned `col=value/` datasets |
//!
//! # Example
//!
//! ```rust,ignore
//! use tablecopy::io::CopyService;
//!
//! let status = CopyService::new(&session)
//!     .with_schema_cache(&session)
//!     .execute("COPY ks.events TO '/data/events' WITH PARTITION='day'");
//! println!("{status}");
//! ```

pub mod budget;
pub mod command;
pub mod formats;
pub mod formatter;
pub mod literal;
pub mod services;
pub mod traits;

// Re-exports for convenience
pub use budget::{ErrorBudget, ErrorSample};
pub use command::{is_copy_command, parse_copy_command};
pub use formats::Format;
pub use formatter::ValueFormatter;
pub use services::{CopyService, ExportReport, ImportProgress, ImportReport, TransferSummary};
pub use traits::{ReadBatch, RowReader, RowWriter, WriteReport};
