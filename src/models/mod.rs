//! Data models for tablecopy.
//!
//! Rows, column types, `COPY` options and the per-command transfer spec.

mod column;
pub mod options;
mod transfer;
mod value;

pub use column::{ColumnSpec, ColumnType, find_column};
pub use options::{Compression, CopyOptions, Threshold};
pub use transfer::{Direction, Target, TransferSpec, split_table_name};
pub use value::{RowRecord, RowValue};
