//! Transfer pipelines.
//!
//! [`CopyService`] turns a `COPY` command into an export or import run:
//!
//! - [`export::ExportPipeline`] streams a query result into a writer
//! - [`import::ImportPipeline`] feeds a reader through the [`pool::WorkerPool`]

pub mod copy;
pub mod export;
pub mod import;
pub mod pool;

pub use copy::{CopyService, TransferSummary};
pub use export::{ExportPipeline, ExportReport};
pub use import::{ImportPipeline, ImportProgress, ImportReport, ProgressCallback};
pub use pool::{Batch, BatchQueue, Statement, WorkerPool};
