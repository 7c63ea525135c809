//! Import pipeline.
//!
//! Drives a [`RowReader`] into the database:
//!
//! 1. Skip `SKIPROWS` raw records without parsing them
//! 2. Read batches of at most `CHUNKSIZE` records, never past `MAXROWS`
//! 3. Turn each row into an `INSERT` statement
//! 4. Group statements into batches of `MAXBATCHSIZE` for the worker pool
//! 5. Wait for every dispatched batch, then report
//!
//! Parse failures are counted on the producer thread, insert failures on
//! the workers. Either budget tripping stops production. Every batch the
//! queue already accepted still runs to completion.

use super::pool::{Batch, BatchQueue, Statement, WorkerPool};
use crate::io::budget::{BudgetTrip, ErrorBudget, ErrorSample, Verdict};
use crate::io::formatter::{ValueFormatter, quote_identifier};
use crate::io::traits::{DatasetInfo, ReadBatch, RowReader};
use crate::models::{ColumnSpec, CopyOptions, RowRecord};
use crate::session::Session;
use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Progress callback for import operations.
pub type ProgressCallback = Box<dyn Fn(&ImportProgress) + Send>;

/// Progress information during import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportProgress {
    /// Records read after skipping.
    pub read: u64,
    /// Rows written successfully so far.
    pub imported: u64,
    /// Records skipped.
    pub skipped: u64,
    /// Parse failures so far.
    pub parse_errors: u64,
    /// Insert failures so far.
    pub insert_errors: u64,
}

/// Outcome of an import.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Rows written successfully.
    pub rows_succeeded: u64,
    /// Skipped records plus parse failures plus attempted writes.
    pub rows_processed: u64,
    /// Records discarded by `SKIPROWS`.
    pub skipped_rows: u64,
    /// Records that could not be parsed.
    pub parse_errors: u64,
    /// Writes that failed.
    pub insert_errors: u64,
    /// Write statements sent to the session.
    pub attempted_writes: u64,
    /// First error messages.
    pub samples: Vec<ErrorSample>,
    /// Set when an error budget aborted the run.
    pub aborted: Option<BudgetTrip>,
    /// Set when the source was a partitioned dataset.
    pub dataset: Option<DatasetInfo>,
    /// Wall clock time of the run.
    pub elapsed: Duration,
}

/// Counters shared by the producer and the workers.
#[derive(Debug, Default)]
struct WriteCounters {
    attempted: AtomicU64,
    succeeded: AtomicU64,
}

/// Loads rows from a reader into one table.
pub struct ImportPipeline<'a> {
    session: &'a dyn Session,
    table: String,
    columns: Vec<ColumnSpec>,
    options: &'a CopyOptions,
    progress: Option<&'a ProgressCallback>,
}

impl<'a> ImportPipeline<'a> {
    /// Creates a pipeline writing `columns` of `table` (as it should appear
    /// in statements).
    #[must_use]
    pub fn new(
        session: &'a dyn Session,
        table: impl Into<String>,
        columns: Vec<ColumnSpec>,
        options: &'a CopyOptions,
    ) -> Self {
        Self {
            session,
            table: table.into(),
            columns,
            options,
            progress: None,
        }
    }

    /// Reports progress every `CHUNKSIZE` records.
    #[must_use]
    pub const fn with_progress(mut self, progress: Option<&'a ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Runs the import to completion or abort.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails with an I/O error. Parse and
    /// insert failures are reported in the [`ImportReport`] instead.
    pub fn run(&self, mut reader: Box<dyn RowReader>) -> Result<ImportReport> {
        let started = Instant::now();
        let budget = ErrorBudget::new(
            self.options.max_parse_errors(),
            self.options.max_insert_errors(),
        );
        let counters = WriteCounters::default();
        let pool = WorkerPool::new(self.options.max_requests());

        let skipped = reader.skip(self.options.skip_rows())?;
        if skipped > 0 {
            tracing::debug!(skipped, "Skipped leading records");
        }

        tracing::info!(
            table = %self.table,
            workers = pool.workers(),
            batch_size = self.options.max_batch_size(),
            "Starting import"
        );

        let session = self.session;
        let produced = pool.run(
            |queue| self.produce(reader.as_mut(), queue, skipped, &budget, &counters),
            |batch| execute_batch(session, batch, &budget, &counters),
        );
        let dataset = reader.dataset();
        let closed = reader.close();
        produced?;
        closed?;

        let attempted = counters.attempted.load(Ordering::SeqCst);
        let succeeded = counters.succeeded.load(Ordering::SeqCst);
        let report = ImportReport {
            rows_succeeded: succeeded,
            rows_processed: skipped + budget.parse_errors() + attempted,
            skipped_rows: skipped,
            parse_errors: budget.parse_errors(),
            insert_errors: budget.insert_errors(),
            attempted_writes: attempted,
            samples: budget.samples(),
            aborted: budget.trip(),
            dataset,
            elapsed: started.elapsed(),
        };
        metrics::counter!("tablecopy_rows_imported_total").increment(succeeded);
        tracing::info!(
            table = %self.table,
            imported = report.rows_succeeded,
            parse_errors = report.parse_errors,
            insert_errors = report.insert_errors,
            aborted = report.aborted.is_some(),
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "Import finished"
        );
        Ok(report)
    }

    /// Reads, formats and enqueues. Returns the number of records read.
    fn produce(
        &self,
        reader: &mut dyn RowReader,
        queue: &BatchQueue,
        skipped: u64,
        budget: &ErrorBudget,
        counters: &WriteCounters,
    ) -> Result<u64> {
        let chunk = self.options.chunk_size() as u64;
        let max_rows = self.options.max_rows();
        let formatter = ValueFormatter::for_statement();
        let prefix = insert_prefix(&self.table, &self.columns);
        let mut batch = Batch::with_capacity(self.options.max_batch_size());
        let mut read: u64 = 0;

        'produce: loop {
            let want = max_rows.map_or(chunk, |max| chunk.min(max.saturating_sub(read)));
            if want == 0 {
                tracing::debug!(read, "Row limit reached");
                break;
            }
            let ReadBatch {
                records,
                end_of_data,
            } = reader.read_batch(usize::try_from(want).unwrap_or(usize::MAX))?;

            for record in records {
                read += 1;
                match record {
                    Ok(row) => {
                        batch.push(Statement {
                            record: skipped + read,
                            text: build_insert(&prefix, &self.columns, &row, &formatter),
                        });
                    },
                    Err(failure) => {
                        tracing::debug!(error = %Error::from(failure.clone()), "Malformed record");
                        if budget.record_parse(failure.record, failure.message) == Verdict::Abort {
                            break 'produce;
                        }
                    },
                }
                if batch.is_full() {
                    if budget.is_tripped() {
                        break 'produce;
                    }
                    if !queue.submit(batch.take()) {
                        return Err(Error::Execution("import workers stopped".to_string()));
                    }
                }
                if read % chunk == 0 {
                    self.report_progress(read, skipped, budget, counters);
                }
            }
            if end_of_data {
                break;
            }
        }

        if !budget.is_tripped() && !queue.submit(batch.take()) {
            return Err(Error::Execution("import workers stopped".to_string()));
        }
        Ok(read)
    }

    fn report_progress(
        &self,
        read: u64,
        skipped: u64,
        budget: &ErrorBudget,
        counters: &WriteCounters,
    ) {
        let Some(callback) = self.progress else {
            return;
        };
        callback(&ImportProgress {
            read,
            imported: counters.succeeded.load(Ordering::SeqCst),
            skipped,
            parse_errors: budget.parse_errors(),
            insert_errors: budget.insert_errors(),
        });
    }
}

/// Runs on a worker thread. A tripped budget does not stop a batch the
/// queue already accepted.
fn execute_batch(session: &dyn Session, batch: Batch, budget: &ErrorBudget, counters: &WriteCounters) {
    let size = batch.len();
    for statement in batch {
        counters.attempted.fetch_add(1, Ordering::SeqCst);
        match session.execute_statement(&statement.text) {
            Ok(()) => {
                counters.succeeded.fetch_add(1, Ordering::SeqCst);
            },
            Err(e) => {
                tracing::debug!(record = statement.record, error = %e, "Insert failed");
                let message = match e {
                    Error::Execution(message) => message,
                    other => other.to_string(),
                };
                budget.record_insert(statement.record, message);
            },
        }
    }
    tracing::trace!(size, "Batch executed");
}

/// `INSERT INTO <table> (<columns>) VALUES (`.
fn insert_prefix(table: &str, columns: &[ColumnSpec]) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_identifier(&c.name)).collect();
    format!("INSERT INTO {table} ({}) VALUES (", names.join(", "))
}

/// Builds the statement for one row; absent columns are written as `null`.
fn build_insert(
    prefix: &str,
    columns: &[ColumnSpec],
    row: &RowRecord,
    formatter: &ValueFormatter,
) -> String {
    let mut text = String::from(prefix);
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            text.push_str(", ");
        }
        let literal = row.get(&column.name).map_or_else(
            || "null".to_string(),
            |value| formatter.format(value, &column.name, column.column_type.as_ref()),
        );
        text.push_str(&literal);
    }
    text.push(')');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::traits::{ParseFailure, RecordResult};
    use crate::models::{ColumnType, RowValue};
    use crate::session::MemorySession;

    /// Reader over prepared records.
    struct VecReader {
        records: std::vec::IntoIter<RecordResult>,
        columns: Vec<ColumnSpec>,
        consumed: u64,
    }

    impl VecReader {
        fn new(records: Vec<RecordResult>) -> Box<Self> {
            Box::new(Self {
                records: records.into_iter(),
                columns: columns(),
                consumed: 0,
            })
        }
    }

    impl RowReader for VecReader {
        fn schema(&self) -> &[ColumnSpec] {
            &self.columns
        }

        fn read_batch(&mut self, max: usize) -> Result<ReadBatch> {
            let records: Vec<_> = self.records.by_ref().take(max).collect();
            self.consumed += records.len() as u64;
            Ok(ReadBatch {
                end_of_data: self.records.len() == 0,
                records,
            })
        }

        fn skip(&mut self, n: u64) -> Result<u64> {
            let mut skipped = 0;
            while skipped < n && self.records.next().is_some() {
                skipped += 1;
            }
            self.consumed += skipped;
            Ok(skipped)
        }
    }

    fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("id", ColumnType::Int),
            ColumnSpec::new("name", ColumnType::Text),
        ]
    }

    fn rows(n: i64) -> Vec<RecordResult> {
        (1..=n)
            .map(|id| {
                Ok(RowRecord::new()
                    .with("id", RowValue::Int(id))
                    .with("name", RowValue::text(format!("user {id}"))))
            })
            .collect()
    }

    fn session() -> MemorySession {
        let session = MemorySession::new().with_keyspace("ks");
        session.create_table("users", columns()).unwrap();
        session
    }

    #[test]
    fn test_imports_every_row_once() {
        let session = session();
        let options = CopyOptions::new()
            .with("MAXBATCHSIZE", "3")
            .with("MAXREQUESTS", "4");
        let report = ImportPipeline::new(&session, "ks.users", columns(), &options)
            .run(VecReader::new(rows(50)))
            .unwrap();

        assert_eq!(report.rows_succeeded, 50);
        assert_eq!(report.rows_processed, 50);
        assert!(report.aborted.is_none());
        let mut ids: Vec<_> = session
            .rows("users")
            .iter()
            .filter_map(|r| match r.get("id") {
                Some(RowValue::Int(id)) => Some(*id),
                _ => None,
            })
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=50).collect::<Vec<_>>());
    }

    #[test]
    fn test_skip_and_max_rows() {
        let session = session();
        let options = CopyOptions::new()
            .with("SKIPROWS", "2")
            .with("MAXROWS", "5")
            .with("CHUNKSIZE", "2");
        let reader = VecReader::new(rows(10));
        let report = ImportPipeline::new(&session, "ks.users", columns(), &options)
            .run(reader)
            .unwrap();

        assert_eq!(report.skipped_rows, 2);
        assert_eq!(report.attempted_writes, 5);
        assert_eq!(report.rows_processed, 7);
        let first = session
            .rows("users")
            .iter()
            .filter_map(|r| match r.get("id") {
                Some(RowValue::Int(id)) => Some(*id),
                _ => None,
            })
            .min();
        assert_eq!(first, Some(3));
    }

    #[test]
    fn test_insert_budget_aborts() {
        let session = session();
        session.fail_all_writes(true);
        let options = CopyOptions::new()
            .with("MAXINSERTERRORS", "3")
            .with("MAXBATCHSIZE", "1")
            .with("MAXREQUESTS", "1");
        let report = ImportPipeline::new(&session, "ks.users", columns(), &options)
            .run(VecReader::new(rows(100)))
            .unwrap();

        let trip = report.aborted.unwrap();
        assert_eq!(trip.count, 4);
        assert_eq!(report.rows_succeeded, 0);
        assert!(report.attempted_writes < 100);
        assert_eq!(
            report.rows_processed,
            report.skipped_rows + report.parse_errors + report.attempted_writes
        );
        assert_eq!(report.attempted_writes, report.rows_succeeded + report.insert_errors);
    }

    /// Delays every write so batches pile up in the queue.
    struct SlowSession {
        inner: MemorySession,
        delay: Duration,
    }

    impl Session for SlowSession {
        fn execute_query(
            &self,
            statement: &str,
            page_size: usize,
        ) -> Result<crate::session::QueryResult> {
            self.inner.execute_query(statement, page_size)
        }

        fn execute_statement(&self, statement: &str) -> Result<()> {
            std::thread::sleep(self.delay);
            self.inner.execute_statement(statement)
        }
    }

    #[test]
    fn test_queued_batches_run_after_abort() {
        let session = SlowSession {
            inner: session(),
            delay: Duration::from_millis(50),
        };
        session.inner.fail_writes_containing("VALUES (1, ");
        let options = CopyOptions::new()
            .with("MAXINSERTERRORS", "0")
            .with("MAXBATCHSIZE", "1")
            .with("MAXREQUESTS", "1");
        let report = ImportPipeline::new(&session, "ks.users", columns(), &options)
            .run(VecReader::new(rows(20)))
            .unwrap();

        assert_eq!(report.aborted.map(|t| t.count), Some(1));
        assert_eq!(report.insert_errors, 1);
        // The queue held two batches and a third was waiting when record 1 failed.
        assert!(report.rows_succeeded >= 2, "{report:?}");
        assert!(report.attempted_writes < 20);
        assert_eq!(report.attempted_writes, report.rows_succeeded + report.insert_errors);
        assert_eq!(session.inner.rows("users").len() as u64, report.rows_succeeded);
    }

    #[test]
    fn test_parse_budget_aborts() {
        let session = session();
        let mut records = rows(3);
        records.push(Err(ParseFailure::new(4, "bad")));
        records.push(Err(ParseFailure::new(5, "bad")));
        records.extend(rows(3));
        let options = CopyOptions::new().with("MAXPARSEERRORS", "1");
        let report = ImportPipeline::new(&session, "ks.users", columns(), &options)
            .run(VecReader::new(records))
            .unwrap();

        assert_eq!(report.aborted.map(|t| t.count), Some(2));
        assert_eq!(report.parse_errors, 2);
        assert_eq!(report.samples.len(), 2);
        assert_eq!(report.samples[0].record, 4);
    }

    #[test]
    fn test_progress_reported_per_chunk() {
        let session = session();
        let options = CopyOptions::new().with("CHUNKSIZE", "10");
        let calls = std::sync::Arc::new(AtomicU64::new(0));
        let seen = std::sync::Arc::clone(&calls);
        let callback: ProgressCallback = Box::new(move |progress| {
            assert_eq!(progress.read % 10, 0);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        ImportPipeline::new(&session, "ks.users", columns(), &options)
            .with_progress(Some(&callback))
            .run(VecReader::new(rows(35)))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_statement_text() {
        let row = RowRecord::new()
            .with("id", RowValue::Int(7))
            .with("name", RowValue::text("O'Brien"));
        let prefix = insert_prefix("ks.users", &columns());
        let text = build_insert(&prefix, &columns(), &row, &ValueFormatter::for_statement());
        assert_eq!(text, "INSERT INTO ks.users (id, name) VALUES (7, 'O''Brien')");
    }
}
