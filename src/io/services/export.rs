//! Export pipeline.
//!
//! Runs one `SELECT` against the session and streams its rows into a
//! [`RowWriter`]. The writer is created from the result columns, so the
//! file carries the column types the session reported.
//!
//! A failure after streaming started does not remove anything already
//! written: the writer is still closed so finished files stay readable, and
//! the report carries the failure next to the row count reached.

use crate::Result;
use crate::io::formats::{Format, WriteDestination, create_writer};
use crate::io::formatter::quote_identifier;
use crate::io::traits::PartitionReport;
use crate::models::CopyOptions;
use crate::session::Session;
use std::time::{Duration, Instant};

/// Outcome of an export.
#[derive(Debug, Default)]
pub struct ExportReport {
    /// Rows handed to the writer successfully.
    pub rows_exported: u64,
    /// Files produced.
    pub files_written: usize,
    /// Per-partition counts for partitioned exports.
    pub partitions: Vec<PartitionReport>,
    /// Partition files closed early by the open file ceiling.
    pub handles_evicted: u64,
    /// Set when the export stopped part way.
    pub failure: Option<crate::Error>,
    /// Wall clock time of the run.
    pub elapsed: Duration,
}

impl ExportReport {
    /// Returns whether the export ran to completion.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Streams one table into a file or stream.
#[derive(Clone, Copy)]
pub struct ExportPipeline<'a> {
    session: &'a dyn Session,
    table: &'a str,
    columns: &'a [String],
    options: &'a CopyOptions,
    format: Format,
}

impl<'a> ExportPipeline<'a> {
    /// Creates a pipeline for `table` (as it should appear in the query).
    /// An empty column list selects every column.
    #[must_use]
    pub const fn new(
        session: &'a dyn Session,
        table: &'a str,
        columns: &'a [String],
        options: &'a CopyOptions,
        format: Format,
    ) -> Self {
        Self {
            session,
            table,
            columns,
            options,
            format,
        }
    }

    /// The query the pipeline runs.
    ///
    /// `LIMIT` wins over `MAXROWS` when both are given.
    #[must_use]
    pub fn select_statement(&self) -> String {
        let projection = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut statement = format!("SELECT {projection} FROM {}", self.table);
        if let Some(limit) = self.options.limit().or_else(|| self.options.max_rows()) {
            statement.push_str(&format!(" LIMIT {limit}"));
        }
        statement
    }

    /// Runs the export.
    ///
    /// # Errors
    ///
    /// Returns an error if the query is rejected or the destination cannot
    /// be created. Failures after the first row are reported in
    /// [`ExportReport::failure`].
    pub fn run(&self, destination: WriteDestination<'_>) -> Result<ExportReport> {
        let started = Instant::now();
        let statement = self.select_statement();
        let page_size = self.options.page_size();
        tracing::info!(table = self.table, format = %self.format, page_size, "Starting export");

        let result = self.session.execute_query(&statement, page_size)?;
        let mut writer = create_writer(self.format, destination, &result.columns, self.options)?;

        let mut report = ExportReport::default();
        for row in result.rows {
            let written = row.and_then(|row| writer.write_row(&row));
            if let Err(e) = written {
                tracing::warn!(rows = report.rows_exported, error = %e, "Export stopped");
                report.failure = Some(e);
                break;
            }
            report.rows_exported += 1;
            // Row groups follow CHUNKSIZE, so pages only drive progress logging.
            if report.rows_exported % page_size as u64 == 0 {
                tracing::debug!(rows = report.rows_exported, "Export progress");
            }
        }

        match writer.close() {
            Ok(written) => {
                report.files_written = written.files_written;
                report.partitions = written.partitions;
                report.handles_evicted = written.handles_evicted;
            },
            Err(e) => {
                if report.failure.is_none() {
                    report.failure = Some(e);
                }
            },
        }
        report.elapsed = started.elapsed();

        metrics::counter!("tablecopy_rows_exported_total").increment(report.rows_exported);
        tracing::info!(
            table = self.table,
            rows = report.rows_exported,
            files = report.files_written,
            partitions = report.partitions.len(),
            complete = report.is_complete(),
            "Export finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnSpec, ColumnType, RowRecord, RowValue};
    use crate::session::MemorySession;

    fn session(rows: i64) -> MemorySession {
        let session = MemorySession::new().with_keyspace("ks");
        session
            .create_table(
                "users",
                vec![
                    ColumnSpec::new("id", ColumnType::Int),
                    ColumnSpec::new("data", ColumnType::Blob),
                ],
            )
            .unwrap();
        for id in 1..=rows {
            session
                .insert(
                    "users",
                    RowRecord::new()
                        .with("id", RowValue::Int(id))
                        .with("data", RowValue::Bytes(vec![0xde, 0xad, 0xbe, 0xef])),
                )
                .unwrap();
        }
        session
    }

    #[test]
    fn test_select_statement() {
        let session = session(0);
        let options = CopyOptions::new().with("MAXROWS", "10");
        let columns = vec!["id".to_string(), "Data".to_string()];
        let pipeline =
            ExportPipeline::new(&session, "ks.users", &columns, &options, Format::Delimited);
        assert_eq!(
            pipeline.select_statement(),
            "SELECT id, \"Data\" FROM ks.users LIMIT 10"
        );

        let options = CopyOptions::new();
        let pipeline = ExportPipeline::new(&session, "ks.users", &[], &options, Format::Delimited);
        assert_eq!(pipeline.select_statement(), "SELECT * FROM ks.users");
    }

    #[test]
    fn test_export_to_stream() {
        let session = session(3);
        let options = CopyOptions::new().with("HEADER", "true");
        let mut out: Vec<u8> = Vec::new();
        let report = ExportPipeline::new(&session, "ks.users", &[], &options, Format::Delimited)
            .run(WriteDestination::Stream(&mut out))
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.rows_exported, 3);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "id,data");
        assert_eq!(lines[1], "1,0xdeadbeef");
    }

    #[test]
    fn test_mid_stream_failure_keeps_rows() {
        let session = session(5);
        session.fail_query_after(2);
        let options = CopyOptions::new();
        let mut out: Vec<u8> = Vec::new();
        let report = ExportPipeline::new(&session, "ks.users", &[], &options, Format::Delimited)
            .run(WriteDestination::Stream(&mut out))
            .unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.rows_exported, 2);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }

    fn row_group_sizes(path: &std::path::Path) -> Vec<i64> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let reader = SerializedFileReader::new(std::fs::File::open(path).unwrap()).unwrap();
        reader
            .metadata()
            .row_groups()
            .iter()
            .map(parquet::file::metadata::RowGroupMetaData::num_rows)
            .collect()
    }

    #[test]
    fn test_row_groups_follow_chunk_size_not_page_size() {
        let session = session(10);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.parquet");
        let options = CopyOptions::new()
            .with("CHUNKSIZE", "10")
            .with("PAGESIZE", "3");
        let report = ExportPipeline::new(&session, "ks.users", &[], &options, Format::Columnar)
            .run(WriteDestination::Path(path.clone()))
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(row_group_sizes(&path), vec![10]);
    }

    #[test]
    fn test_partition_files_keep_chunk_sized_row_groups() {
        let session = session(10);
        let dir = tempfile::tempdir().unwrap();
        let options = CopyOptions::new()
            .with("CHUNKSIZE", "4")
            .with("PAGESIZE", "3")
            .with("PARTITION", "data");
        let report = ExportPipeline::new(&session, "ks.users", &[], &options, Format::Columnar)
            .run(WriteDestination::Path(dir.path().to_path_buf()))
            .unwrap();
        assert_eq!(report.files_written, 1);

        let partition = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .find(|p| p.is_dir())
            .unwrap();
        let file = std::fs::read_dir(partition)
            .unwrap()
            .map(|e| e.unwrap().path())
            .find(|p| p.extension().is_some_and(|ext| ext == "parquet"))
            .unwrap();
        assert_eq!(row_group_sizes(&file), vec![4, 4, 2]);
    }

    #[test]
    fn test_query_error_is_returned() {
        let session = session(0);
        let options = CopyOptions::new();
        let mut out: Vec<u8> = Vec::new();
        let result = ExportPipeline::new(&session, "ks.missing", &[], &options, Format::Delimited)
            .run(WriteDestination::Stream(&mut out));
        assert!(result.is_err());
    }
}
