//! Apache Parquet format adapter for import/export.
//!
//! The writer buffers up to `CHUNKSIZE` rows and writes each buffer as one
//! row group. Columns without a declared type take their type from the first
//! buffered rows. The reader yields rows in file order, one Arrow record
//! batch at a time.

use super::ColumnarOptions;
use super::arrow_types::{batch_to_rows, columns_from_schema, resolve_types, rows_to_batch, schema_for};
use crate::io::traits::{ReadBatch, RowReader, RowWriter, WriteReport};
use crate::models::{ColumnSpec, Compression, RowRecord, RowValue};
use crate::{Error, Result};
use arrow::datatypes::SchemaRef;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::basic::{Compression as Codec, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::Path;

fn write_error(e: impl std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: "write_parquet".to_string(),
        cause: e.to_string(),
    }
}

fn read_error(e: impl std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: "read_parquet".to_string(),
        cause: e.to_string(),
    }
}

fn codec(compression: Compression) -> Codec {
    match compression {
        Compression::None => Codec::UNCOMPRESSED,
        Compression::Snappy => Codec::SNAPPY,
        Compression::Gzip => Codec::GZIP(GzipLevel::default()),
        Compression::Lz4 => Codec::LZ4_RAW,
        Compression::Zstd => Codec::ZSTD(ZstdLevel::default()),
    }
}

/// Rough in-memory size of a value, used to estimate unflushed bytes.
fn estimated_value_size(value: &RowValue) -> u64 {
    match value {
        RowValue::Null => 1,
        RowValue::Bool(_) => 1,
        RowValue::Int(_) | RowValue::Float(_) | RowValue::Timestamp(_) => 8,
        RowValue::Text(s) | RowValue::Decimal(s) => s.len() as u64,
        RowValue::Bytes(b) => b.len() as u64,
        RowValue::List(items) | RowValue::Set(items) | RowValue::Tuple(items) => {
            items.iter().map(estimated_value_size).sum::<u64>() + 4
        },
        RowValue::Map(entries) => entries
            .iter()
            .map(|(k, v)| estimated_value_size(k) + estimated_value_size(v))
            .sum::<u64>()
            + 4,
        RowValue::Udt(fields) => fields
            .iter()
            .map(|(k, v)| k.len() as u64 + estimated_value_size(v))
            .sum(),
    }
}

/// Parquet writer for one file.
pub struct ColumnarWriter<W: Write + Send> {
    sink: Option<W>,
    writer: Option<ArrowWriter<W>>,
    columns: Vec<ColumnSpec>,
    schema: Option<SchemaRef>,
    pending: Vec<RowRecord>,
    pending_bytes: u64,
    options: ColumnarOptions,
    rows: u64,
}

impl<W: Write + Send> ColumnarWriter<W> {
    /// Creates a writer. Nothing is written until the first row group is
    /// complete or the writer is closed.
    ///
    /// # Errors
    ///
    /// Returns an error if no columns are given.
    pub fn new(sink: W, columns: &[ColumnSpec], options: ColumnarOptions) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::InvalidInput(
                "Columnar output needs at least one column".to_string(),
            ));
        }
        Ok(Self {
            sink: Some(sink),
            writer: None,
            columns: columns.to_vec(),
            schema: None,
            pending: Vec::new(),
            pending_bytes: 0,
            options,
            rows: 0,
        })
    }

    /// Bytes written so far plus an estimate for buffered rows.
    #[must_use]
    pub fn estimated_size(&self) -> u64 {
        let written = self.writer.as_ref().map_or(0, |w| {
            (w.bytes_written() + w.in_progress_size()) as u64
        });
        written + self.pending_bytes
    }

    /// Rows accepted so far.
    #[must_use]
    pub const fn rows(&self) -> u64 {
        self.rows
    }

    fn ensure_writer(&mut self) -> Result<()> {
        if self.writer.is_some() {
            return Ok(());
        }
        let Some(sink) = self.sink.take() else {
            return Err(write_error("writer already closed"));
        };
        self.columns = resolve_types(&self.columns, &self.pending);
        let schema = schema_for(&self.columns);
        let props = WriterProperties::builder()
            .set_compression(codec(self.options.compression))
            .build();
        let writer =
            ArrowWriter::try_new(sink, schema.clone(), Some(props)).map_err(write_error)?;
        self.writer = Some(writer);
        self.schema = Some(schema);
        Ok(())
    }

    /// Writes buffered rows as one row group.
    fn flush_pending(&mut self) -> Result<()> {
        self.ensure_writer()?;
        if self.pending.is_empty() {
            return Ok(());
        }
        let (Some(writer), Some(schema)) = (self.writer.as_mut(), self.schema.as_ref()) else {
            return Err(write_error("writer not initialised"));
        };
        let batch = rows_to_batch(schema.clone(), &self.columns, &self.pending).map_err(write_error)?;
        writer.write(&batch).map_err(write_error)?;
        writer.flush().map_err(write_error)?;
        self.pending.clear();
        self.pending_bytes = 0;
        Ok(())
    }

    /// Finishes the file, writing the footer.
    ///
    /// # Errors
    ///
    /// Returns an error if buffered rows cannot be encoded or I/O fails.
    pub fn finish(mut self) -> Result<u64> {
        self.flush_pending()?;
        if let Some(writer) = self.writer.take() {
            writer.close().map(|_| ()).map_err(write_error)?;
        }
        Ok(self.rows)
    }
}

impl<W: Write + Send> RowWriter for ColumnarWriter<W> {
    fn write_row(&mut self, row: &RowRecord) -> Result<()> {
        self.pending_bytes += row.iter().map(|(_, v)| estimated_value_size(v)).sum::<u64>();
        self.pending.push(row.clone());
        self.rows += 1;
        if self.pending.len() >= self.options.chunk_size.max(1) {
            self.flush_pending()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flush_pending()
    }

    fn close(self: Box<Self>) -> Result<WriteReport> {
        let rows_written = self.finish()?;
        Ok(WriteReport {
            rows_written,
            files_written: 1,
            ..WriteReport::default()
        })
    }
}

/// Parquet reader for one file.
pub struct ColumnarReader {
    batches: ParquetRecordBatchReader,
    columns: Vec<ColumnSpec>,
    buffered: VecDeque<RowRecord>,
    exhausted: bool,
}

impl ColumnarReader {
    /// Opens a Parquet file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is not valid Parquet.
    pub fn open(path: &Path, options: ColumnarOptions) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::OperationFailed {
            operation: "open_import_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| read_error(format!("{}: {e}", path.display())))?;
        let columns = columns_from_schema(builder.schema());
        let batches = builder
            .with_batch_size(options.chunk_size.max(1))
            .build()
            .map_err(read_error)?;
        Ok(Self {
            batches,
            columns,
            buffered: VecDeque::new(),
            exhausted: false,
        })
    }

    /// Pulls record batches until at least `wanted` rows are buffered.
    fn fill(&mut self, wanted: usize) -> Result<()> {
        while self.buffered.len() < wanted && !self.exhausted {
            match self.batches.next() {
                Some(batch) => {
                    let batch = batch.map_err(read_error)?;
                    let rows = batch_to_rows(&batch, &self.columns).map_err(read_error)?;
                    self.buffered.extend(rows);
                },
                None => self.exhausted = true,
            }
        }
        Ok(())
    }
}

impl RowReader for ColumnarReader {
    fn schema(&self) -> &[ColumnSpec] {
        &self.columns
    }

    fn read_batch(&mut self, max: usize) -> Result<ReadBatch> {
        self.fill(max)?;
        let take = max.min(self.buffered.len());
        let records = self.buffered.drain(..take).map(Ok).collect();
        Ok(ReadBatch {
            records,
            end_of_data: self.exhausted && self.buffered.is_empty(),
        })
    }

    fn skip(&mut self, n: u64) -> Result<u64> {
        let mut skipped = 0;
        while skipped < n {
            let wanted = usize::try_from(n - skipped).unwrap_or(usize::MAX);
            self.fill(wanted.min(65_536))?;
            if self.buffered.is_empty() {
                break;
            }
            let take = wanted.min(self.buffered.len());
            self.buffered.drain(..take);
            skipped += take as u64;
        }
        Ok(skipped)
    }
}
