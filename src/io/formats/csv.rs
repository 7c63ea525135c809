//! Delimited text adapter for import/export.
//!
//! Field names come from the explicit column list, then the header record,
//! then the known table columns. Header names may carry the ` (PK)` and
//! ` (C)` markers some shells print for key columns; they are stripped.

use super::DelimitedOptions;
use crate::io::formatter::ValueFormatter;
use crate::io::literal::coerce_text;
use crate::io::traits::{ParseFailure, ReadBatch, RecordResult, RowReader, RowWriter, WriteReport};
use crate::models::{ColumnSpec, RowRecord, RowValue, find_column};
use crate::{Error, Result};
use std::io::{Read, Write};

/// Delimited text reader.
pub struct DelimitedReader<R: Read> {
    reader: csv::Reader<R>,
    columns: Vec<ColumnSpec>,
    null_token: String,
    /// Records consumed so far, including skipped and malformed ones.
    position: u64,
    exhausted: bool,
}

impl<R: Read> DelimitedReader<R> {
    /// Creates a reader, consuming the header record when there is one.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be read or no column names are
    /// available from any source.
    pub fn new(
        input: R,
        options: &DelimitedOptions,
        explicit: &[String],
        table: &[ColumnSpec],
    ) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(options.delimiter)
            .quote(options.quote)
            .escape(options.escape)
            .from_reader(input);

        let mut header = Vec::new();
        if options.header {
            let mut record = csv::StringRecord::new();
            let found = reader
                .read_record(&mut record)
                .map_err(|e| Error::OperationFailed {
                    operation: "read_csv_header".to_string(),
                    cause: e.to_string(),
                })?;
            if found {
                header = record.iter().map(clean_header).collect();
            }
        }

        let names: Vec<String> = if !explicit.is_empty() {
            explicit.to_vec()
        } else if !header.is_empty() {
            header
        } else {
            table.iter().map(|c| c.name.clone()).collect()
        };
        if names.is_empty() {
            return Err(Error::InvalidInput(
                "Cannot determine column names: no column list, header or table schema".to_string(),
            ));
        }

        let columns = names
            .into_iter()
            .map(|name| match find_column(table, &name) {
                Some(known) => known.clone(),
                None => ColumnSpec::untyped(name),
            })
            .collect();

        Ok(Self {
            reader,
            columns,
            null_token: options.null_token.clone(),
            position: 0,
            exhausted: false,
        })
    }

    fn convert(&self, record: &csv::StringRecord) -> RecordResult {
        if record.len() != self.columns.len() {
            return Err(ParseFailure::new(
                self.position,
                format!("expected {} fields, found {}", self.columns.len(), record.len()),
            ));
        }
        let mut row = RowRecord::with_capacity(self.columns.len());
        for (column, field) in self.columns.iter().zip(record.iter()) {
            let value = if field == self.null_token {
                RowValue::Null
            } else {
                coerce_text(field, column.column_type.as_ref()).map_err(|e| {
                    ParseFailure::new(self.position, format!("column {}: {e}", column.name))
                })?
            };
            row.insert(column.name.clone(), value);
        }
        Ok(row)
    }
}

impl<R: Read + Send> RowReader for DelimitedReader<R> {
    fn schema(&self) -> &[ColumnSpec] {
        &self.columns
    }

    fn read_batch(&mut self, max: usize) -> Result<ReadBatch> {
        let mut batch = ReadBatch::default();
        let mut record = csv::StringRecord::new();
        while batch.records.len() < max && !self.exhausted {
            match self.reader.read_record(&mut record) {
                Ok(false) => self.exhausted = true,
                Ok(true) => {
                    self.position += 1;
                    batch.records.push(self.convert(&record));
                },
                Err(e) if e.is_io_error() => {
                    return Err(Error::OperationFailed {
                        operation: "read_csv".to_string(),
                        cause: e.to_string(),
                    });
                },
                Err(e) => {
                    self.position += 1;
                    batch
                        .records
                        .push(Err(ParseFailure::new(self.position, e.to_string())));
                },
            }
        }
        batch.end_of_data = self.exhausted;
        Ok(batch)
    }

    fn skip(&mut self, n: u64) -> Result<u64> {
        let mut record = csv::ByteRecord::new();
        let mut skipped = 0;
        while skipped < n && !self.exhausted {
            match self.reader.read_byte_record(&mut record) {
                Ok(false) => self.exhausted = true,
                Err(e) if e.is_io_error() => {
                    return Err(Error::OperationFailed {
                        operation: "skip_csv".to_string(),
                        cause: e.to_string(),
                    });
                },
                Ok(true) | Err(_) => {
                    self.position += 1;
                    skipped += 1;
                },
            }
        }
        Ok(skipped)
    }
}

fn clean_header(name: &str) -> String {
    let name = name.trim();
    name.strip_suffix(" (PK)")
        .or_else(|| name.strip_suffix(" (C)"))
        .unwrap_or(name)
        .trim()
        .to_string()
}

/// Delimited text writer.
pub struct DelimitedWriter<W: Write> {
    writer: csv::Writer<W>,
    columns: Vec<ColumnSpec>,
    formatter: ValueFormatter,
    rows: u64,
}

impl<W: Write> DelimitedWriter<W> {
    /// Creates a writer, emitting the header record when enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn new(output: W, columns: &[ColumnSpec], options: &DelimitedOptions) -> Result<Self> {
        let mut builder = csv::WriterBuilder::new();
        builder
            .has_headers(false)
            .delimiter(options.delimiter)
            .quote(options.quote);
        if let Some(escape) = options.escape {
            builder.double_quote(false).escape(escape);
        }
        let mut writer = builder.from_writer(output);

        if options.header {
            writer
                .write_record(columns.iter().map(|c| c.name.as_str()))
                .map_err(|e| Error::OperationFailed {
                    operation: "write_csv_header".to_string(),
                    cause: e.to_string(),
                })?;
        }

        Ok(Self {
            writer,
            columns: columns.to_vec(),
            formatter: ValueFormatter::for_file(options.null_token.clone()),
            rows: 0,
        })
    }
}

impl<W: Write> RowWriter for DelimitedWriter<W> {
    fn write_row(&mut self, row: &RowRecord) -> Result<()> {
        let fields: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let value = row.get(&c.name).unwrap_or(&RowValue::Null);
                self.formatter.format(value, &c.name, c.column_type.as_ref())
            })
            .collect();
        self.writer
            .write_record(&fields)
            .map_err(|e| Error::OperationFailed {
                operation: "write_csv".to_string(),
                cause: e.to_string(),
            })?;
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| Error::OperationFailed {
            operation: "flush_csv".to_string(),
            cause: e.to_string(),
        })
    }

    fn close(mut self: Box<Self>) -> Result<WriteReport> {
        self.flush()?;
        Ok(WriteReport {
            rows_written: self.rows,
            files_written: 1,
            ..WriteReport::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnType;
    use std::io::Cursor;

    fn options(header: bool) -> DelimitedOptions {
        DelimitedOptions {
            header,
            ..DelimitedOptions::default()
        }
    }

    fn ok_rows(batch: ReadBatch) -> Vec<RowRecord> {
        batch.records.into_iter().map(std::result::Result::unwrap).collect()
    }

    #[test]
    fn test_header_names_and_markers() {
        let input = "id (PK),ts (C),name\n1,2,alice\n";
        let mut reader =
            DelimitedReader::new(Cursor::new(input), &options(true), &[], &[]).unwrap();
        let names: Vec<_> = reader.schema().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "ts", "name"]);

        let rows = ok_rows(reader.read_batch(10).unwrap());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&RowValue::Int(1)));
        assert_eq!(rows[0].get("name"), Some(&RowValue::text("alice")));
    }

    #[test]
    fn test_table_types_drive_coercion() {
        let table = vec![
            ColumnSpec::new("id", ColumnType::Text),
            ColumnSpec::new("score", ColumnType::Double),
        ];
        let mut reader =
            DelimitedReader::new(Cursor::new("007,3\n"), &options(false), &[], &table).unwrap();
        let rows = ok_rows(reader.read_batch(10).unwrap());
        assert_eq!(rows[0].get("id"), Some(&RowValue::text("007")));
        assert_eq!(rows[0].get("score"), Some(&RowValue::Float(3.0)));
    }

    #[test]
    fn test_wrong_field_count_is_parse_failure() {
        let input = "a,b\n1,2\n3\n4,5\n";
        let mut reader =
            DelimitedReader::new(Cursor::new(input), &options(true), &[], &[]).unwrap();
        let batch = reader.read_batch(10).unwrap();
        assert!(batch.end_of_data);
        assert_eq!(batch.records.len(), 3);
        let failure = batch.records[1].as_ref().unwrap_err();
        assert_eq!(failure.record, 2);
        assert!(failure.message.contains("expected 2 fields"));
    }

    #[test]
    fn test_null_token_and_batch_limit() {
        let input = "a\nNA\nx\ny\n";
        let opts = DelimitedOptions {
            null_token: "NA".to_string(),
            ..options(true)
        };
        let mut reader = DelimitedReader::new(Cursor::new(input), &opts, &[], &[]).unwrap();
        let first = reader.read_batch(2).unwrap();
        assert!(!first.end_of_data);
        let rows = ok_rows(first);
        assert_eq!(rows[0].get("a"), Some(&RowValue::Null));
        assert_eq!(rows[1].get("a"), Some(&RowValue::text("x")));
        let rest = reader.read_batch(2).unwrap();
        assert!(rest.end_of_data);
        assert_eq!(rest.records.len(), 1);
    }

    #[test]
    fn test_skip_counts_records() {
        let input = "a\n1\n2\n3\n";
        let mut reader =
            DelimitedReader::new(Cursor::new(input), &options(true), &[], &[]).unwrap();
        assert_eq!(reader.skip(2).unwrap(), 2);
        let rows = ok_rows(reader.read_batch(10).unwrap());
        assert_eq!(rows[0].get("a"), Some(&RowValue::Int(3)));
        assert_eq!(reader.skip(5).unwrap(), 0);
    }

    #[test]
    fn test_no_column_source_is_error() {
        let result = DelimitedReader::new(Cursor::new("1,2\n"), &options(false), &[], &[]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_writer_header_quoting_and_nulls() {
        let columns = vec![ColumnSpec::untyped("id"), ColumnSpec::untyped("note")];
        let mut out = Vec::new();
        {
            let mut writer: Box<dyn RowWriter> =
                Box::new(DelimitedWriter::new(&mut out, &columns, &options(true)).unwrap());
            writer
                .write_row(&RowRecord::new().with("id", RowValue::Int(1)).with("note", RowValue::text("a, b")))
                .unwrap();
            writer
                .write_row(&RowRecord::new().with("id", RowValue::Int(2)))
                .unwrap();
            let report = writer.close().unwrap();
            assert_eq!(report.rows_written, 2);
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "id,note\n1,\"a, b\"\n2,null\n");
    }

    #[test]
    fn test_writer_custom_escape() {
        let columns = vec![ColumnSpec::untyped("note")];
        let opts = DelimitedOptions {
            escape: Some(b'\\'),
            ..options(false)
        };
        let mut out = Vec::new();
        {
            let mut writer = DelimitedWriter::new(&mut out, &columns, &opts).unwrap();
            writer
                .write_row(&RowRecord::new().with("note", RowValue::text("say \"hi\"")))
                .unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(String::from_utf8(out).unwrap(), "\"say \\\"hi\\\"\"\n");
    }
}
