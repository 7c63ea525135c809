//! JSON format adapter for import/export.
//!
//! Writes newline-delimited JSON (NDJSON/JSONL), one object per row with keys
//! in column order. Reads both NDJSON and a single JSON array of objects.

use crate::io::literal::conform;
use crate::io::traits::{ParseFailure, ReadBatch, RecordResult, RowReader, RowWriter, WriteReport};
use crate::models::{ColumnSpec, ColumnType, RowRecord, RowValue, find_column};
use crate::{Error, Result};
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::io::{BufRead, Write};

/// JSON import source.
///
/// Automatically detects and handles both layouts:
/// - **NDJSON/JSONL**: One JSON object per line
/// - **Array**: A JSON array of objects `[{...}, {...}]`
pub struct JsonReader<R: BufRead> {
    reader: R,
    columns: Vec<ColumnSpec>,
    /// Lines already read during detection, or array elements.
    pending: VecDeque<String>,
    /// Elements of an array document, already parsed.
    array: VecDeque<JsonValue>,
    position: u64,
    exhausted: bool,
}

impl<R: BufRead> JsonReader<R> {
    /// Creates a reader and detects the document layout.
    ///
    /// Without explicit or table columns, the keys of the first object name
    /// the columns.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read, an array document is
    /// malformed, or no column names can be determined.
    pub fn new(reader: R, explicit: &[String], table: &[ColumnSpec]) -> Result<Self> {
        let mut this = Self {
            reader,
            columns: Vec::new(),
            pending: VecDeque::new(),
            array: VecDeque::new(),
            position: 0,
            exhausted: false,
        };
        this.detect_layout()?;

        let names: Vec<String> = if !explicit.is_empty() {
            explicit.to_vec()
        } else if !table.is_empty() {
            table.iter().map(|c| c.name.clone()).collect()
        } else {
            this.first_object_keys()
        };
        if names.is_empty() && !this.is_empty_document() {
            return Err(Error::InvalidInput(
                "Cannot determine column names for JSON input".to_string(),
            ));
        }
        this.columns = names
            .into_iter()
            .map(|name| match find_column(table, &name) {
                Some(known) => known.clone(),
                None => ColumnSpec::untyped(name),
            })
            .collect();
        Ok(this)
    }

    fn detect_layout(&mut self) -> Result<()> {
        let Some(first) = self.next_line()? else {
            self.exhausted = true;
            return Ok(());
        };
        if first.trim_start().starts_with('[') {
            let mut document = first;
            self.reader
                .read_to_string(&mut document)
                .map_err(|e| Error::OperationFailed {
                    operation: "read_json".to_string(),
                    cause: e.to_string(),
                })?;
            let items: Vec<JsonValue> = serde_json::from_str(&document)
                .map_err(|e| Error::InvalidInput(format!("Failed to parse JSON array: {e}")))?;
            self.array = items.into();
            self.exhausted = true;
        } else {
            self.pending.push_back(first);
        }
        Ok(())
    }

    /// Next non-blank line, without its terminator.
    fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .map_err(|e| Error::OperationFailed {
                    operation: "read_json".to_string(),
                    cause: e.to_string(),
                })?;
            if read == 0 {
                return Ok(None);
            }
            if !line.trim().is_empty() {
                return Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()));
            }
        }
    }

    fn first_object_keys(&self) -> Vec<String> {
        let first = match (self.array.front(), self.pending.front()) {
            (Some(value), _) => Some(value.clone()),
            (None, Some(line)) => serde_json::from_str::<JsonValue>(line).ok(),
            (None, None) => None,
        };
        match first {
            Some(JsonValue::Object(fields)) => fields.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    fn is_empty_document(&self) -> bool {
        self.array.is_empty() && self.pending.is_empty() && self.exhausted
    }

    fn next_raw(&mut self) -> Result<Option<std::result::Result<JsonValue, String>>> {
        if let Some(value) = self.array.pop_front() {
            return Ok(Some(Ok(value)));
        }
        let line = match self.pending.pop_front() {
            Some(line) => Some(line),
            None if self.exhausted => None,
            None => self.next_line()?,
        };
        match line {
            Some(line) => Ok(Some(serde_json::from_str(&line).map_err(|e| e.to_string()))),
            None => {
                self.exhausted = true;
                Ok(None)
            },
        }
    }

    fn convert(&self, parsed: std::result::Result<JsonValue, String>) -> RecordResult {
        let fields = match parsed {
            Ok(JsonValue::Object(fields)) => fields,
            Ok(other) => {
                return Err(ParseFailure::new(
                    self.position,
                    format!("expected a JSON object, found {other}"),
                ));
            },
            Err(message) => return Err(ParseFailure::new(self.position, message)),
        };
        let mut row = RowRecord::with_capacity(self.columns.len());
        for column in &self.columns {
            let value = match fields.get(&column.name) {
                Some(json) => json_value(json, column.column_type.as_ref()).map_err(|e| {
                    ParseFailure::new(self.position, format!("column {}: {e}", column.name))
                })?,
                None => RowValue::Null,
            };
            row.insert(column.name.clone(), value);
        }
        Ok(row)
    }
}

/// Converts a JSON value, undoing the pair-array layout used for maps with
/// non-text keys.
fn json_value(
    json: &JsonValue,
    ty: Option<&ColumnType>,
) -> crate::io::literal::ValueResult<RowValue> {
    let value = match (json, ty) {
        (JsonValue::Array(pairs), Some(ColumnType::Map(_, _)))
            if pairs
                .iter()
                .all(|p| p.as_array().is_some_and(|kv| kv.len() == 2)) =>
        {
            RowValue::Map(
                pairs
                    .iter()
                    .filter_map(JsonValue::as_array)
                    .map(|kv| (RowValue::from_json(&kv[0]), RowValue::from_json(&kv[1])))
                    .collect(),
            )
        },
        _ => RowValue::from_json(json),
    };
    match ty {
        Some(ty) => conform(value, ty),
        None => Ok(value),
    }
}

impl<R: BufRead + Send> RowReader for JsonReader<R> {
    fn schema(&self) -> &[ColumnSpec] {
        &self.columns
    }

    fn read_batch(&mut self, max: usize) -> Result<ReadBatch> {
        let mut batch = ReadBatch::default();
        while batch.records.len() < max {
            match self.next_raw()? {
                Some(parsed) => {
                    self.position += 1;
                    batch.records.push(self.convert(parsed));
                },
                None => break,
            }
        }
        batch.end_of_data = self.exhausted && self.array.is_empty() && self.pending.is_empty();
        Ok(batch)
    }

    fn skip(&mut self, n: u64) -> Result<u64> {
        let mut skipped = 0;
        while skipped < n && self.next_raw()?.is_some() {
            self.position += 1;
            skipped += 1;
        }
        Ok(skipped)
    }
}

/// JSON export sink writing one object per line.
pub struct JsonWriter<W: Write> {
    writer: W,
    columns: Vec<ColumnSpec>,
    rows: u64,
}

impl<W: Write> JsonWriter<W> {
    /// Creates a new JSON writer.
    pub fn new(writer: W, columns: &[ColumnSpec]) -> Self {
        Self {
            writer,
            columns: columns.to_vec(),
            rows: 0,
        }
    }

    fn encode(&self, row: &RowRecord) -> Result<String> {
        let mut line = String::from("{");
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            let value = row.get(&column.name).unwrap_or(&RowValue::Null).to_json();
            let key = serde_json::to_string(&column.name).map_err(serialize_error)?;
            let value = serde_json::to_string(&value).map_err(serialize_error)?;
            line.push_str(&key);
            line.push(':');
            line.push_str(&value);
        }
        line.push('}');
        Ok(line)
    }
}

fn serialize_error(e: serde_json::Error) -> Error {
    Error::OperationFailed {
        operation: "serialize_json".to_string(),
        cause: e.to_string(),
    }
}

impl<W: Write> RowWriter for JsonWriter<W> {
    fn write_row(&mut self, row: &RowRecord) -> Result<()> {
        let line = self.encode(row)?;
        writeln!(self.writer, "{line}").map_err(|e| Error::OperationFailed {
            operation: "write_json".to_string(),
            cause: e.to_string(),
        })?;
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| Error::OperationFailed {
            operation: "flush_json".to_string(),
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
