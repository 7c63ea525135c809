//! Partitioned Parquet datasets.
//!
//! Layout: `root/col1=v1/col2=v2/part-00000.parquet`. A partition column is
//! either a real column, whose values are also kept in the data files, or a
//! virtual column `source.part` (`part` one of `year`, `month`, `day`,
//! `hour`, `date`) derived from a timestamp or time-based UUID. Virtual
//! columns only route rows; they never appear in data files.
//!
//! Path values escape `/` as `__SLASH__` and `=` as `__EQ__`; null is
//! written as `__NULL__`.
//!
//! The writer keeps at most `MAX_OPEN_FILES` files open, closing the least
//! recently used one when a new partition needs a handle. Part numbers keep
//! increasing per partition, so a partition reopened after eviction or
//! rotated for size gets a new file and nothing is overwritten.

use super::ColumnarOptions;
use super::parquet::{ColumnarReader, ColumnarWriter};
use crate::io::formatter::ValueFormatter;
use crate::io::literal::parse_timestamp;
use crate::io::traits::{
    DatasetInfo, PartitionReport, ReadBatch, RowReader, RowWriter, WriteReport,
};
use crate::models::{ColumnSpec, CopyOptions, RowRecord, RowValue, find_column};
use crate::{Error, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};
use lru::LruCache;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs::File;
use std::io::BufWriter;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

const NULL_SEGMENT: &str = "__NULL__";
const SLASH_ESCAPE: &str = "__SLASH__";
const EQ_ESCAPE: &str = "__EQ__";

/// Partitioned writer settings taken from `COPY` options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionOptions {
    /// Partition column specs, in path order.
    pub columns: Vec<String>,
    /// Ceiling on simultaneously open files.
    pub max_open_files: usize,
    /// Size at which a file is closed and the next part started.
    pub max_file_size: u64,
    /// Settings for each data file.
    pub columnar: ColumnarOptions,
}

impl PartitionOptions {
    /// Extracts partition settings from `COPY` options.
    #[must_use]
    pub fn from_options(options: &CopyOptions) -> Self {
        Self {
            columns: options.partition_columns(),
            max_open_files: options.max_open_files(),
            max_file_size: options.max_file_size(),
            columnar: ColumnarOptions::from_options(options),
        }
    }
}

/// Date part extracted by a virtual partition column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimePart {
    Year,
    Month,
    Day,
    Hour,
    Date,
}

/// One configured partition column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionColumn {
    spec: String,
    source: String,
    part: Option<TimePart>,
}

impl PartitionColumn {
    /// Parses `col` or `col.part`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown date part.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        let Some((source, part)) = spec.split_once('.') else {
            return Ok(Self {
                spec: spec.to_string(),
                source: spec.to_string(),
                part: None,
            });
        };
        let part = match part.to_lowercase().as_str() {
            "year" => TimePart::Year,
            "month" => TimePart::Month,
            "day" => TimePart::Day,
            "hour" => TimePart::Hour,
            "date" => TimePart::Date,
            other => {
                return Err(Error::InvalidInput(format!(
                    "Unknown partition date part '{other}' in {spec}; expected year, month, day, hour or date"
                )));
            },
        };
        Ok(Self {
            spec: spec.to_string(),
            source: source.to_string(),
            part: Some(part),
        })
    }

    /// The spec as written, which is also the path segment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec
    }

    /// The column the value comes from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the value is derived rather than stored.
    #[must_use]
    pub const fn is_virtual(&self) -> bool {
        self.part.is_some()
    }

    /// Extracts the partition value from a row.
    #[must_use]
    pub fn value(&self, row: &RowRecord) -> RowValue {
        let source = row.get(&self.source).cloned().unwrap_or(RowValue::Null);
        let Some(part) = self.part else {
            return source;
        };
        let Some(at) = time_of(&source) else {
            return RowValue::Null;
        };
        match part {
            TimePart::Year => RowValue::Int(i64::from(at.year())),
            TimePart::Month => RowValue::Int(i64::from(at.month())),
            TimePart::Day => RowValue::Int(i64::from(at.day())),
            TimePart::Hour => RowValue::Int(i64::from(at.hour())),
            TimePart::Date => RowValue::Text(at.format("%Y-%m-%d").to_string()),
        }
    }
}

/// Time carried by a timestamp, a time-based UUID, or timestamp text.
fn time_of(value: &RowValue) -> Option<DateTime<Utc>> {
    match value {
        RowValue::Timestamp(at) => Some(*at),
        RowValue::Text(s) => match uuid::Uuid::parse_str(s) {
            Ok(id) => {
                let (secs, nanos) = id.get_timestamp()?.to_unix();
                DateTime::from_timestamp(i64::try_from(secs).ok()?, nanos)
            },
            Err(_) => parse_timestamp(s),
        },
        _ => None,
    }
}

/// Escapes a value for use in a path segment.
#[must_use]
pub fn escape_value(value: &RowValue) -> String {
    if value.is_null() {
        return NULL_SEGMENT.to_string();
    }
    ValueFormatter::for_file(NULL_SEGMENT)
        .format(value, "", None)
        .replace('/', SLASH_ESCAPE)
        .replace('=', EQ_ESCAPE)
}

/// Reverses [`escape_value`]; `None` stands for null.
#[must_use]
pub fn unescape_value(segment: &str) -> Option<String> {
    if segment == NULL_SEGMENT {
        return None;
    }
    Some(segment.replace(SLASH_ESCAPE, "/").replace(EQ_ESCAPE, "="))
}

/// Ordered `(column, escaped value)` pairs identifying a partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(Vec<(String, String)>);

impl PartitionKey {
    /// Derives the key of a row.
    #[must_use]
    pub fn for_row(columns: &[PartitionColumn], row: &RowRecord) -> Self {
        Self(
            columns
                .iter()
                .map(|c| (c.name().to_string(), escape_value(&c.value(row))))
                .collect(),
        )
    }

    /// Directory of the partition relative to the dataset root.
    #[must_use]
    pub fn relative_dir(&self) -> PathBuf {
        self.0.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

type PartFile = ColumnarWriter<BufWriter<File>>;

#[derive(Debug, Default)]
struct PartitionState {
    rows: u64,
    files: usize,
    next_part: u32,
}

/// Writer for a partitioned dataset rooted at a directory.
pub struct PartitionedWriter {
    root: PathBuf,
    partition_columns: Vec<PartitionColumn>,
    data_columns: Vec<ColumnSpec>,
    options: PartitionOptions,
    open: LruCache<PartitionKey, PartFile>,
    partitions: BTreeMap<PartitionKey, PartitionState>,
    rows: u64,
    evicted: u64,
}

impl PartitionedWriter {
    /// Creates the dataset root and validates the partition columns against
    /// `columns`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when a partition column (or the
    /// source of a virtual one) is not among `columns`, and
    /// [`Error::OperationFailed`] when the root cannot be created.
    pub fn create(root: PathBuf, columns: &[ColumnSpec], options: PartitionOptions) -> Result<Self> {
        let partition_columns = options
            .columns
            .iter()
            .map(|spec| PartitionColumn::parse(spec))
            .collect::<Result<Vec<_>>>()?;
        if partition_columns.is_empty() {
            return Err(Error::InvalidInput("No partition columns given".to_string()));
        }
        for column in &partition_columns {
            if find_column(columns, column.source()).is_none() {
                return Err(Error::InvalidInput(format!(
                    "Partition column '{}' not found in result columns",
                    column.source()
                )));
            }
        }
        // Virtual columns are not result columns, so nothing is dropped here.
        let data_columns = columns.to_vec();

        std::fs::create_dir_all(&root).map_err(|e| Error::OperationFailed {
            operation: "create_partition_root".to_string(),
            cause: format!("{}: {e}", root.display()),
        })?;

        let capacity = NonZeroUsize::new(options.max_open_files).unwrap_or(NonZeroUsize::MIN);
        tracing::debug!(
            root = %root.display(),
            partitions = ?options.columns,
            max_open_files = capacity.get(),
            max_file_size = options.max_file_size,
            "Creating partitioned dataset"
        );
        Ok(Self {
            root,
            partition_columns,
            data_columns,
            options,
            open: LruCache::new(capacity),
            partitions: BTreeMap::new(),
            rows: 0,
            evicted: 0,
        })
    }

    /// Number of currently open files.
    #[must_use]
    pub fn open_files(&self) -> usize {
        self.open.len()
    }

    fn open_part(&mut self, key: &PartitionKey) -> Result<PartFile> {
        let dir = self.root.join(key.relative_dir());
        std::fs::create_dir_all(&dir).map_err(|e| Error::OperationFailed {
            operation: "create_partition_dir".to_string(),
            cause: format!("{}: {e}", dir.display()),
        })?;
        let state = self.partitions.entry(key.clone()).or_default();
        let path = dir.join(format!("part-{:05}.parquet", state.next_part));
        state.next_part += 1;
        state.files += 1;
        tracing::debug!(path = %path.display(), "Opening partition file");
        ColumnarWriter::new(super::create_file(&path)?, &self.data_columns, self.options.columnar)
    }

    fn close_part(key: &PartitionKey, file: PartFile) -> Result<()> {
        let rows = file.finish()?;
        tracing::debug!(partition = %key, rows, "Closed partition file");
        Ok(())
    }
}

impl RowWriter for PartitionedWriter {
    fn write_row(&mut self, row: &RowRecord) -> Result<()> {
        let key = PartitionKey::for_row(&self.partition_columns, row);

        let rotate = self
            .open
            .peek(&key)
            .is_some_and(|f| f.rows() > 0 && f.estimated_size() >= self.options.max_file_size);
        if rotate && let Some(full) = self.open.pop(&key) {
            Self::close_part(&key, full)?;
            metrics::counter!("tablecopy_files_rotated_total").increment(1);
        }

        if !self.open.contains(&key) {
            // Close the least recently used file before creating the next one.
            if self.open.len() >= self.open.cap().get()
                && let Some((old_key, old_file)) = self.open.pop_lru()
            {
                self.evicted += 1;
                metrics::counter!("tablecopy_file_handles_evicted_total").increment(1);
                tracing::debug!(partition = %old_key, "Evicting least recently used file");
                Self::close_part(&old_key, old_file)?;
            }
            let file = self.open_part(&key)?;
            self.open.put(key.clone(), file);
        }

        let file = self
            .open
            .get_mut(&key)
            .ok_or_else(|| Error::OperationFailed {
                operation: "write_partition".to_string(),
                cause: format!("no open file for partition {key}"),
            })?;
        file.write_row(row)?;
        if let Some(state) = self.partitions.get_mut(&key) {
            state.rows += 1;
        }
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for (_, file) in self.open.iter_mut() {
            file.flush()?;
        }
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<WriteReport> {
        let mut first_error = None;
        while let Some((key, file)) = self.open.pop_lru() {
            if let Err(e) = Self::close_part(&key, file) {
                tracing::warn!(partition = %key, error = %e, "Failed to close partition file");
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        let partitions: Vec<PartitionReport> = self
            .partitions
            .iter()
            .map(|(key, state)| PartitionReport {
                key: key.to_string(),
                rows: state.rows,
                files: state.files,
            })
            .collect();
        Ok(WriteReport {
            rows_written: self.rows,
            files_written: partitions.iter().map(|p| p.files).sum(),
            partitions,
            handles_evicted: self.evicted,
        })
    }
}

/// A data file discovered under a dataset root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFile {
    /// File path.
    pub path: PathBuf,
    /// `(column, unescaped value)` pairs from the directory names; `None`
    /// stands for null.
    pub values: Vec<(String, Option<String>)>,
}

impl PartitionFile {
    fn matches(&self, filter: &[(String, String)]) -> bool {
        filter.iter().all(|(column, wanted)| {
            self.values
                .iter()
                .any(|(k, v)| k == column && v.as_deref().unwrap_or(NULL_SEGMENT) == wanted)
        })
    }
}

/// Lists every `.parquet` file below `root` in path order.
///
/// # Errors
///
/// Returns an error if a directory cannot be read.
pub fn discover_files(root: &Path) -> Result<Vec<PartitionFile>> {
    let mut paths = Vec::new();
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|e| Error::OperationFailed {
            operation: "read_partition_dir".to_string(),
            cause: format!("{}: {e}", dir.display()),
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path);
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("parquet"))
            {
                paths.push(path);
            }
        }
    }
    paths.sort();

    Ok(paths
        .into_iter()
        .map(|path| {
            let values = path
                .strip_prefix(root)
                .ok()
                .and_then(Path::parent)
                .map(|rel| {
                    rel.components()
                        .filter_map(|c| c.as_os_str().to_str())
                        .filter_map(|segment| segment.split_once('='))
                        .filter(|(k, _)| !k.is_empty())
                        .map(|(k, v)| (k.to_string(), unescape_value(v)))
                        .collect()
                })
                .unwrap_or_default();
            PartitionFile { path, values }
        })
        .collect())
}

fn typed_partition_value(value: Option<&str>) -> RowValue {
    match value {
        None | Some("") => RowValue::Null,
        Some(v) => v
            .parse::<i64>()
            .map(RowValue::Int)
            .or_else(|_| v.parse::<f64>().map(RowValue::Float))
            .unwrap_or_else(|_| RowValue::text(v)),
    }
}

/// Reader for a partitioned dataset.
///
/// Files are read one after another in path order. Partition values from
/// the directory names are added to rows that lack the column; virtual
/// (dotted) partition columns are never added.
pub struct PartitionedReader {
    pending: VecDeque<PartitionFile>,
    current: Option<(ColumnarReader, Vec<(String, RowValue)>)>,
    columns: Vec<ColumnSpec>,
    options: ColumnarOptions,
    info: DatasetInfo,
}

impl PartitionedReader {
    /// Opens a dataset, keeping only files whose partition values match every
    /// `(column, value)` pair of `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root holds no Parquet files or the first file
    /// cannot be read.
    pub fn open(root: &Path, options: ColumnarOptions, filter: Vec<(String, String)>) -> Result<Self> {
        let files = discover_files(root)?;
        let Some(first) = files.first() else {
            return Err(Error::InvalidInput(format!(
                "No Parquet files found in directory: {}",
                root.display()
            )));
        };

        let mut columns = ColumnarReader::open(&first.path, options)?.schema().to_vec();
        for (key, _) in &first.values {
            if !key.contains('.') && find_column(&columns, key).is_none() {
                columns.push(ColumnSpec::untyped(key.clone()));
            }
        }

        let total = files.len();
        let pending: VecDeque<PartitionFile> =
            files.into_iter().filter(|f| f.matches(&filter)).collect();
        let partitions: BTreeSet<_> = pending.iter().filter_map(|f| f.path.parent()).collect();
        let info = DatasetInfo {
            files: pending.len(),
            partitions: partitions.len(),
        };
        tracing::debug!(
            root = %root.display(),
            files = total,
            selected = pending.len(),
            "Discovered partitioned dataset"
        );
        Ok(Self {
            pending,
            current: None,
            columns,
            options,
            info,
        })
    }

    /// Makes sure a file is open unless the dataset is exhausted.
    fn advance(&mut self) -> Result<bool> {
        if self.current.is_some() {
            return Ok(true);
        }
        let Some(file) = self.pending.pop_front() else {
            return Ok(false);
        };
        tracing::debug!(path = %file.path.display(), "Opening partition file");
        let reader = ColumnarReader::open(&file.path, self.options)?;
        let extra = file
            .values
            .iter()
            .filter(|(k, _)| !k.contains('.'))
            .map(|(k, v)| (k.clone(), typed_partition_value(v.as_deref())))
            .collect();
        self.current = Some((reader, extra));
        Ok(true)
    }
}

impl RowReader for PartitionedReader {
    fn schema(&self) -> &[ColumnSpec] {
        &self.columns
    }

    fn read_batch(&mut self, max: usize) -> Result<ReadBatch> {
        let mut batch = ReadBatch::default();
        while batch.records.len() < max && self.advance()? {
            let Some((reader, extra)) = self.current.as_mut() else {
                break;
            };
            let part = reader.read_batch(max - batch.records.len())?;
            for record in part.records {
                batch.records.push(record.map(|mut row| {
                    for (k, v) in extra.iter() {
                        if !row.contains(k) {
                            row.insert(k.clone(), v.clone());
                        }
                    }
                    row
                }));
            }
            if part.end_of_data {
                self.current = None;
            }
        }
        batch.end_of_data = self.current.is_none() && self.pending.is_empty();
        Ok(batch)
    }

    fn skip(&mut self, n: u64) -> Result<u64> {
        let mut skipped = 0;
        while skipped < n && self.advance()? {
            let Some((reader, _)) = self.current.as_mut() else {
                break;
            };
            let done = reader.skip(n - skipped)?;
            skipped += done;
            if skipped < n {
                self.current = None;
            }
        }
        Ok(skipped)
    }

    fn dataset(&self) -> Option<DatasetInfo> {
        Some(self.info)
    }
}
