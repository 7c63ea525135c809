//! `COPY` command execution.
//!
//! [`CopyService`] is the boundary between the shell and the pipelines. It
//! resolves options, format, table name and columns, rejects invalid
//! combinations before touching any file, then runs the export or import
//! pipeline and renders a one-paragraph status.

use super::export::{ExportPipeline, ExportReport};
use super::import::{ImportPipeline, ImportReport, ProgressCallback};
use crate::io::budget::{ErrorKind, render_samples};
use crate::io::command::parse_copy_command;
use crate::io::formats::{Format, ReadSource, ReaderColumns, WriteDestination, open_reader};
use crate::models::{ColumnSpec, CopyOptions, Direction, Target, TransferSpec, find_column};
use crate::session::{SchemaCache, Session};
use crate::{Error, Result};
use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Outcome of one `COPY` command.
#[derive(Debug)]
pub enum TransferSummary {
    /// `COPY ... TO`.
    Export {
        /// Where rows went.
        destination: String,
        /// Data format written.
        format: Format,
        /// Whether a partitioned dataset was written.
        partitioned: bool,
        /// Pipeline report.
        report: ExportReport,
    },
    /// `COPY ... FROM`.
    Import {
        /// Where rows came from.
        source: String,
        /// Pipeline report.
        report: ImportReport,
    },
}

impl fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Export {
                destination,
                format,
                partitioned,
                report,
            } => {
                let rows = report.rows_exported;
                if let Some(failure) = &report.failure {
                    return write!(f, "Export to {destination} failed after {rows} rows: {failure}");
                }
                if *partitioned {
                    write!(
                        f,
                        "Exported {rows} rows to {} partitions in {destination} ({} files)",
                        report.partitions.len(),
                        report.files_written
                    )
                } else if *format == Format::Columnar {
                    write!(f, "Exported {rows} rows to {destination} (Parquet format)")
                } else {
                    write!(f, "Exported {rows} rows to {destination}")
                }
            },
            Self::Import { source, report } => {
                let rows = report.rows_succeeded;
                if let Some(trip) = report.aborted {
                    let kind = trip.kind.as_str();
                    let title = match trip.kind {
                        ErrorKind::Parse => "Too many parse errors",
                        ErrorKind::Insert => "Too many insert errors",
                    };
                    write!(
                        f,
                        "{title}. Imported {rows} rows, failed after {} {kind} errors",
                        trip.count
                    )?;
                } else {
                    match report.dataset {
                        Some(info) => write!(
                            f,
                            "Imported {rows} rows from partitioned dataset ({} files, {} partitions)",
                            info.files, info.partitions
                        )?,
                        None => write!(f, "Imported {rows} rows from {source}")?,
                    }
                    if report.skipped_rows > 0 {
                        write!(f, " (skipped {} rows)", report.skipped_rows)?;
                    }
                    if report.parse_errors > 0 {
                        write!(f, " ({} parse errors)", report.parse_errors)?;
                    }
                    if report.insert_errors > 0 {
                        write!(f, " ({} insert errors)", report.insert_errors)?;
                    }
                }
                f.write_str(&render_samples(
                    &report.samples,
                    report.parse_errors + report.insert_errors,
                ))
            },
        }
    }
}

/// Runs `COPY` commands against a session.
pub struct CopyService<'a> {
    session: &'a dyn Session,
    schema: Option<&'a dyn SchemaCache>,
    defaults: CopyOptions,
    progress: Option<ProgressCallback>,
}

impl<'a> CopyService<'a> {
    /// Creates a service without schema information.
    #[must_use]
    pub fn new(session: &'a dyn Session) -> Self {
        Self {
            session,
            schema: None,
            defaults: CopyOptions::new(),
            progress: None,
        }
    }

    /// Uses `schema` for column lists and types.
    #[must_use]
    pub fn with_schema_cache(mut self, schema: &'a dyn SchemaCache) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Option values used when a command does not set them.
    #[must_use]
    pub fn with_defaults(mut self, defaults: CopyOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Receives import progress every `CHUNKSIZE` records.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Parses and runs a command, returning its status text.
    ///
    /// Never fails: errors are rendered into the status.
    pub fn execute(&self, command: &str) -> String {
        match parse_copy_command(command).and_then(|spec| self.run(&spec)) {
            Ok(summary) => summary.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "COPY failed");
                format!("Error: {e}")
            },
        }
    }

    /// Runs a transfer using the process standard streams.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid transfers and I/O failures at the
    /// pipeline boundary.
    pub fn run(&self, spec: &TransferSpec) -> Result<TransferSummary> {
        let mut stdout = std::io::stdout();
        self.run_with_stdio(spec, Box::new(std::io::stdin()), &mut stdout)
    }

    /// Runs a transfer with the given streams standing in for STDIN and
    /// STDOUT.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid transfers and I/O failures at the
    /// pipeline boundary.
    pub fn run_with_stdio(
        &self,
        spec: &TransferSpec,
        stdin: Box<dyn Read + Send>,
        stdout: &mut (dyn Write + Send),
    ) -> Result<TransferSummary> {
        let options = spec.options.clone().with_fallback(&self.defaults);
        let spec = spec.clone().with_options(options);
        let format = spec.validate()?;
        let table = self.qualified_table(&spec);
        let table_columns = self.table_columns(&spec);

        let _span = tracing::info_span!(
            "copy",
            table = %table,
            direction = ?spec.direction,
            target = %spec.target
        )
        .entered();

        if let Some(known) = &table_columns {
            for name in &spec.columns {
                if find_column(known, name).is_none() {
                    return Err(Error::InvalidInput(format!(
                        "Column '{name}' not found in table {table}"
                    )));
                }
            }
        }

        match spec.direction {
            Direction::Export => self.export(&spec, format, &table, stdout),
            Direction::Import => self.import(&spec, format, &table, table_columns, stdin),
        }
    }

    fn export(
        &self,
        spec: &TransferSpec,
        format: Format,
        table: &str,
        stdout: &mut (dyn Write + Send),
    ) -> Result<TransferSummary> {
        let partitioned = spec.is_partitioned();
        let (destination, label) = match &spec.target {
            Target::Path(path) => {
                let path = export_path(path, format, partitioned);
                let label = path.display().to_string();
                (WriteDestination::Path(path), label)
            },
            Target::Stdout | Target::Stdin => (WriteDestination::Stream(stdout), "STDOUT".to_string()),
        };
        let report = ExportPipeline::new(self.session, table, &spec.columns, &spec.options, format)
            .run(destination)?;
        Ok(TransferSummary::Export {
            destination: label,
            format,
            partitioned,
            report,
        })
    }

    fn import(
        &self,
        spec: &TransferSpec,
        format: Format,
        table: &str,
        table_columns: Option<Vec<ColumnSpec>>,
        stdin: Box<dyn Read + Send>,
    ) -> Result<TransferSummary> {
        let known = table_columns.unwrap_or_default();
        let source = match &spec.target {
            Target::Path(path) => ReadSource::Path(path.clone()),
            Target::Stdin | Target::Stdout => ReadSource::Stream(stdin),
        };
        let reader = open_reader(
            format,
            source,
            &spec.options,
            ReaderColumns {
                explicit: &spec.columns,
                table: &known,
            },
        )?;
        let columns = resolve_import_columns(&spec.columns, reader.schema(), &known, table)?;
        tracing::debug!(columns = columns.len(), "Resolved import columns");

        let report = ImportPipeline::new(self.session, table, columns, &spec.options)
            .with_progress(self.progress.as_ref())
            .run(reader)?;
        Ok(TransferSummary::Import {
            source: spec.target.to_string(),
            report,
        })
    }

    /// Table name as statements should use it.
    fn qualified_table(&self, spec: &TransferSpec) -> String {
        match spec.keyspace_and_table() {
            (Some(_), _) => spec.table.clone(),
            (None, name) => self
                .session
                .current_keyspace()
                .map_or_else(|| name.to_string(), |ks| format!("{ks}.{name}")),
        }
    }

    fn table_columns(&self, spec: &TransferSpec) -> Option<Vec<ColumnSpec>> {
        let cache = self.schema?;
        let (keyspace, name) = spec.keyspace_and_table();
        let keyspace = keyspace
            .map(ToString::to_string)
            .or_else(|| self.session.current_keyspace());
        cache.table_columns(keyspace.as_deref(), name)
    }
}

impl fmt::Debug for CopyService<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyService")
            .field("defaults", &self.defaults)
            .field("has_schema_cache", &self.schema.is_some())
            .field("has_progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

/// A single columnar file gets a `.parquet` extension when it has none.
fn export_path(path: &std::path::Path, format: Format, partitioned: bool) -> PathBuf {
    if format == Format::Columnar && !partitioned && path.extension().is_none() {
        path.with_extension(format.extension())
    } else {
        path.to_path_buf()
    }
}

/// Picks the columns to insert.
///
/// Explicit names must exist in the source; otherwise the source schema is
/// used as is. Types missing from the source are taken from the table.
fn resolve_import_columns(
    explicit: &[String],
    source: &[ColumnSpec],
    table: &[ColumnSpec],
    table_name: &str,
) -> Result<Vec<ColumnSpec>> {
    let selected: Vec<ColumnSpec> = if explicit.is_empty() {
        source.to_vec()
    } else {
        explicit
            .iter()
            .map(|name| {
                find_column(source, name).cloned().ok_or_else(|| {
                    Error::InvalidInput(format!("Column '{name}' not found in source"))
                })
            })
            .collect::<Result<_>>()?
    };
    if selected.is_empty() {
        return Err(Error::InvalidInput(format!(
            "Cannot determine columns for table {table_name}. Please specify columns explicitly."
        )));
    }
    Ok(selected
        .into_iter()
        .map(|mut column| {
            if column.column_type.is_none()
                && let Some(known) = find_column(table, &column.name)
            {
                column.column_type.clone_from(&known.column_type);
            }
            column
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnType, RowRecord, RowValue};
    use crate::session::MemorySession;
    use tempfile::TempDir;

    fn session() -> MemorySession {
        let session = MemorySession::new().with_keyspace("ks");
        session
            .create_table(
                "users",
                vec![
                    ColumnSpec::new("id", ColumnType::Int),
                    ColumnSpec::new("name", ColumnType::Text),
                ],
            )
            .unwrap();
        session
    }

    fn seed(session: &MemorySession, rows: i64) {
        for id in 1..=rows {
            session
                .insert(
                    "users",
                    RowRecord::new()
                        .with("id", RowValue::Int(id))
                        .with("name", RowValue::text(format!("n{id}"))),
                )
                .unwrap();
        }
    }

    #[test]
    fn test_export_then_import_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.csv");
        let source = session();
        seed(&source, 3);
        let service = CopyService::new(&source).with_schema_cache(&source);
        let status = service.execute(&format!(
            "COPY users TO '{}' WITH HEADER=true",
            path.display()
        ));
        assert_eq!(status, format!("Exported 3 rows to {}", path.display()));

        let target = session();
        let service = CopyService::new(&target).with_schema_cache(&target);
        let status = service.execute(&format!(
            "COPY users FROM '{}' WITH HEADER=true",
            path.display()
        ));
        assert_eq!(status, format!("Imported 3 rows from {}", path.display()));
        assert_eq!(target.rows("users").len(), 3);
    }

    #[test]
    fn test_stdin_with_columnar_is_rejected_before_io() {
        let session = session();
        let service = CopyService::new(&session);
        let status = service.execute("COPY users FROM STDIN WITH FORMAT='columnar'");
        assert!(status.starts_with("Error: "), "{status}");
        assert!(status.contains("STDIN is not supported"));
        assert_eq!(session.statements_executed(), 0);
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let session = session();
        let service = CopyService::new(&session).with_schema_cache(&session);
        let status = service.execute("COPY users (id, nope) TO STDOUT");
        assert!(status.contains("Column 'nope' not found"), "{status}");
    }

    #[test]
    fn test_import_from_stdin_stream() {
        let session = session();
        let service = CopyService::new(&session).with_schema_cache(&session);
        let spec = parse_copy_command("COPY users FROM STDIN WITH SKIPROWS=1").unwrap();
        let input = "1,a\n2,b\n3,c\n";
        let mut out: Vec<u8> = Vec::new();
        let summary = service
            .run_with_stdio(&spec, Box::new(std::io::Cursor::new(input)), &mut out)
            .unwrap();
        assert_eq!(summary.to_string(), "Imported 2 rows from STDIN (skipped 1 rows)");
    }

    #[test]
    fn test_export_to_stdout_stream() {
        let session = session();
        seed(&session, 2);
        let service = CopyService::new(&session);
        let spec = parse_copy_command("COPY users (name) TO STDOUT").unwrap();
        let mut out: Vec<u8> = Vec::new();
        service
            .run_with_stdio(&spec, Box::new(std::io::empty()), &mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "n1\nn2\n");
    }

    #[test]
    fn test_columnar_path_gets_extension() {
        let dir = TempDir::new().unwrap();
        let session = session();
        seed(&session, 1);
        let service = CopyService::new(&session);
        let path = dir.path().join("users");
        let status = service.execute(&format!(
            "COPY users TO '{}' WITH FORMAT=parquet",
            path.display()
        ));
        assert!(status.ends_with("users.parquet (Parquet format)"), "{status}");
        assert!(dir.path().join("users.parquet").is_file());
    }

    #[test]
    fn test_defaults_apply_when_command_is_silent() {
        let session = session();
        seed(&session, 2);
        let service = CopyService::new(&session)
            .with_defaults(CopyOptions::new().with("DELIMITER", "|").with("HEADER", "true"));
        let spec = parse_copy_command("COPY users TO STDOUT WITH HEADER=false").unwrap();
        let mut out: Vec<u8> = Vec::new();
        service
            .run_with_stdio(&spec, Box::new(std::io::empty()), &mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1|n1\n2|n2\n");
    }

    #[test]
    fn test_insert_abort_summary() {
        let session = session();
        session.fail_all_writes(true);
        let service = CopyService::new(&session).with_schema_cache(&session);
        let spec = parse_copy_command(
            "COPY users FROM STDIN WITH MAXINSERTERRORS=2 AND MAXBATCHSIZE=1 AND MAXREQUESTS=1",
        )
        .unwrap();
        let input: String = (1..=50).map(|i| format!("{i},x\n")).collect();
        let mut out: Vec<u8> = Vec::new();
        let summary = service
            .run_with_stdio(&spec, Box::new(std::io::Cursor::new(input)), &mut out)
            .unwrap()
            .to_string();
        assert!(
            summary.starts_with("Too many insert errors. Imported 0 rows, failed after 3 insert errors"),
            "{summary}"
        );
        assert!(summary.contains("First errors encountered:"));
    }
}
