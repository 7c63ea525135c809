//! Transfer specification built once per `COPY` command.

use super::options::CopyOptions;
use crate::io::formats::Format;
use crate::{Error, Result};
use std::fmt;
use std::path::PathBuf;

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `COPY ... TO`: table to file.
    Export,
    /// `COPY ... FROM`: file to table.
    Import,
}

/// Where rows come from or go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A file, or a directory root for partitioned datasets.
    Path(PathBuf),
    /// Standard output.
    Stdout,
    /// Standard input.
    Stdin,
}

impl Target {
    /// Returns the path, if the target is a path.
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Path(p) => Some(p),
            Self::Stdout | Self::Stdin => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::Stdout => write!(f, "STDOUT"),
            Self::Stdin => write!(f, "STDIN"),
        }
    }
}

/// Immutable description of one `COPY` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSpec {
    /// Table name, optionally keyspace qualified.
    pub table: String,
    /// Explicit column list; empty means all columns.
    pub columns: Vec<String>,
    /// Export or import.
    pub direction: Direction,
    /// Source or destination.
    pub target: Target,
    /// `WITH` options.
    pub options: CopyOptions,
}

impl TransferSpec {
    /// Creates an export spec with default options.
    #[must_use]
    pub fn export(table: impl Into<String>, target: Target) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            direction: Direction::Export,
            target,
            options: CopyOptions::new(),
        }
    }

    /// Creates an import spec with default options.
    #[must_use]
    pub fn import(table: impl Into<String>, target: Target) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            direction: Direction::Import,
            target,
            options: CopyOptions::new(),
        }
    }

    /// Sets the explicit column list.
    #[must_use]
    pub fn with_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets an option.
    #[must_use]
    pub fn with_option(mut self, key: &str, value: impl Into<String>) -> Self {
        self.options.set(key, value);
        self
    }

    /// Sets all options at once.
    #[must_use]
    pub fn with_options(mut self, options: CopyOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolves the data format.
    ///
    /// An explicit `FORMAT` option wins. A `PARTITION` or `PARTITION_FILTER`
    /// option, or importing from a directory, implies columnar. Then the file
    /// extension decides, and everything else is delimited.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown `FORMAT` value.
    pub fn format(&self) -> Result<Format> {
        if let Some(name) = self.options.format() {
            return name.parse();
        }
        if !self.options.partition_columns().is_empty()
            || !self.options.partition_filter().is_empty()
        {
            return Ok(Format::Columnar);
        }
        if self.direction == Direction::Import
            && let Some(path) = self.target.path()
            && path.is_dir()
        {
            return Ok(Format::Columnar);
        }
        Ok(self
            .target
            .path()
            .and_then(Format::from_path)
            .unwrap_or(Format::Delimited))
    }

    /// Returns whether the export writes a partitioned dataset.
    #[must_use]
    pub fn is_partitioned(&self) -> bool {
        !self.options.partition_columns().is_empty()
    }

    /// Splits `keyspace.table` into its parts.
    #[must_use]
    pub fn keyspace_and_table(&self) -> (Option<&str>, &str) {
        split_table_name(&self.table)
    }

    /// Validates combinations that can be rejected before any I/O.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a direction/target mismatch, STDIN
    /// or STDOUT with a columnar format, or partitioning a non-columnar export.
    pub fn validate(&self) -> Result<Format> {
        let format = self.format()?;
        match (self.direction, &self.target) {
            (Direction::Export, Target::Stdin) => {
                return Err(Error::InvalidInput(
                    "COPY TO cannot write to STDIN".to_string(),
                ));
            },
            (Direction::Import, Target::Stdout) => {
                return Err(Error::InvalidInput(
                    "COPY FROM cannot read from STDOUT".to_string(),
                ));
            },
            (Direction::Import, Target::Stdin) if format == Format::Columnar => {
                return Err(Error::InvalidInput(
                    "STDIN is not supported for columnar format; use a file path".to_string(),
                ));
            },
            (Direction::Export, Target::Stdout) if format == Format::Columnar => {
                return Err(Error::InvalidInput(
                    "STDOUT is not supported for columnar format; use a file path".to_string(),
                ));
            },
            _ => {},
        }
        if self.direction == Direction::Export && self.is_partitioned() && format != Format::Columnar
        {
            return Err(Error::InvalidInput(format!(
                "PARTITION requires columnar format, got {format}"
            )));
        }
        Ok(format)
    }
}

/// Splits `keyspace.table` into `(Some(keyspace), table)`.
#[must_use]
pub fn split_table_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((ks, table)) => (Some(ks), table),
        None => (None, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_resolution() {
        let spec = TransferSpec::export("t", Target::Path("out.parquet".into()));
        assert_eq!(spec.format().unwrap(), Format::Columnar);

        let spec = TransferSpec::export("t", Target::Path("out.parquet".into()))
            .with_option("FORMAT", "csv");
        assert_eq!(spec.format().unwrap(), Format::Delimited);

        let spec = TransferSpec::export("t", Target::Path("dataset".into()))
            .with_option("PARTITION", "year");
        assert_eq!(spec.format().unwrap(), Format::Columnar);

        let spec = TransferSpec::export("t", Target::Stdout);
        assert_eq!(spec.format().unwrap(), Format::Delimited);
    }

    #[test]
    fn test_directory_import_is_columnar() {
        let dir = tempfile::TempDir::new().unwrap();
        let spec = TransferSpec::import("t", Target::Path(dir.path().to_path_buf()));
        assert_eq!(spec.format().unwrap(), Format::Columnar);

        let spec = TransferSpec::import("t", Target::Path("missing".into()))
            .with_option("PARTITION_FILTER", "year=2024");
        assert_eq!(spec.format().unwrap(), Format::Columnar);
    }

    #[test]
    fn test_stdin_columnar_rejected() {
        let spec =
            TransferSpec::import("t", Target::Stdin).with_option("FORMAT", "columnar");
        let err = spec.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_partitioned_csv_rejected() {
        let spec = TransferSpec::export("t", Target::Path("out".into()))
            .with_option("PARTITION", "year")
            .with_option("FORMAT", "csv");
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_split_table_name() {
        assert_eq!(split_table_name("ks.users"), (Some("ks"), "users"));
        assert_eq!(split_table_name("users"), (None, "users"));
    }
}
