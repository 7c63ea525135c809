//! In-memory session.
//!
//! Understands the two statement shapes the transfer engine emits:
//!
//! ```text
//! SELECT a, b FROM ks.t [LIMIT n]
//! INSERT INTO ks.t (a, b) VALUES (<literal>, <literal>)
//! ```
//!
//! Inserted literals are parsed with the column types of the table, so a
//! value that does not fit its column is rejected the way a server would
//! reject it. Tables are append-only.
//!
//! Failures can be injected for tests: every write, writes whose text
//! contains a pattern, or a query that breaks after a number of rows.

use super::{QueryResult, SchemaCache, Session};
use crate::io::literal::{conform, parse_value_list};
use crate::models::{ColumnSpec, RowRecord, RowValue, find_column, split_table_name};
use crate::{Error, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{LazyLock, Mutex, RwLock};

macro_rules! lazy_regex {
    ($pattern:expr) => {
        LazyLock::new(|| Regex::new($pattern).unwrap_or_else(|_| unreachable!()))
    };
}

/// `SELECT <columns> FROM <table> [LIMIT n]`.
static SELECT_PATTERN: LazyLock<Regex> =
    lazy_regex!(r#"(?is)^\s*SELECT\s+(.+?)\s+FROM\s+([\w."]+)(?:\s+LIMIT\s+(\d+))?\s*;?\s*$"#);

/// `INSERT INTO <table> (<columns>) VALUES (<values>)`.
static INSERT_PATTERN: LazyLock<Regex> =
    lazy_regex!(r#"(?is)^\s*INSERT\s+INTO\s+([\w."]+)\s*\(([^)]*)\)\s*VALUES\s*(\(.*\))\s*;?\s*$"#);

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<ColumnSpec>,
    rows: Vec<RowRecord>,
}

#[derive(Debug, Default)]
struct FailurePlan {
    all_writes: bool,
    writes_containing: Vec<String>,
    query_after_rows: Option<usize>,
}

/// Dataset file layout accepted by [`MemorySession::from_json_str`].
#[derive(Debug, Deserialize)]
struct Dataset {
    #[serde(default)]
    keyspace: Option<String>,
    #[serde(default)]
    tables: BTreeMap<String, TableData>,
}

#[derive(Debug, Deserialize)]
struct TableData {
    columns: Vec<ColumnSpec>,
    #[serde(default)]
    rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Session over in-memory tables.
#[derive(Debug, Default)]
pub struct MemorySession {
    tables: RwLock<BTreeMap<String, MemoryTable>>,
    keyspace: Option<String>,
    failures: Mutex<FailurePlan>,
    statements: AtomicU64,
}

impl MemorySession {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the keyspace for unqualified table names.
    #[must_use]
    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    /// Loads tables from a JSON dataset:
    ///
    /// ```json
    /// {"keyspace": "ks",
    ///  "tables": {"ks.users": {"columns": [{"name": "id", "type": "int"}],
    ///                          "rows": [{"id": 1}]}}}
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the document is malformed or a value
    /// does not fit its column.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let dataset: Dataset = serde_json::from_str(json)
            .map_err(|e| Error::InvalidInput(format!("Invalid dataset: {e}")))?;
        let mut session = Self::new();
        session.keyspace = dataset.keyspace;
        for (name, data) in dataset.tables {
            session.create_table(&name, data.columns.clone())?;
            for fields in data.rows {
                let mut row = RowRecord::with_capacity(data.columns.len());
                for (column, json) in &fields {
                    let value = RowValue::from_json(json);
                    let value = match find_column(&data.columns, column) {
                        Some(ColumnSpec {
                            column_type: Some(ty),
                            ..
                        }) => conform(value, ty).map_err(|e| {
                            Error::InvalidInput(format!("{name}.{column}: {e}"))
                        })?,
                        Some(_) => value,
                        None => {
                            return Err(Error::InvalidInput(format!(
                                "{name}: unknown column {column}"
                            )));
                        },
                    };
                    row.insert(column.clone(), value);
                }
                session.insert(&name, row)?;
            }
        }
        Ok(session)
    }

    /// Loads a JSON dataset from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_dataset".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_json_str(&json)
    }

    fn qualify(&self, table: &str) -> String {
        let (keyspace, name) = split_table_name(table);
        match keyspace.or(self.keyspace.as_deref()) {
            Some(ks) => format!("{ks}.{name}").to_lowercase(),
            None => name.to_lowercase(),
        }
    }

    /// Creates (or replaces) a table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the table lock is poisoned.
    pub fn create_table(&self, table: &str, columns: Vec<ColumnSpec>) -> Result<()> {
        let key = self.qualify(table);
        self.tables
            .write()
            .map_err(|_| lock_error("create_table"))?
            .insert(key, MemoryTable {
                columns,
                rows: Vec::new(),
            });
        Ok(())
    }

    /// Appends a row directly, bypassing statement parsing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Execution`] if the table does not exist.
    pub fn insert(&self, table: &str, row: RowRecord) -> Result<()> {
        let key = self.qualify(table);
        let mut tables = self.tables.write().map_err(|_| lock_error("insert"))?;
        let entry = tables
            .get_mut(&key)
            .ok_or_else(|| Error::Execution(format!("unconfigured table {key}")))?;
        entry.rows.push(row);
        Ok(())
    }

    /// Returns a copy of the rows of a table.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<RowRecord> {
        let key = self.qualify(table);
        self.tables
            .read()
            .ok()
            .and_then(|tables| tables.get(&key).map(|t| t.rows.clone()))
            .unwrap_or_default()
    }

    /// Names of all tables, qualified where a keyspace is known.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.tables
            .read()
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of write statements received, including failed ones.
    #[must_use]
    pub fn statements_executed(&self) -> u64 {
        self.statements.load(Ordering::SeqCst)
    }

    /// Makes every write statement fail.
    pub fn fail_all_writes(&self, fail: bool) {
        if let Ok(mut plan) = self.failures.lock() {
            plan.all_writes = fail;
        }
    }

    /// Makes write statements whose text contains `pattern` fail.
    pub fn fail_writes_containing(&self, pattern: impl Into<String>) {
        if let Ok(mut plan) = self.failures.lock() {
            plan.writes_containing.push(pattern.into());
        }
    }

    /// Makes the next queries fail after yielding `rows` rows.
    pub fn fail_query_after(&self, rows: usize) {
        if let Ok(mut plan) = self.failures.lock() {
            plan.query_after_rows = Some(rows);
        }
    }

    fn injected_write_failure(&self, statement: &str) -> Option<String> {
        let plan = self.failures.lock().ok()?;
        if plan.all_writes {
            return Some("simulated write timeout".to_string());
        }
        plan.writes_containing
            .iter()
            .find(|p| statement.contains(p.as_str()))
            .map(|p| format!("simulated write failure for '{p}'"))
    }

    fn table_snapshot(&self, table: &str) -> Result<(String, MemoryTable)> {
        let key = self.qualify(table);
        let tables = self.tables.read().map_err(|_| lock_error("read_table"))?;
        let found = tables
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::Execution(format!("unconfigured table {key}")))?;
        Ok((key, found))
    }
}

fn lock_error(operation: &str) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: "table lock poisoned".to_string(),
    }
}

fn split_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(|c| c.trim().trim_matches('"').to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

impl Session for MemorySession {
    fn execute_query(&self, statement: &str, page_size: usize) -> Result<QueryResult> {
        let caps = SELECT_PATTERN
            .captures(statement)
            .ok_or_else(|| Error::Execution(format!("unsupported query: {statement}")))?;
        let (key, table) = self.table_snapshot(&caps[2])?;

        let columns: Vec<ColumnSpec> = if caps[1].trim() == "*" {
            table.columns.clone()
        } else {
            split_names(&caps[1])
                .into_iter()
                .map(|name| {
                    find_column(&table.columns, &name)
                        .cloned()
                        .ok_or_else(|| Error::Execution(format!("Undefined column name {name}")))
                })
                .collect::<Result<_>>()?
        };
        let limit = caps
            .get(3)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(usize::MAX);
        tracing::debug!(table = %key, page_size, limit, "Running query");

        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let fail_after = self.failures.lock().ok().and_then(|plan| plan.query_after_rows);
        let rows = table
            .rows
            .into_iter()
            .take(limit)
            .map(move |row| row.project(&names))
            .enumerate()
            .map(move |(i, row)| match fail_after {
                Some(n) if i >= n => Err(Error::Execution(format!(
                    "simulated read failure after {n} rows"
                ))),
                _ => Ok(row),
            });
        let rows = match fail_after {
            Some(n) => Box::new(rows.take(n + 1)) as super::RowIterator,
            None => Box::new(rows),
        };
        Ok(QueryResult { columns, rows })
    }

    fn execute_statement(&self, statement: &str) -> Result<()> {
        self.statements.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.injected_write_failure(statement) {
            return Err(Error::Execution(message));
        }
        let caps = INSERT_PATTERN
            .captures(statement)
            .ok_or_else(|| Error::Execution(format!("unsupported statement: {statement}")))?;
        let key = self.qualify(&caps[1]);
        let names = split_names(&caps[2]);

        let mut tables = self.tables.write().map_err(|_| lock_error("insert"))?;
        let table = tables
            .get_mut(&key)
            .ok_or_else(|| Error::Execution(format!("unconfigured table {key}")))?;
        let types = names
            .iter()
            .map(|name| {
                find_column(&table.columns, name)
                    .map(|c| c.column_type.as_ref())
                    .ok_or_else(|| Error::Execution(format!("Undefined column name {name}")))
            })
            .collect::<Result<Vec<_>>>()?;
        let values = parse_value_list(&caps[3], &types)
            .map_err(|e| Error::Execution(format!("Invalid values: {e}")))?;
        table.rows.push(names.into_iter().zip(values).collect());
        Ok(())
    }

    fn current_keyspace(&self) -> Option<String> {
        self.keyspace.clone()
    }
}

impl SchemaCache for MemorySession {
    fn table_columns(&self, keyspace: Option<&str>, table: &str) -> Option<Vec<ColumnSpec>> {
        let name = match keyspace {
            Some(ks) => format!("{ks}.{table}"),
            None => table.to_string(),
        };
        let key = self.qualify(&name);
        self.tables
            .read()
            .ok()
            .and_then(|tables| tables.get(&key).map(|t| t.columns.clone()))
    }
}
