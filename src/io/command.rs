//! `COPY` command parsing.
//!
//! ```text
//! COPY <table> [(<col>, ...)] TO   ('<path>' | STDOUT) [WITH <opt>=<val> [AND <opt>=<val>]...]
//! COPY <table> [(<col>, ...)] FROM ('<path>' | STDIN)  [WITH <opt>=<val> [AND <opt>=<val>]...]
//! ```
//!
//! Keywords are case-insensitive. Paths may be single or double quoted, and
//! a leading `~/` is expanded to the home directory. Option values may be
//! bare or quoted; quotes are removed before the value is stored.

use crate::models::{CopyOptions, Target, TransferSpec};
use crate::{Error, Result};
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

/// The whole command.
static COPY_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^\s*COPY\s+([\w."]+)\s*(?:\(([^)]*)\))?\s*\b(TO|FROM)\s+('(?:[^']|'')*'|"[^"]*"|[^\s;]+)(?:\s+WITH\s+(.*?))?\s*;?\s*$"#,
    )
    .unwrap_or_else(|_| unreachable!())
});

/// One `key = value` pair of the `WITH` clause.
static OPTION_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([A-Za-z_][\w]*)\s*=\s*('(?:[^']|'')*'|"[^"]*"|[^\s;]+)"#)
        .unwrap_or_else(|_| unreachable!())
});

/// Returns whether a line of input is a `COPY` command.
#[must_use]
pub fn is_copy_command(line: &str) -> bool {
    line.trim_start()
        .get(..4)
        .is_some_and(|word| word.eq_ignore_ascii_case("COPY"))
}

/// Parses a `COPY` command into a transfer spec.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the command does not match the grammar.
pub fn parse_copy_command(command: &str) -> Result<TransferSpec> {
    let caps = COPY_COMMAND
        .captures(command)
        .ok_or_else(|| Error::InvalidInput(format!("Improper COPY command: {}", command.trim())))?;

    let table = caps[1].replace('"', "");
    let target = parse_target(&caps[4]);
    let mut spec = if caps[3].eq_ignore_ascii_case("TO") {
        TransferSpec::export(table, target)
    } else {
        TransferSpec::import(table, target)
    };

    if let Some(columns) = caps.get(2) {
        let names: Vec<String> = columns
            .as_str()
            .split(',')
            .map(|c| c.trim().trim_matches('"').to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if names.is_empty() {
            return Err(Error::InvalidInput("Empty column list in COPY command".to_string()));
        }
        spec = spec.with_columns(names);
    }

    if let Some(clause) = caps.get(5) {
        spec = spec.with_options(parse_options(clause.as_str())?);
    }
    Ok(spec)
}

/// Parses the body of a `WITH` clause.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if a part of the clause is not a
/// `key = value` pair.
pub fn parse_options(clause: &str) -> Result<CopyOptions> {
    let mut options = CopyOptions::new();
    let mut consumed = 0;
    for caps in OPTION_PAIR.captures_iter(clause) {
        let Some(whole) = caps.get(0) else { continue };
        let gap = clause[consumed..whole.start()].trim();
        if !(gap.is_empty() || (consumed > 0 && gap.eq_ignore_ascii_case("AND"))) {
            return Err(Error::InvalidInput(format!("Unexpected text in WITH clause: {gap}")));
        }
        options.set(&caps[1], unquote(&caps[2]));
        consumed = whole.end();
    }
    let rest = clause[consumed..].trim();
    if !rest.is_empty() {
        return Err(Error::InvalidInput(format!("Unexpected text in WITH clause: {rest}")));
    }
    Ok(options)
}

fn parse_target(raw: &str) -> Target {
    if raw.eq_ignore_ascii_case("STDOUT") {
        return Target::Stdout;
    }
    if raw.eq_ignore_ascii_case("STDIN") {
        return Target::Stdin;
    }
    Target::Path(expand_home(&unquote(raw)))
}

fn unquote(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        raw[1..raw.len() - 1].replace("''", "'")
    } else if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        raw[1..raw.len() - 1].to_string()
    } else {
        raw.to_string()
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(dirs) = directories::BaseDirs::new()
    {
        return dirs.home_dir().join(rest);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use test_case::test_case;

    #[test]
    fn test_parse_export() {
        let spec = parse_copy_command(
            "copy ks.users (id, name) TO '/tmp/users.csv' WITH HEADER=true AND DELIMITER='|';",
        )
        .unwrap();
        assert_eq!(spec.table, "ks.users");
        assert_eq!(spec.columns, vec!["id", "name"]);
        assert_eq!(spec.direction, Direction::Export);
        assert_eq!(spec.target, Target::Path(PathBuf::from("/tmp/users.csv")));
        assert!(spec.options.header());
        assert_eq!(spec.options.delimiter(), b'|');
    }

    #[test]
    fn test_parse_import_from_stdin() {
        let spec = parse_copy_command("COPY users FROM stdin").unwrap();
        assert_eq!(spec.direction, Direction::Import);
        assert_eq!(spec.target, Target::Stdin);
        assert!(spec.columns.is_empty());
    }

    #[test]
    fn test_quoted_values() {
        let spec = parse_copy_command(
            r#"COPY t TO 'it''s.parquet' WITH PARTITION='year,month' AND NULLVAL="N/A""#,
        )
        .unwrap();
        assert_eq!(spec.target, Target::Path(PathBuf::from("it's.parquet")));
        assert_eq!(spec.options.partition_columns(), vec!["year", "month"]);
        assert_eq!(spec.options.null_token(), "N/A");
    }

    #[test]
    fn test_with_and_is_case_insensitive() {
        let spec =
            parse_copy_command("COPY t FROM 'a.csv' with skiprows = 2 and maxrows = 5").unwrap();
        assert_eq!(spec.options.skip_rows(), 2);
        assert_eq!(spec.options.max_rows(), Some(5));
    }

    #[test_case("COPY" ; "missing table")]
    #[test_case("COPY t INTO 'x.csv'" ; "unknown direction")]
    #[test_case("COPY t () TO 'x.csv'" ; "empty column list")]
    #[test_case("COPY t TO 'x.csv' WITH HEADER" ; "option without value")]
    #[test_case("COPY t TO 'x.csv' WITH HEADER=true OR X=1" ; "bad separator")]
    fn test_rejects_malformed(command: &str) {
        assert!(matches!(parse_copy_command(command), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_is_copy_command() {
        assert!(is_copy_command("  copy t TO STDOUT"));
        assert!(!is_copy_command("SELECT * FROM t"));
        assert!(!is_copy_command("cop"));
    }
}
