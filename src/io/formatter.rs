//! Value formatting for files and write statements.
//!
//! One formatter serves both directions of a transfer:
//!
//! | Style | Used for | Top-level text | Top-level timestamp | Null |
//! |-------|----------|----------------|---------------------|------|
//! | `File` | delimited export, partition paths | as is | bare ISO-8601 | NULL token |
//! | `Statement` | `INSERT` values | `'quoted'` | `'quoted'` ISO-8601 | `null` |
//!
//! Values nested inside collections are always written in literal form, so a
//! delimited field such as `{'a': 1}` can be read back by the literal parser.
//!
//! Formatting is deterministic and does not depend on the locale.

use crate::io::literal::looks_like_uuid;
use crate::models::{ColumnType, RowValue};
use chrono::SecondsFormat;
use std::fmt::Write as _;

/// Which kind of text the formatter produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralStyle {
    /// Field text for a data file.
    File,
    /// Literal text for a write statement.
    Statement,
}

/// Converts row values into file fields or statement literals.
#[derive(Debug, Clone)]
pub struct ValueFormatter {
    style: LiteralStyle,
    null_text: String,
}

impl ValueFormatter {
    /// Formatter for data files, writing `null_token` for nulls.
    #[must_use]
    pub fn for_file(null_token: impl Into<String>) -> Self {
        Self {
            style: LiteralStyle::File,
            null_text: null_token.into(),
        }
    }

    /// Formatter for write statements.
    #[must_use]
    pub fn for_statement() -> Self {
        Self {
            style: LiteralStyle::Statement,
            null_text: "null".to_string(),
        }
    }

    /// Returns the style.
    #[must_use]
    pub const fn style(&self) -> LiteralStyle {
        self.style
    }

    /// Formats one value of column `column`.
    #[must_use]
    pub fn format(&self, value: &RowValue, column: &str, ty: Option<&ColumnType>) -> String {
        let mut out = String::new();
        if self.style == LiteralStyle::File {
            self.write_field(&mut out, value, column, ty);
        } else {
            write_literal(&mut out, value, column, ty, &self.null_text);
        }
        out
    }

    fn write_field(&self, out: &mut String, value: &RowValue, column: &str, ty: Option<&ColumnType>) {
        match value {
            RowValue::Null => out.push_str(&self.null_text),
            RowValue::Text(s) => out.push_str(s),
            RowValue::Timestamp(ts) => {
                out.push_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true));
            },
            other => write_literal(out, other, column, ty, "null"),
        }
    }
}

fn write_literal(
    out: &mut String,
    value: &RowValue,
    column: &str,
    ty: Option<&ColumnType>,
    null_text: &str,
) {
    match value {
        RowValue::Null => out.push_str(null_text),
        RowValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        RowValue::Bytes(bytes) => {
            out.push_str("0x");
            out.push_str(&hex::encode(bytes));
        },
        RowValue::Timestamp(ts) => {
            out.push('\'');
            out.push_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true));
            out.push('\'');
        },
        RowValue::Text(s) => {
            if looks_like_uuid(s) && (ty.is_some_and(ColumnType::is_uuid) || is_id_column(column)) {
                out.push_str(s);
            } else {
                push_quoted(out, s);
            }
        },
        RowValue::Int(i) => {
            let _ = write!(out, "{i}");
        },
        RowValue::Float(f) => push_float(out, *f),
        RowValue::Decimal(d) => out.push_str(d),
        RowValue::List(items) => {
            let elem = ty.and_then(ColumnType::element);
            let (open, close) = if matches!(ty, Some(ColumnType::Set(_))) || is_set_column(column) {
                ('{', '}')
            } else {
                ('[', ']')
            };
            write_items(out, items, column, elem, open, close);
        },
        RowValue::Set(items) => {
            write_items(out, items, column, ty.and_then(ColumnType::element), '{', '}');
        },
        RowValue::Map(entries) => {
            let (kt, vt) = match ty {
                Some(ColumnType::Map(k, v)) => (Some(k.as_ref()), Some(v.as_ref())),
                _ => (None, None),
            };
            out.push('{');
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_literal(out, k, column, kt, "null");
                out.push_str(": ");
                write_literal(out, v, column, vt, "null");
            }
            out.push('}');
        },
        RowValue::Udt(fields) => {
            out.push('{');
            for (i, (name, v)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&quote_identifier(name));
                out.push_str(": ");
                write_literal(out, v, name, None, "null");
            }
            out.push('}');
        },
        RowValue::Tuple(items) => {
            let types = match ty {
                Some(ColumnType::Tuple(types)) => types.as_slice(),
                _ => &[],
            };
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_literal(out, item, column, types.get(i), "null");
            }
            out.push(')');
        },
    }
}

fn write_items(
    out: &mut String,
    items: &[RowValue],
    column: &str,
    elem: Option<&ColumnType>,
    open: char,
    close: char,
) {
    out.push(open);
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_literal(out, item, column, elem, "null");
    }
    out.push(close);
}

fn push_quoted(out: &mut String, s: &str) {
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
}

fn push_float(out: &mut String, f: f64) {
    if f.is_nan() {
        out.push_str("NaN");
    } else if f.is_infinite() {
        out.push_str(if f > 0.0 { "Infinity" } else { "-Infinity" });
    } else {
        let _ = write!(out, "{f}");
    }
}

/// Quotes an identifier unless it is a plain lowercase name.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Column names that hold identifiers: `id`, `*_id`, `*_ids`, `id_*`, `*uuid*`.
fn is_id_column(column: &str) -> bool {
    let name = column.to_lowercase();
    name == "id"
        || name.contains("uuid")
        || name.ends_with("_id")
        || name.ends_with("_ids")
        || name.starts_with("id_")
}

/// Column names that hold sets when no type is declared: `*_set`, `*unique*`.
fn is_set_column(column: &str) -> bool {
    let name = column.to_lowercase();
    name.ends_with("_set") || name.contains("unique")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn stmt(value: &RowValue, column: &str, ty: Option<&ColumnType>) -> String {
        ValueFormatter::for_statement().format(value, column, ty)
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("user_id"), "user_id");
        assert_eq!(quote_identifier("UserId"), "\"UserId\"");
        assert_eq!(quote_identifier("2nd"), "\"2nd\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_statement_scalars() {
        assert_eq!(stmt(&RowValue::Null, "a", None), "null");
        assert_eq!(stmt(&RowValue::Bool(true), "a", None), "true");
        assert_eq!(stmt(&RowValue::Int(-3), "a", None), "-3");
        assert_eq!(stmt(&RowValue::Float(2.5), "a", None), "2.5");
        assert_eq!(stmt(&RowValue::Float(f64::NEG_INFINITY), "a", None), "-Infinity");
        assert_eq!(
            stmt(&RowValue::Bytes(vec![0xde, 0xad, 0xbe, 0xef]), "a", None),
            "0xdeadbeef"
        );
        assert_eq!(stmt(&RowValue::text("it's"), "name", None), "'it''s'");
    }

    #[test]
    fn test_timestamp_is_quoted_iso() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(
            stmt(&RowValue::Timestamp(ts), "created_at", None),
            "'2024-01-15T10:30:00.000Z'"
        );
        assert_eq!(
            ValueFormatter::for_file("null").format(&RowValue::Timestamp(ts), "created_at", None),
            "2024-01-15T10:30:00.000Z"
        );
    }

    #[test]
    fn test_uuid_unquoted_only_for_id_columns() {
        let id = RowValue::text("123e4567-e89b-12d3-a456-426614174000");
        assert_eq!(stmt(&id, "user_id", None), "123e4567-e89b-12d3-a456-426614174000");
        assert_eq!(
            stmt(&id, "token", Some(&ColumnType::Uuid)),
            "123e4567-e89b-12d3-a456-426614174000"
        );
        assert_eq!(stmt(&id, "note", None), "'123e4567-e89b-12d3-a456-426614174000'");
        assert_eq!(stmt(&RowValue::text("abc"), "id", None), "'abc'");
    }

    #[test]
    fn test_collections() {
        let list = RowValue::List(vec![RowValue::Int(1), RowValue::Int(2)]);
        assert_eq!(stmt(&list, "scores", None), "[1, 2]");
        assert_eq!(stmt(&list, "tag_set", None), "{1, 2}");
        assert_eq!(
            stmt(&list, "scores", Some(&ColumnType::Set(Box::new(ColumnType::Int)))),
            "{1, 2}"
        );
        assert_eq!(stmt(&RowValue::List(vec![]), "scores", None), "[]");
        assert_eq!(stmt(&RowValue::Set(vec![]), "scores", None), "{}");
        assert_eq!(stmt(&RowValue::Map(vec![]), "attrs", None), "{}");

        let map = RowValue::Map(vec![(RowValue::text("k"), RowValue::Null)]);
        assert_eq!(stmt(&map, "attrs", None), "{'k': null}");

        let udt = RowValue::Udt(vec![
            ("street".to_string(), RowValue::text("Main")),
            ("Zip".to_string(), RowValue::Int(12345)),
        ]);
        assert_eq!(stmt(&udt, "addr", None), "{street: 'Main', \"Zip\": 12345}");

        let tuple = RowValue::Tuple(vec![RowValue::Int(1), RowValue::text("a")]);
        assert_eq!(stmt(&tuple, "pair", None), "(1, 'a')");
    }

    #[test]
    fn test_file_style() {
        let formatter = ValueFormatter::for_file("NA");
        assert_eq!(formatter.format(&RowValue::Null, "a", None), "NA");
        assert_eq!(formatter.format(&RowValue::text("plain, text"), "a", None), "plain, text");
        assert_eq!(
            formatter.format(
                &RowValue::List(vec![RowValue::text("x"), RowValue::Null]),
                "a",
                None
            ),
            "['x', null]"
        );
    }
}
