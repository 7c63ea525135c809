//! Text to value conversion.
//!
//! Three entry points cover every place where text becomes a [`RowValue`]:
//!
//! - [`parse_literal`] reads CQL literal syntax (`'it''s'`, `[1, 2]`,
//!   `{'k': 0x01}`, `{street: 'Main'}`, `(1, 'a')`)
//! - [`coerce_text`] converts a raw delimited field using the column type when
//!   one is known, or a conservative inference when not
//! - [`conform`] adjusts an already typed value to a declared column type

use crate::models::{ColumnType, RowValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error as ThisError;

/// A value that cannot be read as the requested type.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("{0}")]
pub struct ValueError(pub String);

/// Result of a value conversion.
pub type ValueResult<T> = std::result::Result<T, ValueError>;

fn err<T>(message: impl Into<String>) -> ValueResult<T> {
    Err(ValueError(message.into()))
}

/// Parses a complete CQL literal.
///
/// # Errors
///
/// Returns [`ValueError`] for malformed syntax, trailing input, or a value
/// that does not fit `ty`.
pub fn parse_literal(text: &str, ty: Option<&ColumnType>) -> ValueResult<RowValue> {
    let mut parser = LiteralParser::new(text);
    let value = parser.value(ty)?;
    parser.finish()?;
    Ok(value)
}

/// Parses a parenthesised value list such as the `VALUES (...)` of an insert.
///
/// # Errors
///
/// Returns [`ValueError`] when the list is malformed or its length differs
/// from `types`.
pub fn parse_value_list(
    text: &str,
    types: &[Option<&ColumnType>],
) -> ValueResult<Vec<RowValue>> {
    let mut parser = LiteralParser::new(text);
    parser.expect('(')?;
    let mut values = Vec::with_capacity(types.len());
    let mut index = 0;
    parser.sequence(')', |p| {
        let ty = types.get(index).copied().flatten();
        index += 1;
        values.push(p.value(ty)?);
        Ok(())
    })?;
    parser.finish()?;
    if values.len() != types.len() {
        return err(format!(
            "expected {} values, found {}",
            types.len(),
            values.len()
        ));
    }
    Ok(values)
}

/// Converts a raw delimited field into a value.
///
/// The NULL token must already have been handled by the caller.
///
/// # Errors
///
/// Returns [`ValueError`] when the field does not fit the declared type.
pub fn coerce_text(raw: &str, ty: Option<&ColumnType>) -> ValueResult<RowValue> {
    match ty {
        Some(ty) => conform(RowValue::Text(raw.to_string()), ty),
        None => Ok(infer_text(raw)),
    }
}

/// Best-effort typing of a field whose column type is unknown.
///
/// Recognises blobs, booleans, integers, decimals with a point or exponent,
/// and collection literals. Everything else stays text.
#[must_use]
pub fn infer_text(raw: &str) -> RowValue {
    let trimmed = raw.trim();
    if let Some(hex) = trimmed.strip_prefix("0x")
        && let Ok(bytes) = hex::decode(hex)
    {
        return RowValue::Bytes(bytes);
    }
    match trimmed {
        "true" => return RowValue::Bool(true),
        "false" => return RowValue::Bool(false),
        _ => {},
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return RowValue::Int(i);
    }
    if trimmed.contains(['.', 'e', 'E'])
        && trimmed.bytes().all(|b| b.is_ascii_digit() || b"+-.eE".contains(&b))
        && let Ok(f) = trimmed.parse::<f64>()
    {
        return RowValue::Float(f);
    }
    if trimmed.starts_with(['[', '{', '('])
        && let Ok(value) = parse_literal(trimmed, None)
    {
        return value;
    }
    RowValue::Text(raw.to_string())
}

/// Adjusts a value to a declared column type.
///
/// # Errors
///
/// Returns [`ValueError`] when the value cannot represent the type.
#[allow(clippy::too_many_lines)]
pub fn conform(value: RowValue, ty: &ColumnType) -> ValueResult<RowValue> {
    use ColumnType as T;
    use RowValue as V;

    match (value, ty) {
        (V::Null, _) => Ok(V::Null),

        (V::Text(s), T::Text | T::Ascii | T::Inet | T::Date | T::Time | T::Duration) => {
            Ok(V::Text(s))
        },
        (V::Text(s), T::Uuid | T::TimeUuid) => uuid::Uuid::parse_str(s.trim())
            .map(|u| V::Text(u.hyphenated().to_string()))
            .or_else(|_| err(format!("invalid uuid: {s}"))),
        (V::Text(s), ty) if ty.is_integer() => parse_int(&s),
        (V::Text(s), T::Float | T::Double) => parse_float(&s).map(V::Float),
        (V::Text(s), T::Varint) => {
            let t = s.trim();
            t.parse::<i64>().map(V::Int).or_else(|_| {
                if !t.is_empty()
                    && t.trim_start_matches(['-', '+']).bytes().all(|b| b.is_ascii_digit())
                {
                    Ok(V::Decimal(t.to_string()))
                } else {
                    err(format!("invalid varint: {s}"))
                }
            })
        },
        (V::Text(s), T::Decimal) => {
            let t = s.trim();
            if t.parse::<f64>().is_ok_and(f64::is_finite) {
                Ok(V::Decimal(t.to_string()))
            } else {
                err(format!("invalid decimal: {s}"))
            }
        },
        (V::Text(s), T::Boolean) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(V::Bool(true)),
            "false" | "no" | "0" => Ok(V::Bool(false)),
            _ => err(format!("invalid boolean: {s}")),
        },
        (V::Text(s), T::Blob) => {
            let t = s.trim();
            hex::decode(t.strip_prefix("0x").unwrap_or(t))
                .map(V::Bytes)
                .or_else(|e| err(format!("invalid blob {s}: {e}")))
        },
        (V::Text(s), T::Timestamp) => parse_timestamp(&s)
            .map(V::Timestamp)
            .ok_or_else(|| ValueError(format!("invalid timestamp: {s}"))),
        (V::Text(s), ty) if ty.is_composite() => parse_literal(&s, Some(ty)),

        (V::Int(i), ty) if ty.is_integer() => Ok(V::Int(i)),
        #[allow(clippy::cast_precision_loss)]
        (V::Int(i), T::Float | T::Double) => Ok(V::Float(i as f64)),
        (V::Int(i), T::Decimal | T::Varint) => Ok(V::Int(i)),
        (V::Int(i), T::Timestamp) => DateTime::from_timestamp_millis(i)
            .map(V::Timestamp)
            .ok_or_else(|| ValueError(format!("timestamp out of range: {i}"))),
        (V::Int(i), T::Boolean) if i == 0 || i == 1 => Ok(V::Bool(i == 1)),

        #[allow(clippy::cast_possible_truncation)]
        (V::Float(f), ty) if ty.is_integer() => {
            if f.fract() == 0.0 && f.abs() < 9.0e15 {
                Ok(V::Int(f as i64))
            } else {
                err(format!("not an integer: {f}"))
            }
        },
        (V::Float(f), T::Float | T::Double | T::Decimal) => Ok(V::Float(f)),
        (V::Decimal(d), T::Decimal | T::Varint) => Ok(V::Decimal(d)),
        (V::Decimal(d), T::Float | T::Double) => parse_float(&d).map(V::Float),

        (V::Bool(b), T::Boolean) => Ok(V::Bool(b)),
        (V::Bytes(b), T::Blob) => Ok(V::Bytes(b)),
        (V::Timestamp(t), T::Timestamp) => Ok(V::Timestamp(t)),
        (V::Timestamp(t), T::Date) => Ok(V::Text(t.format("%Y-%m-%d").to_string())),

        (
            scalar @ (V::Int(_) | V::Float(_) | V::Decimal(_) | V::Bool(_) | V::Timestamp(_)),
            T::Text | T::Ascii | T::Inet | T::Date | T::Time | T::Duration,
        ) => Ok(V::Text(scalar_text(&scalar))),

        (V::List(items) | V::Set(items), T::List(elem) | T::Vector(elem, _)) => {
            Ok(V::List(conform_all(items, elem)?))
        },
        (V::List(items) | V::Set(items), T::Set(elem)) => Ok(V::Set(conform_all(items, elem)?)),
        (V::List(items) | V::Tuple(items), T::Tuple(types)) => {
            if items.len() != types.len() {
                return err(format!(
                    "tuple expects {} items, found {}",
                    types.len(),
                    items.len()
                ));
            }
            items
                .into_iter()
                .zip(types)
                .map(|(item, ty)| conform(item, ty))
                .collect::<ValueResult<_>>()
                .map(V::Tuple)
        },
        (V::Map(entries), T::Map(kt, vt)) => entries
            .into_iter()
            .map(|(k, v)| -> ValueResult<(RowValue, RowValue)> {
                Ok((conform(k, kt)?, conform(v, vt)?))
            })
            .collect::<ValueResult<_>>()
            .map(V::Map),
        (V::Udt(fields), T::Map(kt, vt)) => fields
            .into_iter()
            .map(|(k, v)| -> ValueResult<(RowValue, RowValue)> {
                Ok((conform(V::Text(k), kt)?, conform(v, vt)?))
            })
            .collect::<ValueResult<_>>()
            .map(V::Map),
        (V::Map(entries), T::Udt(_)) => entries
            .into_iter()
            .map(|(k, v)| match k {
                V::Text(name) => Ok((name, v)),
                other => err(format!("UDT field names must be text, found {}", other.kind())),
            })
            .collect::<ValueResult<_>>()
            .map(V::Udt),
        (V::Udt(fields), T::Udt(_)) => Ok(V::Udt(fields)),

        (value, ty) => err(format!("cannot convert {} to {ty}", value.kind())),
    }
}

fn conform_all(items: Vec<RowValue>, ty: &ColumnType) -> ValueResult<Vec<RowValue>> {
    items.into_iter().map(|item| conform(item, ty)).collect()
}

fn scalar_text(value: &RowValue) -> String {
    match value {
        RowValue::Int(i) => i.to_string(),
        RowValue::Float(f) => f.to_string(),
        RowValue::Decimal(d) => d.clone(),
        RowValue::Bool(b) => b.to_string(),
        RowValue::Timestamp(t) => t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        _ => String::new(),
    }
}

fn parse_int(s: &str) -> ValueResult<RowValue> {
    s.trim()
        .parse::<i64>()
        .map(RowValue::Int)
        .or_else(|_| err(format!("invalid integer: {s}")))
}

fn parse_float(s: &str) -> ValueResult<f64> {
    s.trim()
        .parse::<f64>()
        .or_else(|_| err(format!("invalid number: {s}")))
}

/// Parses the timestamp spellings produced by databases and common tools.
///
/// Accepts RFC 3339, `2024-01-15 10:30:00.000000+0000`, naive date-times
/// (taken as UTC), plain dates, and integer epoch milliseconds.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    const WITH_OFFSET: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M%z",
    ];
    const NAIVE: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in WITH_OFFSET {
        if let Ok(ts) = DateTime::parse_from_str(s, fmt) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    s.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

/// Returns whether `s` is a hyphenated UUID.
#[must_use]
pub fn looks_like_uuid(s: &str) -> bool {
    s.len() == 36 && uuid::Uuid::parse_str(s).is_ok()
}

struct LiteralParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    const fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, want: char) -> ValueResult<()> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => err(format!("expected '{want}' at offset {}, found '{c}'", self.pos - c.len_utf8())),
            None => err(format!("expected '{want}', found end of input")),
        }
    }

    fn finish(&mut self) -> ValueResult<()> {
        self.skip_ws();
        if self.pos < self.src.len() {
            return err(format!("unexpected trailing input: {}", self.rest()));
        }
        Ok(())
    }

    /// Parses comma separated items up to `close`, which is consumed.
    fn sequence(
        &mut self,
        close: char,
        mut item: impl FnMut(&mut Self) -> ValueResult<()>,
    ) -> ValueResult<()> {
        self.skip_ws();
        if self.peek() == Some(close) {
            self.bump();
            return Ok(());
        }
        loop {
            item(self)?;
            self.skip_ws();
            match self.bump() {
                Some(',') => {},
                Some(c) if c == close => return Ok(()),
                Some(c) => return err(format!("expected ',' or '{close}', found '{c}'")),
                None => return err(format!("unterminated literal, expected '{close}'")),
            }
        }
    }

    fn value(&mut self, ty: Option<&ColumnType>) -> ValueResult<RowValue> {
        self.skip_ws();
        match self.peek() {
            None => err("unexpected end of literal"),
            Some('\'') => {
                let s = self.quoted('\'')?;
                typed(RowValue::Text(s), ty)
            },
            Some('[') => {
                self.bump();
                let elem = ty.and_then(ColumnType::element);
                let mut items = Vec::new();
                self.sequence(']', |p| {
                    items.push(p.value(elem)?);
                    Ok(())
                })?;
                Ok(match ty {
                    Some(ColumnType::Set(_)) => RowValue::Set(items),
                    _ => RowValue::List(items),
                })
            },
            Some('{') => {
                self.bump();
                self.braced(ty)
            },
            Some('(') => {
                self.bump();
                let types = match ty {
                    Some(ColumnType::Tuple(types)) => types.as_slice(),
                    _ => &[],
                };
                let mut items = Vec::new();
                self.sequence(')', |p| {
                    let ty = types.get(items.len());
                    items.push(p.value(ty)?);
                    Ok(())
                })?;
                Ok(RowValue::Tuple(items))
            },
            Some(_) => {
                let token = self.bare();
                if token.is_empty() {
                    return err(format!("unexpected input: {}", self.rest()));
                }
                typed(bare_value(token)?, ty)
            },
        }
    }

    /// Parses the inside of `{...}` as a set, map or UDT.
    fn braced(&mut self, ty: Option<&ColumnType>) -> ValueResult<RowValue> {
        match ty {
            Some(ColumnType::Set(elem)) => {
                let mut items = Vec::new();
                self.sequence('}', |p| {
                    items.push(p.value(Some(elem))?);
                    Ok(())
                })?;
                Ok(RowValue::Set(items))
            },
            Some(ColumnType::Map(kt, vt)) => {
                let mut entries = Vec::new();
                self.sequence('}', |p| {
                    let key = p.value(Some(kt))?;
                    p.expect(':')?;
                    entries.push((key, p.value(Some(vt))?));
                    Ok(())
                })?;
                Ok(RowValue::Map(entries))
            },
            Some(ColumnType::Udt(_)) => {
                let mut fields = Vec::new();
                self.sequence('}', |p| {
                    let name = p.field_name()?;
                    p.expect(':')?;
                    fields.push((name, p.value(None)?));
                    Ok(())
                })?;
                Ok(RowValue::Udt(fields))
            },
            _ => self.untyped_braced(),
        }
    }

    /// `{a, b}` is a set, `{'k': v}` a map and `{field: v}` a UDT.
    fn untyped_braced(&mut self) -> ValueResult<RowValue> {
        let mut items = Vec::new();
        let mut entries = Vec::new();
        let mut all_identifiers = true;
        self.sequence('}', |p| {
            p.skip_ws();
            let identifier = p.peek().is_some_and(|c| c.is_alphabetic() || c == '"');
            let key = if p.peek() == Some('"') {
                RowValue::Text(p.quoted('"')?)
            } else {
                p.value(None)?
            };
            p.skip_ws();
            if p.peek() == Some(':') {
                p.bump();
                all_identifiers &=
                    identifier && !matches!(key, RowValue::Bool(_) | RowValue::Null);
                entries.push((key, p.value(None)?));
            } else {
                items.push(key);
            }
            Ok(())
        })?;
        if !items.is_empty() && !entries.is_empty() {
            return err("mixed set items and map entries in literal");
        }
        if entries.is_empty() {
            return Ok(RowValue::Set(items));
        }
        if all_identifiers {
            return Ok(RowValue::Udt(
                entries
                    .into_iter()
                    .map(|(k, v)| (scalar_or_text(k), v))
                    .collect(),
            ));
        }
        Ok(RowValue::Map(entries))
    }

    fn field_name(&mut self) -> ValueResult<String> {
        self.skip_ws();
        if self.peek() == Some('"') {
            return self.quoted('"');
        }
        let token = self.bare();
        if token.is_empty() {
            return err(format!("expected field name at: {}", self.rest()));
        }
        Ok(token.to_string())
    }

    fn quoted(&mut self, quote: char) -> ValueResult<String> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return err("unterminated quoted string"),
                Some(c) if c == quote => {
                    if self.peek() == Some(quote) {
                        self.bump();
                        out.push(quote);
                    } else {
                        return Ok(out);
                    }
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn bare(&mut self) -> &'a str {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || ",[]{}():'".contains(c))
            .unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }
}

fn typed(value: RowValue, ty: Option<&ColumnType>) -> ValueResult<RowValue> {
    match ty {
        Some(ty) => conform(value, ty),
        None => Ok(value),
    }
}

fn bare_value(token: &str) -> ValueResult<RowValue> {
    if token.eq_ignore_ascii_case("null") {
        return Ok(RowValue::Null);
    }
    if token.eq_ignore_ascii_case("true") {
        return Ok(RowValue::Bool(true));
    }
    if token.eq_ignore_ascii_case("false") {
        return Ok(RowValue::Bool(false));
    }
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        return hex::decode(hex)
            .map(RowValue::Bytes)
            .or_else(|e| err(format!("invalid blob literal {token}: {e}")));
    }
    if let Ok(i) = token.parse::<i64>() {
        return Ok(RowValue::Int(i));
    }
    if let Ok(f) = token.parse::<f64>() {
        return Ok(RowValue::Float(f));
    }
    Ok(RowValue::Text(token.to_string()))
}

fn scalar_or_text(value: RowValue) -> String {
    match value {
        RowValue::Text(s) => s,
        other => scalar_text(&other),
    }
}
