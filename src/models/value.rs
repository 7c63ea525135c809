//! Row values and records.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;

/// A loosely typed cell value as produced by readers and sessions.
///
/// Collections keep their kind so the formatter can choose between `[...]`,
/// `{...}` and `(...)` without consulting runtime type names.
#[derive(Debug, Clone, PartialEq)]
pub enum RowValue {
    /// Absent or null value.
    Null,
    /// Text, including UUIDs, dates and other values without a native variant.
    Text(String),
    /// Integer that fits in 64 bits.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Arbitrary precision number kept in canonical decimal form.
    Decimal(String),
    /// Boolean.
    Bool(bool),
    /// Byte sequence (blob).
    Bytes(Vec<u8>),
    /// Point in time.
    Timestamp(DateTime<Utc>),
    /// Ordered list (or vector).
    List(Vec<Self>),
    /// Set of distinct values.
    Set(Vec<Self>),
    /// Map with arbitrary keys, in source order.
    Map(Vec<(Self, Self)>),
    /// User defined type, fields by name.
    Udt(Vec<(String, Self)>),
    /// Tuple.
    Tuple(Vec<Self>),
}

impl RowValue {
    /// Returns whether the value is null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Creates a text value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Returns the text payload, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns a short name for the variant, used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::Bool(_) => "boolean",
            Self::Bytes(_) => "blob",
            Self::Timestamp(_) => "timestamp",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Udt(_) => "udt",
            Self::Tuple(_) => "tuple",
        }
    }

    /// Converts a JSON value into a row value.
    ///
    /// Objects become maps with text keys; their interpretation as a UDT is
    /// left to type-directed coercion.
    #[must_use]
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => n.as_i64().map_or_else(
                || n.as_f64().map_or_else(|| Self::Decimal(n.to_string()), Self::Float),
                Self::Int,
            ),
            JsonValue::String(s) => Self::Text(s.clone()),
            JsonValue::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            JsonValue::Object(fields) => Self::Map(
                fields
                    .iter()
                    .map(|(k, v)| (Self::Text(k.clone()), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts the value into JSON.
    ///
    /// Blobs become `0x`-prefixed hex strings and timestamps RFC 3339 strings.
    /// Maps whose keys are not all text become arrays of `[key, value]` pairs.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Text(s) => JsonValue::String(s.clone()),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or_else(|| JsonValue::String(f.to_string()), JsonValue::Number),
            Self::Decimal(d) => d
                .parse::<serde_json::Number>()
                .map_or_else(|_| JsonValue::String(d.clone()), JsonValue::Number),
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Bytes(b) => JsonValue::String(format!("0x{}", hex::encode(b))),
            Self::Timestamp(ts) => {
                JsonValue::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
            },
            Self::List(items) | Self::Set(items) | Self::Tuple(items) => {
                JsonValue::Array(items.iter().map(Self::to_json).collect())
            },
            Self::Map(entries) => {
                if entries.iter().all(|(k, _)| matches!(k, Self::Text(_))) {
                    JsonValue::Object(
                        entries
                            .iter()
                            .filter_map(|(k, v)| k.as_text().map(|k| (k.to_string(), v.to_json())))
                            .collect(),
                    )
                } else {
                    JsonValue::Array(
                        entries
                            .iter()
                            .map(|(k, v)| JsonValue::Array(vec![k.to_json(), v.to_json()]))
                            .collect(),
                    )
                }
            },
            Self::Udt(fields) => JsonValue::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// One row: column names mapped to values, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowRecord {
    fields: Vec<(String, RowValue)>,
}

impl RowRecord {
    /// Creates an empty record.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Creates an empty record with room for `capacity` columns.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Sets a column, replacing an existing value with the same name.
    pub fn insert(&mut self, column: impl Into<String>, value: RowValue) {
        let column = column.into();
        if let Some(slot) = self.fields.iter_mut().find(|(name, _)| *name == column) {
            slot.1 = value;
        } else {
            self.fields.push((column, value));
        }
    }

    /// Builder form of [`Self::insert`].
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: RowValue) -> Self {
        self.insert(column, value);
        self
    }

    /// Returns the value of a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&RowValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Returns whether the record has a column with this name.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == column)
    }

    /// Returns the column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Iterates over `(column, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns whether the record has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns a record with exactly `columns`, in that order.
    ///
    /// Missing columns are filled with [`RowValue::Null`].
    #[must_use]
    pub fn project<S: AsRef<str>>(&self, columns: &[S]) -> Self {
        let fields = columns
            .iter()
            .map(|c| {
                let name = c.as_ref();
                (
                    name.to_string(),
                    self.get(name).cloned().unwrap_or(RowValue::Null),
                )
            })
            .collect();
        Self { fields }
    }
}

impl FromIterator<(String, RowValue)> for RowRecord {
    fn from_iter<I: IntoIterator<Item = (String, RowValue)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

impl IntoIterator for RowRecord {
    type Item = (String, RowValue);
    type IntoIter = std::vec::IntoIter<(String, RowValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
