//! Column types and specs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Declared type of a table column.
///
/// Parsed from CQL type strings such as `map<text, frozen<list<int>>>`.
/// `frozen<...>` wrappers are transparent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// `ascii`
    Ascii,
    /// `text` / `varchar`
    Text,
    /// `bigint`
    BigInt,
    /// `int`
    Int,
    /// `smallint`
    SmallInt,
    /// `tinyint`
    TinyInt,
    /// `varint`
    Varint,
    /// `counter`
    Counter,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `decimal`
    Decimal,
    /// `boolean`
    Boolean,
    /// `blob`
    Blob,
    /// `timestamp`
    Timestamp,
    /// `date`
    Date,
    /// `time`
    Time,
    /// `duration`
    Duration,
    /// `uuid`
    Uuid,
    /// `timeuuid`
    TimeUuid,
    /// `inet`
    Inet,
    /// `list<T>`
    List(Box<Self>),
    /// `set<T>`
    Set(Box<Self>),
    /// `map<K, V>`
    Map(Box<Self>, Box<Self>),
    /// `tuple<A, B, ...>`
    Tuple(Vec<Self>),
    /// `vector<T, N>`
    Vector(Box<Self>, usize),
    /// User defined type, by name.
    Udt(String),
}

impl ColumnType {
    /// Parses a CQL type string.
    ///
    /// Returns `None` for malformed strings (unbalanced brackets, wrong
    /// parameter counts). Unknown simple names are treated as user defined types.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let Some(open) = s.find('<') else {
            return Some(Self::simple(s));
        };
        if !s.ends_with('>') {
            return None;
        }
        let name = s[..open].trim().to_lowercase();
        let args = split_top_level(&s[open + 1..s.len() - 1])?;
        match (name.as_str(), args.as_slice()) {
            ("frozen", [inner]) => Self::parse(inner),
            ("list", [inner]) => Some(Self::List(Box::new(Self::parse(inner)?))),
            ("set", [inner]) => Some(Self::Set(Box::new(Self::parse(inner)?))),
            ("map", [k, v]) => Some(Self::Map(
                Box::new(Self::parse(k)?),
                Box::new(Self::parse(v)?),
            )),
            ("tuple", items) if !items.is_empty() => Some(Self::Tuple(
                items.iter().map(|i| Self::parse(i)).collect::<Option<_>>()?,
            )),
            ("vector", [inner, dim]) => Some(Self::Vector(
                Box::new(Self::parse(inner)?),
                dim.trim().parse().ok()?,
            )),
            _ => None,
        }
    }

    fn simple(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "ascii" => Self::Ascii,
            "text" | "varchar" => Self::Text,
            "bigint" => Self::BigInt,
            "int" => Self::Int,
            "smallint" => Self::SmallInt,
            "tinyint" => Self::TinyInt,
            "varint" => Self::Varint,
            "counter" => Self::Counter,
            "float" => Self::Float,
            "double" => Self::Double,
            "decimal" => Self::Decimal,
            "boolean" => Self::Boolean,
            "blob" => Self::Blob,
            "timestamp" => Self::Timestamp,
            "date" => Self::Date,
            "time" => Self::Time,
            "duration" => Self::Duration,
            "uuid" => Self::Uuid,
            "timeuuid" => Self::TimeUuid,
            "inet" => Self::Inet,
            _ => Self::Udt(name.trim_matches('"').to_string()),
        }
    }

    /// Returns whether values of this type fit in an `i64`.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::BigInt | Self::Int | Self::SmallInt | Self::TinyInt | Self::Counter
        )
    }

    /// Returns whether the type is a list, set, map, vector, tuple or UDT.
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(
            self,
            Self::List(_)
                | Self::Set(_)
                | Self::Map(..)
                | Self::Tuple(_)
                | Self::Vector(..)
                | Self::Udt(_)
        )
    }

    /// Returns whether the type holds UUIDs.
    #[must_use]
    pub const fn is_uuid(&self) -> bool {
        matches!(self, Self::Uuid | Self::TimeUuid)
    }

    /// Element type of lists, sets and vectors.
    #[must_use]
    pub fn element(&self) -> Option<&Self> {
        match self {
            Self::List(inner) | Self::Set(inner) | Self::Vector(inner, _) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascii => write!(f, "ascii"),
            Self::Text => write!(f, "text"),
            Self::BigInt => write!(f, "bigint"),
            Self::Int => write!(f, "int"),
            Self::SmallInt => write!(f, "smallint"),
            Self::TinyInt => write!(f, "tinyint"),
            Self::Varint => write!(f, "varint"),
            Self::Counter => write!(f, "counter"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::Decimal => write!(f, "decimal"),
            Self::Boolean => write!(f, "boolean"),
            Self::Blob => write!(f, "blob"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Date => write!(f, "date"),
            Self::Time => write!(f, "time"),
            Self::Duration => write!(f, "duration"),
            Self::Uuid => write!(f, "uuid"),
            Self::TimeUuid => write!(f, "timeuuid"),
            Self::Inet => write!(f, "inet"),
            Self::List(inner) => write!(f, "list<{inner}>"),
            Self::Set(inner) => write!(f, "set<{inner}>"),
            Self::Map(k, v) => write!(f, "map<{k}, {v}>"),
            Self::Tuple(items) => {
                write!(f, "tuple<")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ">")
            },
            Self::Vector(inner, dim) => write!(f, "vector<{inner}, {dim}>"),
            Self::Udt(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for ColumnType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s).ok_or_else(|| crate::Error::InvalidInput(format!("Unknown column type: {s}")))
    }
}

impl Serialize for ColumnType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Splits `a, map<b, c>, d` on commas that are not nested in brackets.
fn split_top_level(s: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0_i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            },
            ',' if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            },
            _ => {},
        }
    }
    if depth != 0 {
        return None;
    }
    parts.push(s[start..].trim());
    Some(parts)
}

/// A named column with an optional declared type.
///
/// The type is absent when the source carries no type information, such as
/// a delimited file read without a known table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Declared type, when known.
    #[serde(rename = "type", default)]
    pub column_type: Option<ColumnType>,
}

impl ColumnSpec {
    /// Creates a typed column.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type: Some(column_type),
        }
    }

    /// Creates a column without type information.
    #[must_use]
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: None,
        }
    }
}

/// Finds a column by name.
#[must_use]
pub fn find_column<'a>(columns: &'a [ColumnSpec], name: &str) -> Option<&'a ColumnSpec> {
    columns.iter().find(|c| c.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_types() {
        assert_eq!(ColumnType::parse("int"), Some(ColumnType::Int));
        assert_eq!(ColumnType::parse("VARCHAR"), Some(ColumnType::Text));
        assert_eq!(ColumnType::parse("timeuuid"), Some(ColumnType::TimeUuid));
        assert_eq!(
            ColumnType::parse("address"),
            Some(ColumnType::Udt("address".to_string()))
        );
    }

    #[test]
    fn test_parse_nested_types() {
        let ty = ColumnType::parse("map<text, frozen<list<int>>>").unwrap();
        assert_eq!(
            ty,
            ColumnType::Map(
                Box::new(ColumnType::Text),
                Box::new(ColumnType::List(Box::new(ColumnType::Int)))
            )
        );
        assert_eq!(ty.to_string(), "map<text, list<int>>");

        let ty = ColumnType::parse("tuple<int, text, set<uuid>>").unwrap();
        assert_eq!(ty.to_string(), "tuple<int, text, set<uuid>>");

        let ty = ColumnType::parse("vector<float, 3>").unwrap();
        assert_eq!(ty, ColumnType::Vector(Box::new(ColumnType::Float), 3));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(ColumnType::parse("list<int").is_none());
        assert!(ColumnType::parse("map<int>").is_none());
        assert!(ColumnType::parse("list<int>>").is_none());
    }

    #[test]
    fn test_column_spec_deserialize() {
        let spec: ColumnSpec =
            serde_json::from_str(r#"{"name": "tags", "type": "set<text>"}"#).unwrap();
        assert_eq!(
            spec.column_type,
            Some(ColumnType::Set(Box::new(ColumnType::Text)))
        );
    }
}
