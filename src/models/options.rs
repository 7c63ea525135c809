//! `WITH` options of a `COPY` command.
//!
//! Options are a flat, case-insensitive string map. Accessors apply the
//! documented defaults, and a value that does not parse falls back to the
//! default with a warning instead of failing the command.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Default NULL token for delimited files.
pub const DEFAULT_NULL_TOKEN: &str = "null";
/// Default rows per read batch and per columnar row group.
pub const DEFAULT_CHUNK_SIZE: usize = 5000;
/// Default statements per write batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 20;
/// Default number of concurrent writers.
pub const DEFAULT_MAX_REQUESTS: usize = 6;
/// Default insert error budget.
pub const DEFAULT_MAX_INSERT_ERRORS: u64 = 1000;
/// Default number of simultaneously open partition files.
pub const DEFAULT_MAX_OPEN_FILES: usize = 10;
/// Default size at which a partition file is rotated.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
/// Default page size hint for export queries.
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// An error ceiling that is either a count or unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    /// Never abort.
    Unlimited,
    /// Abort once the count goes past this value.
    Max(u64),
}

impl Threshold {
    /// Interprets an option value where any negative number means unlimited.
    #[must_use]
    pub const fn from_signed(value: i64) -> Self {
        if value < 0 {
            Self::Unlimited
        } else {
            Self::Max(value.unsigned_abs())
        }
    }

    /// Returns whether `count` errors go past the threshold.
    #[must_use]
    pub const fn is_exceeded_by(&self, count: u64) -> bool {
        match self {
            Self::Unlimited => false,
            Self::Max(max) => count > *max,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => write!(f, "unlimited"),
            Self::Max(max) => write!(f, "{max}"),
        }
    }
}

/// Columnar compression codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// No compression.
    #[default]
    None,
    /// Snappy.
    Snappy,
    /// Gzip.
    Gzip,
    /// LZ4 (raw).
    Lz4,
    /// Zstandard.
    Zstd,
}

impl FromStr for Compression {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "uncompressed" => Ok(Self::None),
            "snappy" => Ok(Self::Snappy),
            "gzip" | "gz" => Ok(Self::Gzip),
            "lz4" => Ok(Self::Lz4),
            "zstd" => Ok(Self::Zstd),
            _ => Err(crate::Error::InvalidInput(format!(
                "Unknown compression codec: {s}"
            ))),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Snappy => write!(f, "snappy"),
            Self::Gzip => write!(f, "gzip"),
            Self::Lz4 => write!(f, "lz4"),
            Self::Zstd => write!(f, "zstd"),
        }
    }
}

/// Case-insensitive option map with typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyOptions {
    values: BTreeMap<String, String>,
}

impl CopyOptions {
    /// Creates an empty option map (all defaults).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Sets an option. Keys are case-insensitive.
    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.values
            .insert(key.as_ref().to_uppercase(), value.into());
    }

    /// Builder form of [`Self::set`].
    #[must_use]
    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Fills in every key that is not set here from `defaults`.
    #[must_use]
    pub fn with_fallback(mut self, defaults: &Self) -> Self {
        for (key, value) in &defaults.values {
            self.values
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }

    /// Returns the raw value of an option.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_uppercase()).map(String::as_str)
    }

    /// Returns whether an option was given explicitly.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(&key.to_uppercase())
    }

    /// Iterates over `(KEY, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `HEADER`: whether delimited files carry a header row. Default false.
    #[must_use]
    pub fn header(&self) -> bool {
        self.bool_or("HEADER", false)
    }

    /// `DELIMITER`: field separator. Default `,`.
    #[must_use]
    pub fn delimiter(&self) -> u8 {
        self.byte_or("DELIMITER", b',')
    }

    /// `QUOTE`: quote character. Default `"`.
    #[must_use]
    pub fn quote(&self) -> u8 {
        self.byte_or("QUOTE", b'"')
    }

    /// `ESCAPE`: escape character, only when given explicitly.
    ///
    /// Without it, embedded quotes are doubled.
    #[must_use]
    pub fn escape(&self) -> Option<u8> {
        self.contains("ESCAPE").then(|| self.byte_or("ESCAPE", b'\\'))
    }

    /// `NULLVAL`: token that stands for null in delimited files. Default `null`.
    #[must_use]
    pub fn null_token(&self) -> String {
        self.get("NULLVAL")
            .unwrap_or(DEFAULT_NULL_TOKEN)
            .to_string()
    }

    /// `CHUNKSIZE`: rows per read batch and row group. Accepts `K`/`M` suffixes.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.parsed_or("CHUNKSIZE", DEFAULT_CHUNK_SIZE, parse_count)
            .max(1)
    }

    /// `MAXBATCHSIZE`: statements per write batch. Default 20.
    #[must_use]
    pub fn max_batch_size(&self) -> usize {
        self.parsed_or("MAXBATCHSIZE", DEFAULT_MAX_BATCH_SIZE, parse_count)
            .max(1)
    }

    /// `MAXREQUESTS`: number of concurrent writers. Default 6.
    #[must_use]
    pub fn max_requests(&self) -> usize {
        self.parsed_or("MAXREQUESTS", DEFAULT_MAX_REQUESTS, parse_count)
            .max(1)
    }

    /// `MAXROWS`: ceiling on rows read after skipping. `-1` means unlimited.
    #[must_use]
    pub fn max_rows(&self) -> Option<u64> {
        let value = self.parsed_or("MAXROWS", -1, |s| s.trim().parse::<i64>().ok());
        u64::try_from(value).ok()
    }

    /// `SKIPROWS`: records discarded before any parsing. Default 0.
    #[must_use]
    pub fn skip_rows(&self) -> u64 {
        self.parsed_or("SKIPROWS", 0, |s| s.trim().parse::<u64>().ok())
    }

    /// `MAXPARSEERRORS`: parse error budget. Default unlimited.
    #[must_use]
    pub fn max_parse_errors(&self) -> Threshold {
        Threshold::from_signed(self.parsed_or("MAXPARSEERRORS", -1, |s| {
            s.trim().parse::<i64>().ok()
        }))
    }

    /// `MAXINSERTERRORS`: insert error budget. Default 1000.
    #[must_use]
    pub fn max_insert_errors(&self) -> Threshold {
        let default = i64::try_from(DEFAULT_MAX_INSERT_ERRORS).unwrap_or(i64::MAX);
        Threshold::from_signed(self.parsed_or("MAXINSERTERRORS", default, |s| {
            s.trim().parse::<i64>().ok()
        }))
    }

    /// `PARTITION`: partition columns, comma separated. Empty when not partitioned.
    #[must_use]
    pub fn partition_columns(&self) -> Vec<String> {
        self.get("PARTITION")
            .map(split_list)
            .unwrap_or_default()
    }

    /// `PARTITION_FILTER`: `col=value` pairs a partitioned import is restricted to.
    #[must_use]
    pub fn partition_filter(&self) -> Vec<(String, String)> {
        self.get("PARTITION_FILTER")
            .map(|raw| {
                split_list(raw)
                    .into_iter()
                    .filter_map(|pair| {
                        pair.split_once('=')
                            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `MAX_OPEN_FILES`: open partition file ceiling. Default 10.
    #[must_use]
    pub fn max_open_files(&self) -> usize {
        self.parsed_or("MAX_OPEN_FILES", DEFAULT_MAX_OPEN_FILES, parse_count)
            .max(1)
    }

    /// `MAX_FILE_SIZE`: rotation size in bytes. Accepts `KB`/`MB`/`GB`.
    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        self.parsed_or("MAX_FILE_SIZE", DEFAULT_MAX_FILE_SIZE, parse_byte_size)
            .max(1)
    }

    /// `COMPRESSION`: columnar codec. Default none.
    #[must_use]
    pub fn compression(&self) -> Compression {
        self.parsed_or("COMPRESSION", Compression::None, |s| s.parse().ok())
    }

    /// `PAGESIZE`: page size hint for export queries. Default 5000.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.parsed_or("PAGESIZE", DEFAULT_PAGE_SIZE, parse_count)
            .max(1)
    }

    /// `LIMIT`: row limit for export queries.
    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        let value = self.parsed_or("LIMIT", -1, |s| s.trim().parse::<i64>().ok());
        u64::try_from(value).ok().filter(|v| *v > 0)
    }

    /// `FORMAT`: explicit format name.
    #[must_use]
    pub fn format(&self) -> Option<&str> {
        self.get("FORMAT")
    }

    fn parsed_or<T: fmt::Debug>(
        &self,
        key: &str,
        default: T,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> T {
        let Some(raw) = self.get(key) else {
            return default;
        };
        parse(raw).unwrap_or_else(|| {
            tracing::warn!(option = key, value = raw, ?default, "Unparseable option, using default");
            default
        })
    }

    fn bool_or(&self, key: &str, default: bool) -> bool {
        self.parsed_or(key, default, |s| match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        })
    }

    fn byte_or(&self, key: &str, default: u8) -> u8 {
        self.parsed_or(key, default, |s| match s {
            "\\t" | "\t" => Some(b'\t'),
            _ if s.len() == 1 => s.bytes().next(),
            _ => None,
        })
    }
}

/// Parses a count with an optional `K` (thousand) or `M` (million) suffix.
#[must_use]
pub fn parse_count(s: &str) -> Option<usize> {
    let s = s.trim().to_uppercase();
    let (digits, multiplier) = if let Some(d) = s.strip_suffix('K') {
        (d, 1_000)
    } else if let Some(d) = s.strip_suffix('M') {
        (d, 1_000_000)
    } else {
        (s.as_str(), 1)
    };
    digits.trim().parse::<usize>().ok()?.checked_mul(multiplier)
}

/// Parses a byte size with an optional `B`, `KB`, `MB` or `GB` suffix.
#[must_use]
pub fn parse_byte_size(s: &str) -> Option<u64> {
    let s = s.trim().to_uppercase();
    let s = s.strip_suffix('B').unwrap_or(&s);
    let (digits, multiplier) = if let Some(d) = s.strip_suffix('K') {
        (d, 1024)
    } else if let Some(d) = s.strip_suffix('M') {
        (d, 1024 * 1024)
    } else if let Some(d) = s.strip_suffix('G') {
        (d, 1024 * 1024 * 1024)
    } else {
        (s, 1)
    };
    digits.trim().parse::<u64>().ok()?.checked_mul(multiplier)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
