//! Configuration management.
//!
//! Defaults for `COPY` options can come from three places, later ones
//! winning:
//!
//! 1. The built-in defaults of each option
//! 2. The `[copy]` table of `config.toml`
//! 3. `TABLECOPY_<OPTION>` environment variables
//!
//! `WITH` options of a command override all of them.
//!
//! ```toml
//! [copy]
//! header = true
//! maxrequests = 8
//! max_file_size = "256MB"
//!
//! [logging]
//! format = "json"
//! level = "debug"
//! file = "/var/log/tablecopy.log"
//! ```

use crate::models::CopyOptions;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Option names accepted from the environment.
const ENV_OPTIONS: &[&str] = &[
    "HEADER",
    "DELIMITER",
    "QUOTE",
    "ESCAPE",
    "NULLVAL",
    "PAGESIZE",
    "CHUNKSIZE",
    "MAXBATCHSIZE",
    "MAXREQUESTS",
    "MAXROWS",
    "SKIPROWS",
    "MAXPARSEERRORS",
    "MAXINSERTERRORS",
    "MAX_OPEN_FILES",
    "MAX_FILE_SIZE",
    "COMPRESSION",
    "FORMAT",
];

const ENV_PREFIX: &str = "TABLECOPY_";

/// Main configuration for tablecopy.
#[derive(Debug, Clone, Default)]
pub struct CopyConfig {
    /// Default `COPY` options.
    pub defaults: CopyOptions,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// File the configuration was loaded from.
    pub source: Option<PathBuf>,
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct LoggingSettings {
    /// `json` or `pretty`.
    pub format: Option<String>,
    /// Filter directive such as `info` or `tablecopy=debug`.
    pub level: Option<String>,
    /// Log file; logs go to stderr when unset.
    pub file: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Default option values by option name.
    #[serde(default)]
    pub copy: BTreeMap<String, toml::Value>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
}

impl CopyConfig {
    /// Creates a configuration with built-in defaults only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("{}: {e}", path.display())))?;
        let mut config = Self::from_toml(&contents)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the text is not valid TOML or a
    /// `[copy]` value is a table or array.
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::Config(e.to_string()))?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks `tablecopy/config.toml` under the platform config dir, then
    /// `~/.config/tablecopy/config.toml`. Returns the defaults if neither
    /// exists or loads.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };
        let candidates = [
            base_dirs.config_dir().join("tablecopy").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("tablecopy")
                .join("config.toml"),
        ];
        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Ignoring config file"),
            }
        }
        Self::default()
    }

    /// Applies `TABLECOPY_*` variables from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(std::env::vars())
    }

    /// Applies `TABLECOPY_*` variables from `vars`.
    ///
    /// Option variables use the option name (`TABLECOPY_MAXREQUESTS`);
    /// `TABLECOPY_LOG_FORMAT` and `TABLECOPY_LOG_FILE` set logging.
    #[must_use]
    pub fn with_overrides_from<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let name = name.to_uppercase();
            match name.as_str() {
                "LOG_FORMAT" => self.logging.format = Some(value.into()),
                "LOG_FILE" => self.logging.file = Some(PathBuf::from(value.into())),
                option if ENV_OPTIONS.contains(&option) => self.defaults.set(option, value),
                _ => {},
            }
        }
        self
    }

    fn from_config_file(file: ConfigFile) -> crate::Result<Self> {
        let mut config = Self::default();
        for (key, value) in file.copy {
            let text = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                other => {
                    return Err(crate::Error::Config(format!(
                        "[copy] {key}: expected a scalar, found {}",
                        other.type_str()
                    )));
                },
            };
            config.defaults.set(&key, text);
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Threshold;
    use std::io::Write as _;

    #[test]
    fn test_parse_copy_section() {
        let config = CopyConfig::from_toml(
            r#"
            [copy]
            header = true
            maxrequests = 8
            max_file_size = "1MB"
            maxinserterrors = -1

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert!(config.defaults.header());
        assert_eq!(config.defaults.max_requests(), 8);
        assert_eq!(config.defaults.max_file_size(), 1024 * 1024);
        assert_eq!(config.defaults.max_insert_errors(), Threshold::Unlimited);
        assert_eq!(config.logging.format.as_deref(), Some("json"));
    }

    #[test]
    fn test_rejects_nested_values() {
        let err = CopyConfig::from_toml("[copy]\nheader = [1, 2]\n").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let config = CopyConfig::from_toml("[copy]\nmaxrequests = 8\n")
            .unwrap()
            .with_overrides_from([
                ("TABLECOPY_MAXREQUESTS", "2"),
                ("TABLECOPY_LOG_FORMAT", "pretty"),
                ("TABLECOPY_DATA", "/tmp/x.json"),
                ("OTHER_HEADER", "true"),
            ]);
        assert_eq!(config.defaults.max_requests(), 2);
        assert!(!config.defaults.header());
        assert!(!config.defaults.contains("DATA"));
        assert_eq!(config.logging.format.as_deref(), Some("pretty"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[copy]\ndelimiter = \"|\"").unwrap();
        let config = CopyConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.defaults.delimiter(), b'|');
        assert_eq!(config.source.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = CopyConfig::load_from_file(Path::new("/nonexistent/tablecopy.toml")).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}
