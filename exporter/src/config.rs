//! Exporter configuration
//!
//! Settings come from a required default file (`./configs/default.yaml`) and
//! an optional additional file named by environment variables, whose values
//! are merged over the defaults:
//!
//! - `KUBECOST_EXPORTER_CONFIG_NAME`
//! - `KUBECOST_EXPORTER_CONFIG_TYPE`
//! - `KUBECOST_EXPORTER_CONFIG_PATH`
//!
//! Keys are case-insensitive and read back in lowercase.

use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_CONFIG_NAME: &str = "default";
pub const DEFAULT_CONFIG_TYPE: &str = "yaml";
pub const DEFAULT_CONFIG_PATH: &str = "./configs";

pub const ADDITIONAL_CONFIG_NAME_ENV_VAR: &str = "KUBECOST_EXPORTER_CONFIG_NAME";
pub const ADDITIONAL_CONFIG_TYPE_ENV_VAR: &str = "KUBECOST_EXPORTER_CONFIG_TYPE";
pub const ADDITIONAL_CONFIG_PATH_ENV_VAR: &str = "KUBECOST_EXPORTER_CONFIG_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unsupported config type '{0}'")]
    UnsupportedFormat(String),

    #[error("Additional config not found in '{0}'")]
    AdditionalNotFound(String),

    #[error("Invalid configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Location of one configuration file: `<path>/<name>.<type>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub name: String,
    pub format: String,
    pub path: String,
}

impl ConfigSource {
    pub fn new(
        name: impl Into<String>,
        format: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
            path: path.into(),
        }
    }

    /// The default file (`default.yaml`) inside `path`
    pub fn default_in(path: impl Into<String>) -> Self {
        Self::new(DEFAULT_CONFIG_NAME, DEFAULT_CONFIG_TYPE, path)
    }

    /// Additional source from the environment, if all three variables are non-empty
    pub fn from_env() -> Option<Self> {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Some(Self::new(
            var(ADDITIONAL_CONFIG_NAME_ENV_VAR)?,
            var(ADDITIONAL_CONFIG_TYPE_ENV_VAR)?,
            var(ADDITIONAL_CONFIG_PATH_ENV_VAR)?,
        ))
    }

    /// `<path>/<name>.<type>`, as shown in error messages
    pub fn location(&self) -> String {
        format!("{}/{}.{}", self.path, self.name, self.format)
    }

    fn file_format(&self) -> Result<FileFormat, ConfigError> {
        match self.format.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(FileFormat::Yaml),
            "json" => Ok(FileFormat::Json),
            "toml" => Ok(FileFormat::Toml),
            _ => Err(ConfigError::UnsupportedFormat(self.format.clone())),
        }
    }

    fn file(&self) -> Result<impl config::Source + Send + Sync + 'static, ConfigError> {
        let base = Path::new(&self.path).join(&self.name);
        Ok(File::new(&base.to_string_lossy(), self.file_format()?))
    }
}

/// Full exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub server: ServerConfig,

    pub metrics: MetricsConfig,
}

/// Where to reach the Allocation API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,

    pub port: u16,

    pub path: String,

    /// Query parameters; `window` holds a relative duration ("1m", "1h", ...)
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9003,
            path: "/allocation/compute".to_string(),
            parameters: BTreeMap::from([("window".to_string(), "1m".to_string())]),
        }
    }
}

/// Scrape endpoint and polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,

    /// Path serving the Prometheus text exposition
    pub path: String,

    /// Polling interval ("1m", "30s", ...); falls back to 1m when unparseable
    pub update_interval: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9090,
            path: "/metrics".to_string(),
            update_interval: "1m".to_string(),
        }
    }
}

/// Metric and label definitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub namespace: String,

    #[serde(default)]
    pub subsystem: String,

    /// One gauge per entry
    pub names: Vec<MetricName>,

    /// Labels shared by every gauge
    pub labels: Vec<LabelSource>,
}

/// A gauge and the allocation field it reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricName {
    pub name: String,
    pub field: String,
}

/// A label and the dotted path into allocation properties it is read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSource {
    pub name: String,
    pub key: String,
}

impl ExporterConfig {
    /// Load the default source, then merge the additional source over it.
    ///
    /// A missing or unreadable default file, or settings that do not match
    /// the expected shape, are errors. A missing additional file is not: the
    /// defaults are returned along with [`ConfigError::AdditionalNotFound`]
    /// for the caller to report.
    pub fn load(
        default: &ConfigSource,
        additional: Option<&ConfigSource>,
    ) -> Result<(Self, Option<ConfigError>), ConfigError> {
        let mut builder = Config::builder().add_source(default.file()?);
        let mut warning = None;

        if let Some(extra) = additional {
            let readable = extra
                .file()
                .and_then(|f| Ok(Config::builder().add_source(f).build()?));
            match readable {
                Ok(_) => builder = builder.add_source(extra.file()?),
                Err(_) => warning = Some(ConfigError::AdditionalNotFound(extra.location())),
            }
        }

        let config = builder.build()?.try_deserialize()?;
        Ok((config, warning))
    }

    /// Load from `dir/default.yaml` plus the environment-selected additional file
    pub fn load_from_dir(dir: &str) -> Result<(Self, Option<ConfigError>), ConfigError> {
        let additional = ConfigSource::from_env();
        Self::load(&ConfigSource::default_in(dir), additional.as_ref())
    }

    /// Parse a configuration from a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?)
    }
}
