use anyhow::{Context, Result};
use fias_catalog_core::codepage::Codepage;
use fias_catalog_core::import::DEFAULT_BATCH_SIZE;
use fias_catalog_core::query::{DEFAULT_CHILDREN_LIMIT, DEFAULT_LIMIT};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub encoding: Codepage,
    /// Field separator of the tabular dump; a single ASCII character.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Keep only address elements of this region code.
    #[serde(default)]
    pub region: Option<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            encoding: Codepage::default(),
            delimiter: default_delimiter(),
            region: None,
        }
    }
}

impl ImportConfig {
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_delimiter() -> String {
    ",".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_children_limit")]
    pub children_limit: i64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            children_limit: default_children_limit(),
        }
    }
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}
fn default_children_limit() -> i64 {
    DEFAULT_CHILDREN_LIMIT
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.import.batch_size == 0 {
        anyhow::bail!("import.batch_size must be > 0");
    }

    if config.import.delimiter.len() != 1 {
        anyhow::bail!(
            "import.delimiter must be a single ASCII character, got '{}'",
            config.import.delimiter
        );
    }

    if config.query.default_limit < 1 {
        anyhow::bail!("query.default_limit must be >= 1");
    }

    if config.query.children_limit < 1 {
        anyhow::bail!("query.children_limit must be >= 1");
    }

    Ok(config)
}
