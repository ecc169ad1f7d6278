//! Configuration schema (proclineage.toml)

use serde::{Deserialize, Serialize};
use crate::lineage::DEFAULT_SCHEMA;

/// Environment variable that overrides `default_schema`
pub const DEFAULT_SCHEMA_ENV: &str = "PROCLINEAGE_DEFAULT_SCHEMA";

/// Parser grammar selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectConfig {
    /// SQL Server (T-SQL)
    MsSql,

    /// Generic ANSI SQL
    Generic,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self::MsSql
    }
}

/// Penalties applied by the confidence scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Per dynamic-SQL usage
    pub dynamic_sql_penalty: f64,

    /// Per unresolved-column warning
    pub unresolved_penalty: f64,

    /// Per ambiguous-column warning
    pub ambiguous_penalty: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            dynamic_sql_penalty: 0.10,
            unresolved_penalty: 0.05,
            ambiguous_penalty: 0.03,
        }
    }
}

/// Batch driver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum routines extracted concurrently
    pub max_parallel: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_parallel: 4 }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQL dialect
    #[serde(default)]
    pub dialect: DialectConfig,

    /// Schema assumed for unqualified physical table names
    #[serde(default = "default_schema")]
    pub default_schema: String,

    /// Nesting guard for subqueries and expressions
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Keep the producing expression's text on each edge
    #[serde(default = "default_true")]
    pub include_expression_text: bool,

    /// Emit `Join`/`Where` edges for predicate columns
    #[serde(default)]
    pub predicate_lineage: bool,

    #[serde(default)]
    pub confidence: ConfidenceConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: std::path::PathBuf,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_max_depth() -> usize {
    64
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: DialectConfig::default(),
            default_schema: default_schema(),
            max_depth: default_max_depth(),
            include_expression_text: true,
            predicate_lineage: false,
            confidence: ConfidenceConfig::default(),
            batch: BatchConfig::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Apply `PROCLINEAGE_DEFAULT_SCHEMA` if set
    pub fn apply_env_overrides(&mut self) {
        if let Ok(schema) = std::env::var(DEFAULT_SCHEMA_ENV) {
            let schema = schema.trim();
            if !schema.is_empty() {
                self.default_schema = schema.to_string();
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::InvalidValue("max_depth must be at least 1".into()));
        }
        if self.batch.max_parallel == 0 {
            return Err(ConfigError::InvalidValue("batch.max_parallel must be at least 1".into()));
        }
        let c = &self.confidence;
        for (name, value) in [
            ("dynamic_sql_penalty", c.dynamic_sql_penalty),
            ("unresolved_penalty", c.unresolved_penalty),
            ("ambiguous_penalty", c.ambiguous_penalty),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue(format!(
                    "confidence.{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}
