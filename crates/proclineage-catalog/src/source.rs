//! Catalog source trait for loading schema snapshots

use crate::catalog::CatalogSnapshot;
use std::fmt;

/// Identifies a table or view by schema and name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIdentifier {
    /// Schema name
    pub schema: String,

    /// Table or view name
    pub table: String,
}

impl TableIdentifier {
    /// Create a new table identifier
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Get fully qualified name
    pub fn fqn(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Lower-cased key used for case-insensitive lookups
    pub(crate) fn key(&self) -> (String, String) {
        (self.schema.to_lowercase(), self.table.to_lowercase())
    }
}

impl fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fqn())
    }
}

/// Errors that can occur when loading a catalog
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Something that can produce a catalog snapshot
///
/// Loading is async because real sources talk to a database or a file
/// system; the resulting snapshot is then read synchronously.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Get the source name (e.g., "JsonFile", "Mock")
    fn name(&self) -> &'static str;

    /// Load a complete snapshot of every known table
    async fn load_snapshot(&self) -> Result<CatalogSnapshot, FetchError>;

    /// Check that the source is reachable before loading
    async fn test_connection(&self) -> Result<(), FetchError>;
}
