//! Snapshot-based schema catalog

use crate::source::{CatalogSource, FetchError, TableIdentifier};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Read-only column lookups used during lineage extraction
///
/// All lookups are case-insensitive. Unknown tables yield an empty column
/// list rather than an error.
pub trait SchemaCatalog: Send + Sync {
    /// Ordered column names of `schema.table`; empty if unknown
    fn columns_of(&self, schema: &str, table: &str) -> Vec<String>;

    /// Whether `schema.table` has a column named `column`
    fn column_exists(&self, schema: &str, table: &str, column: &str) -> bool {
        self.columns_of(schema, table)
            .iter()
            .any(|c| c.eq_ignore_ascii_case(column))
    }
}

/// One table as it appears in the JSON catalog format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    tables: Vec<TableEntry>,
}

/// Immutable, case-insensitive map of tables to ordered column names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    tables: HashMap<(String, String), TableEntry>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a table (builder style)
    pub fn with_table<I, S>(mut self, schema: &str, table: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(schema, table, columns.into_iter().map(Into::into).collect());
        self
    }

    /// Add or replace a table
    pub fn insert(&mut self, schema: &str, table: &str, columns: Vec<String>) {
        let id = TableIdentifier::new(schema, table);
        self.tables.insert(
            id.key(),
            TableEntry {
                schema: schema.to_string(),
                table: table.to_string(),
                columns,
            },
        );
    }

    pub fn get(&self, table: &TableIdentifier) -> Option<&TableEntry> {
        self.tables.get(&table.key())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Tables sorted by schema then name
    pub fn entries(&self) -> Vec<&TableEntry> {
        let mut entries: Vec<_> = self.tables.values().collect();
        entries.sort_by(|a, b| {
            (a.schema.to_lowercase(), a.table.to_lowercase())
                .cmp(&(b.schema.to_lowercase(), b.table.to_lowercase()))
        });
        entries
    }

    /// Parse the `{"tables": [...]}` JSON format
    pub fn from_json(json: &str) -> Result<Self, FetchError> {
        let file: SnapshotFile = serde_json::from_str(json)
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        let mut snapshot = Self::new();
        for entry in file.tables {
            snapshot.insert(&entry.schema, &entry.table, entry.columns);
        }
        Ok(snapshot)
    }

    /// Serialize to the `{"tables": [...]}` JSON format
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let file = SnapshotFile {
            tables: self.entries().into_iter().cloned().collect(),
        };
        serde_json::to_string_pretty(&file)
    }
}

impl SchemaCatalog for CatalogSnapshot {
    fn columns_of(&self, schema: &str, table: &str) -> Vec<String> {
        self.get(&TableIdentifier::new(schema, table))
            .map(|entry| entry.columns.clone())
            .unwrap_or_default()
    }
}

/// Catalog shared across concurrent extractions
///
/// Readers take a cheap `Arc` clone of the current snapshot, so a refresh
/// never changes what an in-flight extraction sees.
#[derive(Debug, Default)]
pub struct SharedCatalog {
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl SharedCatalog {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Build from a freshly loaded source snapshot
    pub async fn load(source: &dyn CatalogSource) -> Result<Self, FetchError> {
        let snapshot = source.load_snapshot().await?;
        tracing::info!(source = source.name(), tables = snapshot.len(), "catalog loaded");
        Ok(Self::new(snapshot))
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        // A poisoned lock still holds a complete snapshot; swaps are atomic.
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Swap in a new snapshot
    pub fn replace(&self, snapshot: CatalogSnapshot) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(snapshot);
    }

    /// Reload from a source; on failure the previous snapshot stays in place
    pub async fn refresh(&self, source: &dyn CatalogSource) -> Result<usize, FetchError> {
        match source.load_snapshot().await {
            Ok(snapshot) => {
                let tables = snapshot.len();
                self.replace(snapshot);
                tracing::info!(source = source.name(), tables, "catalog refreshed");
                Ok(tables)
            }
            Err(e) => {
                tracing::warn!(source = source.name(), error = %e, "catalog refresh failed");
                Err(e)
            }
        }
    }
}

impl SchemaCatalog for SharedCatalog {
    fn columns_of(&self, schema: &str, table: &str) -> Vec<String> {
        self.snapshot().columns_of(schema, table)
    }
}

impl<T: SchemaCatalog + ?Sized> SchemaCatalog for Arc<T> {
    fn columns_of(&self, schema: &str, table: &str) -> Vec<String> {
        (**self).columns_of(schema, table)
    }

    fn column_exists(&self, schema: &str, table: &str, column: &str) -> bool {
        (**self).column_exists(schema, table, column)
    }
}
