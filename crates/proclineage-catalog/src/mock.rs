//! Mock catalog source for testing
//!
//! This source returns predefined tables without touching any database.
//! It's useful for:
//! - Unit testing lineage resolution against a known catalog
//! - Exercising catalog refresh and failure paths
//! - Demos without a real catalog export
//!
//! ## Usage
//!
//! ```rust,ignore
//! use proclineage_catalog::{MockSource, CatalogSource, TableIdentifier};
//!
//! let source = MockSource::new();
//! source.add_table(TableIdentifier::new("dbo", "users"), vec!["id".into(), "name".into()]).await;
//!
//! let snapshot = source.load_snapshot().await?;
//! ```
//!
//! ## Simulating Failures
//!
//! ```rust,ignore
//! // Simulate connection failure
//! let source = MockSource::new().with_connection_failure();
//! assert!(source.load_snapshot().await.is_err());
//!
//! // Simulate latency
//! let source = MockSource::new().with_latency(100); // 100ms delay
//! ```

use crate::catalog::CatalogSnapshot;
use crate::source::{CatalogSource, FetchError, TableIdentifier};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Mock catalog source for testing
///
/// Tables are stored in memory and shared between clones, so a test can
/// mutate the source after handing a clone to the code under test.
pub struct MockSource {
    /// Table columns in insertion order
    tables: Arc<RwLock<Vec<(TableIdentifier, Vec<String>)>>>,

    /// Errors to return when loading a specific table
    errors: Arc<RwLock<HashMap<String, FetchError>>>,

    /// Simulate connection failure
    fail_connection: bool,

    /// Simulate load latency (milliseconds)
    latency_ms: u64,

    /// Name to return from name() method
    source_name: &'static str,
}

impl MockSource {
    /// Create a new mock source with no tables
    pub fn new() -> Self {
        MockSourceBuilder::new().build()
    }

    /// Add or replace a table's columns
    pub async fn add_table(&self, table: TableIdentifier, columns: Vec<String>) {
        let mut tables = self.tables.write().await;
        match tables.iter_mut().find(|(id, _)| id.key() == table.key()) {
            Some(entry) => entry.1 = columns,
            None => tables.push((table, columns)),
        }
    }

    /// Add a table using string identifiers for convenience
    pub async fn add_table_for(&self, schema: &str, table: &str, columns: &[&str]) {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.add_table(TableIdentifier::new(schema, table), columns).await;
    }

    /// Configure an error to be returned whenever a table is loaded
    ///
    /// A snapshot load fails as a whole if any table has an error configured.
    pub async fn add_error_for_table(&self, table: TableIdentifier, error: FetchError) {
        self.errors.write().await.insert(table.fqn(), error);
    }

    /// Configure to fail all connection tests and loads
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Configure simulated latency for all operations
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Set a custom source name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.source_name = name;
        self
    }

    /// Get the number of tables stored in the source
    pub async fn table_count(&self) -> usize {
        self.tables.read().await.len()
    }

    /// Clear all stored tables
    pub async fn clear_tables(&self) {
        self.tables.write().await.clear();
    }

    /// Clear all stored errors
    pub async fn clear_errors(&self) {
        self.errors.write().await.clear();
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockSource {
    fn clone(&self) -> Self {
        Self {
            tables: Arc::clone(&self.tables),
            errors: Arc::clone(&self.errors),
            fail_connection: self.fail_connection,
            latency_ms: self.latency_ms,
            source_name: self.source_name,
        }
    }
}

#[async_trait::async_trait]
impl CatalogSource for MockSource {
    fn name(&self) -> &'static str {
        self.source_name
    }

    async fn load_snapshot(&self) -> Result<CatalogSnapshot, FetchError> {
        self.test_connection().await?;

        let tables = self.tables.read().await;
        let errors = self.errors.read().await;

        let mut snapshot = CatalogSnapshot::new();
        for (id, columns) in tables.iter() {
            if let Some(error) = errors.get(&id.fqn()) {
                return Err(error.clone());
            }
            snapshot.insert(&id.schema, &id.table, columns.clone());
        }
        Ok(snapshot)
    }

    async fn test_connection(&self) -> Result<(), FetchError> {
        self.simulate_latency().await;

        if self.fail_connection {
            Err(FetchError::NetworkError(
                "Simulated connection failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Builder for creating MockSource with multiple tables
///
/// ```rust,ignore
/// let source = MockSourceBuilder::new()
///     .with_table("dbo", "users", &["id", "name"])
///     .with_table("dbo", "orders", &["order_id", "user_id"])
///     .with_latency(50)
///     .build();
/// ```
pub struct MockSourceBuilder {
    tables: Vec<(TableIdentifier, Vec<String>)>,
    errors: HashMap<String, FetchError>,
    fail_connection: bool,
    latency_ms: u64,
    source_name: &'static str,
}

impl MockSourceBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            errors: HashMap::new(),
            fail_connection: false,
            latency_ms: 0,
            source_name: "Mock",
        }
    }

    /// Add a table
    pub fn with_table(mut self, schema: &str, table: &str, columns: &[&str]) -> Self {
        self.tables.push((
            TableIdentifier::new(schema, table),
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    /// Add an error for a specific table
    pub fn with_error(mut self, schema: &str, table: &str, error: FetchError) -> Self {
        self.errors.insert(TableIdentifier::new(schema, table).fqn(), error);
        self
    }

    /// Configure connection failure
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Configure latency
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Set source name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.source_name = name;
        self
    }

    /// Build the MockSource
    pub fn build(self) -> MockSource {
        MockSource {
            tables: Arc::new(RwLock::new(self.tables)),
            errors: Arc::new(RwLock::new(self.errors)),
            fail_connection: self.fail_connection,
            latency_ms: self.latency_ms,
            source_name: self.source_name,
        }
    }
}

impl Default for MockSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SchemaCatalog;

    #[tokio::test]
    async fn test_mock_source_basic() {
        let source = MockSource::new();
        source.add_table_for("dbo", "users", &["id", "name"]).await;

        assert_eq!(source.table_count().await, 1);
        let snapshot = source.load_snapshot().await.unwrap();
        assert_eq!(snapshot.columns_of("dbo", "users"), vec!["id", "name"]);
    }

    #[tokio::test]
    async fn test_add_table_replaces_existing() {
        let source = MockSource::new();
        source.add_table_for("dbo", "users", &["id"]).await;
        source.add_table_for("DBO", "Users", &["id", "email"]).await;

        assert_eq!(source.table_count().await, 1);
        let snapshot = source.load_snapshot().await.unwrap();
        assert_eq!(snapshot.columns_of("dbo", "users"), vec!["id", "email"]);
    }

    #[tokio::test]
    async fn test_connection_failure() {
        let source = MockSource::new().with_connection_failure();
        assert!(matches!(
            source.test_connection().await,
            Err(FetchError::NetworkError(_))
        ));
        assert!(source.load_snapshot().await.is_err());
    }

    #[tokio::test]
    async fn test_table_error() {
        let source = MockSourceBuilder::new()
            .with_table("dbo", "secret", &["x"])
            .with_error("dbo", "secret", FetchError::PermissionDenied("nope".into()))
            .build();

        assert!(matches!(
            source.load_snapshot().await,
            Err(FetchError::PermissionDenied(_))
        ));

        source.clear_errors().await;
        assert!(source.load_snapshot().await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_table_is_absent_not_an_error() {
        let source = MockSourceBuilder::new().with_table("dbo", "users", &["id"]).build();

        let snapshot = source.load_snapshot().await.unwrap();
        assert!(snapshot.get(&TableIdentifier::new("dbo", "orders")).is_none());
        assert!(snapshot.columns_of("dbo", "orders").is_empty());
        assert!(snapshot.column_exists("dbo", "users", "id"));
    }

    #[tokio::test]
    async fn test_latency() {
        let source = MockSource::new().with_latency(20);
        let start = std::time::Instant::now();
        source.test_connection().await.unwrap();
        assert!(start.elapsed() >= std::time::Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_clone_shares_tables() {
        let source = MockSource::new().with_name("Staging");
        let clone = source.clone();
        source.add_table_for("dbo", "t", &["a"]).await;

        assert_eq!(clone.name(), "Staging");
        assert_eq!(clone.table_count().await, 1);

        clone.clear_tables().await;
        assert_eq!(source.table_count().await, 0);
    }
}
