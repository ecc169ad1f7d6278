//! Integration tests for catalog sources and the shared catalog
//!
//! ```bash
//! cargo test -p proclineage-catalog --test integration_tests
//! ```

mod fixtures;

use pretty_assertions::assert_eq;
use proclineage_catalog::{
    CatalogSnapshot, CatalogSource, FetchError, JsonFileSource, MockSource, SchemaCatalog,
    SharedCatalog, TableIdentifier,
};
use std::sync::Arc;

// =============================================================================
// Source -> SharedCatalog workflow
// =============================================================================

#[tokio::test]
async fn test_mock_source_matches_snapshot() {
    let loaded = fixtures::sales_source().load_snapshot().await.unwrap();
    assert_eq!(loaded, fixtures::sales_snapshot());
}

#[tokio::test]
async fn test_shared_catalog_load_and_lookup() {
    let source = fixtures::sales_source();
    let catalog = SharedCatalog::load(&source).await.unwrap();

    assert_eq!(catalog.columns_of("dbo", "orders"), fixtures::ORDERS.to_vec());
    assert!(catalog.column_exists("RPT", "dailysales", "revenue"));
    assert!(!catalog.column_exists("dbo", "Orders", "Revenue"));
}

#[tokio::test]
async fn test_refresh_picks_up_new_tables() {
    let source = fixtures::sales_source();
    let catalog = SharedCatalog::load(&source).await.unwrap();
    assert!(catalog.columns_of("dbo", "Products").is_empty());

    source
        .add_table(
            TableIdentifier::new("dbo", "Products"),
            vec!["ProductId".to_string(), "Price".to_string()],
        )
        .await;

    let tables = catalog.refresh(&source).await.unwrap();
    assert_eq!(tables, 4);
    assert_eq!(catalog.columns_of("dbo", "Products"), vec!["ProductId", "Price"]);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let good = fixtures::sales_source();
    let catalog = SharedCatalog::load(&good).await.unwrap();

    let bad = MockSource::new().with_connection_failure();
    let err = catalog.refresh(&bad).await.unwrap_err();
    assert!(matches!(err, FetchError::NetworkError(_)));

    assert_eq!(catalog.columns_of("dbo", "Customers"), fixtures::CUSTOMERS.to_vec());
}

#[tokio::test]
async fn test_json_file_source_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    std::fs::write(&path, fixtures::sales_snapshot().to_json().unwrap()).unwrap();

    let source = JsonFileSource::new(&path);
    assert_eq!(source.name(), "JsonFile");
    let catalog = SharedCatalog::load(&source).await.unwrap();
    assert_eq!(catalog.snapshot().len(), 3);
    assert_eq!(catalog.columns_of("rpt", "DailySales"), fixtures::DAILY_SALES.to_vec());
}

// =============================================================================
// Concurrent readers
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_during_swap() {
    let catalog = Arc::new(SharedCatalog::new(fixtures::sales_snapshot()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let catalog = Arc::clone(&catalog);
        handles.push(tokio::task::spawn_blocking(move || {
            for _ in 0..200 {
                let snapshot = catalog.snapshot();
                let cols = snapshot.columns_of("dbo", "Orders");
                // a reader sees either the old or the new snapshot, never a mix
                assert!(cols.len() == 5 || cols.len() == 1);
            }
        }));
    }

    for _ in 0..50 {
        catalog.replace(CatalogSnapshot::new().with_table("dbo", "Orders", ["OrderId"]));
        catalog.replace(fixtures::sales_snapshot());
    }

    for handle in handles {
        handle.await.unwrap();
    }
}

#[test]
fn test_arc_catalog_is_a_catalog() {
    let catalog: Arc<dyn SchemaCatalog> = Arc::new(fixtures::sales_snapshot());
    assert!(catalog.column_exists("dbo", "Orders", "total"));
}
