//! Test fixtures for catalog integration tests
//!
//! Table layouts shaped like a small order-processing database.

use proclineage_catalog::{CatalogSnapshot, MockSourceBuilder, MockSource};

/// Orders table with a customer foreign key
pub const ORDERS: &[&str] = &["OrderId", "CustomerId", "OrderDate", "Total", "Status"];

/// Customers table
pub const CUSTOMERS: &[&str] = &["CustomerId", "Name", "Email", "Region"];

/// Daily sales rollup written by reporting procedures
pub const DAILY_SALES: &[&str] = &["SaleDate", "Region", "OrderCount", "Revenue"];

/// Snapshot with every fixture table
pub fn sales_snapshot() -> CatalogSnapshot {
    CatalogSnapshot::new()
        .with_table("dbo", "Orders", ORDERS.iter().copied())
        .with_table("dbo", "Customers", CUSTOMERS.iter().copied())
        .with_table("rpt", "DailySales", DAILY_SALES.iter().copied())
}

/// Mock source holding the same tables as [`sales_snapshot`]
pub fn sales_source() -> MockSource {
    MockSourceBuilder::new()
        .with_table("dbo", "Orders", ORDERS)
        .with_table("dbo", "Customers", CUSTOMERS)
        .with_table("rpt", "DailySales", DAILY_SALES)
        .build()
}
