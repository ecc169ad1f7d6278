//! Schema catalog for lineage resolution
//!
//! The extractor consults a [`SchemaCatalog`] synchronously during traversal.
//! Catalog contents are loaded out of band by a [`CatalogSource`] into an
//! immutable [`CatalogSnapshot`], and published to concurrent readers through
//! a [`SharedCatalog`] that swaps whole snapshots.
//!
//! ## Example
//!
//! ```rust,ignore
//! use proclineage_catalog::{JsonFileSource, SharedCatalog, SchemaCatalog};
//!
//! let source = JsonFileSource::new("catalog.json");
//! let catalog = SharedCatalog::load(&source).await?;
//! let cols = catalog.columns_of("dbo", "Orders");
//! ```

pub mod catalog;
pub mod source;
pub mod json;
pub mod mock;

pub use catalog::{CatalogSnapshot, SchemaCatalog, SharedCatalog, TableEntry};
pub use source::{CatalogSource, FetchError, TableIdentifier};
pub use json::JsonFileSource;
pub use mock::{MockSource, MockSourceBuilder};
