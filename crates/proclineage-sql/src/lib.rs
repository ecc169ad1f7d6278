//! Column-level lineage extraction for T-SQL routines
//!
//! This crate handles:
//! - Parsing T-SQL using datafusion-sqlparser-rs (batch splitting, routine
//!   wrappers, table variables and `EXEC (...)` normalized first)
//! - Lowering the parser's tree into a closed AST
//! - Scope tracking for aliases, CTEs, temp tables and derived tables
//! - Column resolution against a [`SchemaCatalog`](proclineage_catalog::SchemaCatalog)
//! - Transformation classification and dynamic-SQL detection
//! - Confidence scoring
//!
//! ## Example
//!
//! ```rust,ignore
//! use proclineage_catalog::CatalogSnapshot;
//! use proclineage_core::ObjectKind;
//! use proclineage_sql::LineageExtractor;
//! use std::sync::Arc;
//!
//! let catalog = CatalogSnapshot::new().with_table("dbo", "S", ["a", "b"]);
//! let extractor = LineageExtractor::new(Arc::new(catalog));
//! let result = extractor.extract(
//!     "INSERT INTO dbo.T (a, b) SELECT x.a, x.b FROM dbo.S x;",
//!     "dbo.usp_Load",
//!     ObjectKind::Procedure,
//! );
//! assert_eq!(result.edges.len(), 2);
//! ```

pub mod ast;
pub mod cancel;
pub mod classify;
pub mod collector;
pub mod confidence;
pub mod dynamic;
pub mod extractor;
pub mod normalize;
pub mod parser;
pub mod resolver;
pub mod scope;

mod lower;

pub use cancel::CancelToken;
pub use classify::classify;
pub use extractor::LineageExtractor;
pub use parser::{ParseOutput, ParseTreeSource, SqlParser, SyntaxError};
pub use resolver::{ColumnResolver, Resolution};
pub use scope::{BindingKind, BindingSet, QueryContext, Scope, TableBinding};
