//! ProcLineage engine - batch extraction
//!
//! Runs many independent routines through one [`LineageExtractor`]
//! concurrently and assembles a versioned [`LineageReport`]:
//! - bounded parallelism on tokio's blocking pool
//! - results in input order
//! - cooperative cancellation between and inside routines
//!
//! [`LineageExtractor`]: proclineage_sql::LineageExtractor
//! [`LineageReport`]: proclineage_core::LineageReport

pub mod batch;

pub use batch::{BatchError, BatchExtractor, RoutineInput};
pub use proclineage_sql::CancelToken;
