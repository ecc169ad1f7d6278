//! ProcLineage Core
//!
//! Core domain model with stable, versioned types.
//! Never rename diagnostic codes - they are part of the public API.

pub mod diagnostic;
pub mod lineage;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity, Location};
pub use lineage::{
    source_fingerprint, CteDefinition, DynamicSqlKind, DynamicSqlUsage, ExtractionResult,
    LineageColumn, LineageEdge, ObjectKind, TempColumn, TempTableInfo, TransformationKind,
    CTE_SCHEMA, DEFAULT_SCHEMA, DERIVED_SCHEMA, TEMP_SCHEMA,
};
pub use report::{LineageReport, ReportSummary, ReportVersion};
pub use config::{BatchConfig, ConfidenceConfig, Config, ConfigError, DialectConfig};
