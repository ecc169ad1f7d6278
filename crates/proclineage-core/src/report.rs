//! Batch report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};
use crate::lineage::ExtractionResult;

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Summary statistics for a report
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Number of routines in the report
    pub routines: usize,

    /// Total lineage edges across all routines
    pub edges: usize,

    /// Total warnings across all routines
    pub warnings: usize,

    /// Total dynamic-SQL usages
    pub dynamic_sql: usize,

    /// Routines that failed to parse
    pub parse_failures: usize,

    /// Routines that were cancelled or never started
    pub cancelled: usize,

    /// Mean overall confidence (0 for an empty report)
    pub mean_confidence: f64,
}

impl ReportSummary {
    fn from_results(results: &[ExtractionResult]) -> Self {
        let routines = results.len();
        let mean_confidence = if routines == 0 {
            0.0
        } else {
            let total: f64 = results.iter().map(|r| r.overall_confidence).sum();
            (total / routines as f64 * 10_000.0).round() / 10_000.0
        };

        Self {
            routines,
            edges: results.iter().map(|r| r.edges.len()).sum(),
            warnings: results.iter().map(|r| r.warnings.len()).sum(),
            dynamic_sql: results.iter().map(|r| r.dynamic_sql_usages.len()).sum(),
            parse_failures: results.iter().filter(|r| r.has_parse_errors()).count(),
            cancelled: results.iter().filter(|r| r.was_cancelled()).count(),
            mean_confidence,
        }
    }
}

/// Lineage report (report.json v1)
///
/// This is the stable output format.
/// All fields are versioned and backward-compatible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Summary statistics
    pub summary: ReportSummary,

    /// Per-routine results, in input order
    pub results: Vec<ExtractionResult>,

    /// Metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl LineageReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self::from_results(Vec::new())
    }

    /// Create a report from extraction results
    pub fn from_results(results: Vec<ExtractionResult>) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: ReportSummary::from_results(&results),
            results,
            metadata: None,
        }
    }

    /// Add a result and recompute the summary
    pub fn add_result(&mut self, result: ExtractionResult) {
        self.results.push(result);
        self.summary = ReportSummary::from_results(&self.results);
    }

    /// Attach free-form metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Check if any routine failed to parse
    pub fn has_parse_failures(&self) -> bool {
        self.summary.parse_failures > 0
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

impl Default for LineageReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{Diagnostic, DiagnosticCode};
    use crate::lineage::ObjectKind;
    use pretty_assertions::assert_eq;

    fn result(name: &str, confidence: f64) -> ExtractionResult {
        let mut r = ExtractionResult::empty(name, ObjectKind::Procedure);
        r.overall_confidence = confidence;
        r
    }

    #[test]
    fn empty_report() {
        let report = LineageReport::new();
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(report.summary, ReportSummary::default());
        assert!(!report.has_parse_failures());
    }

    #[test]
    fn summary_counts() {
        let ok = result("a", 1.0);
        let mut failed = result("b", 0.0);
        failed
            .warnings
            .push(Diagnostic::warn(DiagnosticCode::SqlParseError, "parse error at line 2: boom"));
        let mut cancelled = result("c", 0.5);
        cancelled
            .warnings
            .push(Diagnostic::warn(DiagnosticCode::LineageCancelled, "cancelled"));

        let report = LineageReport::from_results(vec![ok, failed, cancelled]);
        assert_eq!(report.summary.routines, 3);
        assert_eq!(report.summary.warnings, 2);
        assert_eq!(report.summary.parse_failures, 1);
        assert_eq!(report.summary.cancelled, 1);
        assert_eq!(report.summary.mean_confidence, 0.5);
        assert!(report.has_parse_failures());
    }

    #[test]
    fn add_result_updates_summary() {
        let mut report = LineageReport::new();
        report.add_result(result("a", 0.9));
        assert_eq!(report.summary.routines, 1);
        assert_eq!(report.summary.mean_confidence, 0.9);
    }

    #[test]
    fn report_serialization() {
        let report = LineageReport::from_results(vec![result("p", 1.0)]);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"results\""));
        assert!(json.contains("\"mean_confidence\""));
    }
}
