//! Diagnostic codes and warning reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Parse failures (1xxx)
    /// The parse-tree source reported a syntax error
    SqlParseError,

    // Resolution failures (2xxx)
    /// A column reference matched no binding in scope
    LineageUnresolvedColumn,

    /// A column reference matched more than one binding in scope
    LineageAmbiguousColumn,

    /// An INSERT/MERGE target has no explicit column list and no catalog entry
    LineageTargetColumnsUnknown,

    // Unsupported constructs (3xxx)
    /// EXECUTE of a command string or prepared statement
    LineageDynamicSql,

    /// OPENQUERY / OPENROWSET / OPENDATASOURCE row source
    LineageExternalRowSource,

    /// SELECT * over a source whose columns are not known
    LineageStarUnexpandable,

    /// Statement shape the extractor does not model
    LineageUnsupportedStatement,

    // Guards (9xxx)
    /// Nesting depth guard tripped; the result is partial
    LineageDepthLimit,

    /// Extraction stopped by a cancellation signal; the result is partial
    LineageCancelled,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlParseError => "SQL_PARSE_ERROR",
            Self::LineageUnresolvedColumn => "LINEAGE_UNRESOLVED_COLUMN",
            Self::LineageAmbiguousColumn => "LINEAGE_AMBIGUOUS_COLUMN",
            Self::LineageTargetColumnsUnknown => "LINEAGE_TARGET_COLUMNS_UNKNOWN",
            Self::LineageDynamicSql => "LINEAGE_DYNAMIC_SQL",
            Self::LineageExternalRowSource => "LINEAGE_EXTERNAL_ROW_SOURCE",
            Self::LineageStarUnexpandable => "LINEAGE_STAR_UNEXPANDABLE",
            Self::LineageUnsupportedStatement => "LINEAGE_UNSUPPORTED_STATEMENT",
            Self::LineageDepthLimit => "LINEAGE_DEPTH_LIMIT",
            Self::LineageCancelled => "LINEAGE_CANCELLED",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - lineage is incomplete or best-effort
    Warn,

    /// Error - the routine could not be analyzed at all
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Position in the routine's source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Line number (1-indexed)
    pub line: usize,

    /// Optional column number (1-indexed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl Location {
    /// Create a location with just a line number
    pub fn line(line: usize) -> Self {
        Self { line, column: None }
    }

    /// Create a location with line and column
    pub fn with_position(line: usize, column: usize) -> Self {
        Self {
            line,
            column: Some(column),
        }
    }
}

/// A warning or error attached to an extraction result
///
/// `Display` renders the human-readable message only, so a list of
/// diagnostics reads as a list of warning strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source location (best-effort)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
        }
    }

    /// Shorthand for a warning
    pub fn warn(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warn, message)
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the location from a line number
    pub fn at_line(self, line: usize) -> Self {
        self.with_location(Location::line(line))
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_code_stability() {
        assert_eq!(DiagnosticCode::SqlParseError.as_str(), "SQL_PARSE_ERROR");
        assert_eq!(
            DiagnosticCode::LineageAmbiguousColumn.as_str(),
            "LINEAGE_AMBIGUOUS_COLUMN"
        );
        assert_eq!(DiagnosticCode::LineageDynamicSql.to_string(), "LINEAGE_DYNAMIC_SQL");
    }

    #[test]
    fn diagnostic_displays_message_only() {
        let diag = Diagnostic::warn(DiagnosticCode::LineageUnresolvedColumn, "unable to resolve column: x")
            .at_line(7);

        assert_eq!(diag.to_string(), "unable to resolve column: x");
        assert_eq!(diag.location, Some(Location::line(7)));
    }

    #[test]
    fn diagnostic_serialization() {
        let diag = Diagnostic::warn(DiagnosticCode::LineageDynamicSql, "dynamic")
            .with_location(Location::with_position(3, 5));

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("LINEAGE_DYNAMIC_SQL"));
        assert!(json.contains("\"warn\""));
        assert!(json.contains("\"column\":5"));
    }
}
