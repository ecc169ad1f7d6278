//! Column-level lineage data model
//!
//! All values here are immutable once produced by the extractor. Identity of a
//! [`LineageColumn`] is its three name parts.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use crate::diagnostic::{Diagnostic, DiagnosticCode};

/// Schema used when a physical table reference carries no schema
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Schema tag for columns produced by a common table expression
pub const CTE_SCHEMA: &str = "CTE";

/// Schema tag for `#temp` tables and `@table` variables
pub const TEMP_SCHEMA: &str = "tempdb";

/// Schema tag for derived tables (subqueries in FROM)
pub const DERIVED_SCHEMA: &str = "derived";

/// A fully-qualified column
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineageColumn {
    pub schema: String,
    pub table: String,
    pub column: String,
}

impl LineageColumn {
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            column: column.into(),
        }
    }

    /// Column whose table could not be determined
    pub fn placeholder(column: impl Into<String>) -> Self {
        Self::new("", "", column)
    }

    pub fn is_placeholder(&self) -> bool {
        self.schema.is_empty() && self.table.is_empty()
    }

    /// True for CTE, temp-table and derived-table columns
    pub fn is_transient(&self) -> bool {
        [CTE_SCHEMA, TEMP_SCHEMA, DERIVED_SCHEMA]
            .iter()
            .any(|s| self.schema.eq_ignore_ascii_case(s))
    }

    /// `schema.table` part, used as the persistence key of the owning object
    pub fn table_fqn(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

impl std::fmt::Display for LineageColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_placeholder() {
            write!(f, "?.{}", self.column)
        } else {
            write!(f, "{}.{}.{}", self.schema, self.table, self.column)
        }
    }
}

/// How a target column's value is derived from a source column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransformationKind {
    Direct,
    Aggregation,
    CaseExpression,
    Function,
    Arithmetic,
    Concatenation,
    Coalesce,
    /// Column participates in a join condition of the producing statement
    Join,
    /// Column participates in a WHERE filter of the producing statement
    Where,
    Unknown,
}

impl std::fmt::Display for TransformationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Direct => "direct",
            Self::Aggregation => "aggregation",
            Self::CaseExpression => "case",
            Self::Function => "function",
            Self::Arithmetic => "arithmetic",
            Self::Concatenation => "concatenation",
            Self::Coalesce => "coalesce",
            Self::Join => "join",
            Self::Where => "where",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A directed `source -> target` lineage relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub source: LineageColumn,
    pub target: LineageColumn,
    pub kind: TransformationKind,

    /// Source text of the producing expression
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression_text: Option<String>,

    /// Routine that produced this edge
    pub producing_object: String,

    /// 1-indexed line of the producing statement (0 if unknown)
    pub source_line: usize,

    /// In `[0, 1]`; 1.0 unless the source column is a best guess
    pub confidence: f64,
}

/// Kind of construct that defeats static analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DynamicSqlKind {
    /// `EXEC (@sql)`, `EXEC @proc_name`
    ExecString,

    /// `sp_executesql` and the `sp_prepare` family
    PreparedStatement,

    /// `OPENQUERY`, `OPENROWSET`, `OPENDATASOURCE`
    ExternalRowSource,
}

impl std::fmt::Display for DynamicSqlKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExecString => write!(f, "execute string"),
            Self::PreparedStatement => write!(f, "prepared statement"),
            Self::ExternalRowSource => write!(f, "external row source"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicSqlUsage {
    pub kind: DynamicSqlKind,
    pub line: usize,
    pub column: usize,

    /// Short excerpt of the offending construct
    pub fragment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempColumn {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

/// A `#temp` table or `@table` variable defined inside the routine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempTableInfo {
    pub name: String,
    pub columns: Vec<TempColumn>,
    pub is_global: bool,
    pub is_table_variable: bool,
    pub definition_line: usize,
}

impl TempTableInfo {
    /// Build from a name, deriving the global/table-variable flags from its prefix
    pub fn from_name(name: impl Into<String>, columns: Vec<TempColumn>, line: usize) -> Self {
        let name = name.into();
        Self {
            is_global: name.starts_with("##"),
            is_table_variable: name.starts_with('@'),
            name,
            columns,
            definition_line: line,
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Name and output columns of a `WITH` clause entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CteDefinition {
    pub name: String,
    pub output_columns: Vec<String>,
    pub line: usize,
}

/// What kind of database object a routine is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Procedure,
    Function,
    View,
    Trigger,
    /// Anonymous script with no routine wrapper
    Batch,
}

impl std::str::FromStr for ObjectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "procedure" | "proc" => Ok(Self::Procedure),
            "function" => Ok(Self::Function),
            "view" => Ok(Self::View),
            "trigger" => Ok(Self::Trigger),
            "batch" => Ok(Self::Batch),
            other => Err(format!("unknown object kind: {}", other)),
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Procedure => write!(f, "procedure"),
            Self::Function => write!(f, "function"),
            Self::View => write!(f, "view"),
            Self::Trigger => write!(f, "trigger"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

/// Everything one extraction run produced for a single routine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub object_name: String,
    pub object_kind: ObjectKind,
    pub edges: Vec<LineageEdge>,
    pub warnings: Vec<Diagnostic>,
    pub dynamic_sql_usages: Vec<DynamicSqlUsage>,
    pub temp_tables: Vec<TempTableInfo>,
    pub overall_confidence: f64,
    pub duration_ms: u64,

    /// SHA-256 of the analyzed text
    pub source_hash: String,
}

impl ExtractionResult {
    /// Zero-edge result, used when the routine never reached traversal
    pub fn empty(object_name: impl Into<String>, object_kind: ObjectKind) -> Self {
        Self {
            object_name: object_name.into(),
            object_kind,
            edges: Vec::new(),
            warnings: Vec::new(),
            dynamic_sql_usages: Vec::new(),
            temp_tables: Vec::new(),
            overall_confidence: 0.0,
            duration_ms: 0,
            source_hash: String::new(),
        }
    }

    /// Count warnings carrying a given code
    pub fn count_code(&self, code: DiagnosticCode) -> usize {
        self.warnings.iter().filter(|w| w.code == code).count()
    }

    pub fn has_parse_errors(&self) -> bool {
        self.count_code(DiagnosticCode::SqlParseError) > 0
    }

    pub fn was_cancelled(&self) -> bool {
        self.count_code(DiagnosticCode::LineageCancelled) > 0
    }

    /// Warning messages as plain strings
    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(|w| w.to_string()).collect()
    }

    /// Edges whose target is the given `schema.table` (case-insensitive)
    pub fn edges_into<'a>(&'a self, schema: &'a str, table: &'a str) -> impl Iterator<Item = &'a LineageEdge> + 'a {
        self.edges.iter().filter(move |e| {
            e.target.schema.eq_ignore_ascii_case(schema) && e.target.table.eq_ignore_ascii_case(table)
        })
    }
}

/// Hex SHA-256 fingerprint of routine text
pub fn source_fingerprint(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Diagnostic;

    #[test]
    fn lineage_column_display() {
        let col = LineageColumn::new("dbo", "Orders", "Total");
        assert_eq!(col.to_string(), "dbo.Orders.Total");
        assert_eq!(col.table_fqn(), "dbo.Orders");

        let placeholder = LineageColumn::placeholder("x");
        assert!(placeholder.is_placeholder());
        assert_eq!(placeholder.to_string(), "?.x");
    }

    #[test]
    fn transient_schemas() {
        assert!(LineageColumn::new(CTE_SCHEMA, "c", "a").is_transient());
        assert!(LineageColumn::new(TEMP_SCHEMA, "#t", "a").is_transient());
        assert!(!LineageColumn::new("dbo", "t", "a").is_transient());
    }

    #[test]
    fn temp_table_flags_from_prefix() {
        let local = TempTableInfo::from_name("#stage", vec![], 3);
        assert!(!local.is_global);
        assert!(!local.is_table_variable);

        let global = TempTableInfo::from_name("##shared", vec![], 4);
        assert!(global.is_global);

        let var = TempTableInfo::from_name("@rows", vec![], 5);
        assert!(var.is_table_variable);
        assert!(!var.is_global);
    }

    #[test]
    fn object_kind_parsing() {
        assert_eq!("PROC".parse::<ObjectKind>(), Ok(ObjectKind::Procedure));
        assert_eq!("view".parse::<ObjectKind>(), Ok(ObjectKind::View));
        assert!("table".parse::<ObjectKind>().is_err());
    }

    #[test]
    fn result_counts_codes() {
        let mut result = ExtractionResult::empty("p", ObjectKind::Procedure);
        result.warnings.push(Diagnostic::warn(DiagnosticCode::SqlParseError, "parse error at line 1: x"));
        result.warnings.push(Diagnostic::warn(DiagnosticCode::LineageDynamicSql, "dyn"));

        assert!(result.has_parse_errors());
        assert!(!result.was_cancelled());
        assert_eq!(result.warning_messages()[0], "parse error at line 1: x");
    }

    #[test]
    fn fingerprint_is_stable() {
        let a = source_fingerprint("SELECT 1");
        assert_eq!(a, source_fingerprint("SELECT 1"));
        assert_ne!(a, source_fingerprint("SELECT 2"));
        assert_eq!(a.len(), 64);
    }
}
