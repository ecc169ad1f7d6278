//! Accumulates everything one extraction run produces

use proclineage_core::{
    Diagnostic, DynamicSqlUsage, LineageColumn, LineageEdge, TempTableInfo, TransformationKind,
};
use std::collections::HashSet;

/// One edge as proposed by a statement handler
#[derive(Debug, Clone)]
pub struct EdgeDraft {
    pub source: LineageColumn,
    pub target: LineageColumn,
    pub kind: TransformationKind,
    pub expression_text: Option<String>,
    pub line: usize,
    pub confidence: f64,
}

/// Append-only edge/warning log
///
/// Edges are de-duplicated on `(source, target, kind)` and warnings on
/// `(code, message, location)`, both within the current statement only.
#[derive(Debug)]
pub struct LineageCollector {
    producing_object: String,
    include_expression_text: bool,
    edges: Vec<LineageEdge>,
    statement_keys: HashSet<(LineageColumn, LineageColumn, TransformationKind)>,
    warnings: Vec<Diagnostic>,
    statement_warnings: HashSet<Diagnostic>,
    dynamic_sql: Vec<DynamicSqlUsage>,
    temp_tables: Vec<TempTableInfo>,
}

impl LineageCollector {
    pub fn new(producing_object: impl Into<String>, include_expression_text: bool) -> Self {
        Self {
            producing_object: producing_object.into(),
            include_expression_text,
            edges: Vec::new(),
            statement_keys: HashSet::new(),
            warnings: Vec::new(),
            statement_warnings: HashSet::new(),
            dynamic_sql: Vec::new(),
            temp_tables: Vec::new(),
        }
    }

    /// Start a new statement; edge and warning de-duplication restart
    pub fn begin_statement(&mut self) {
        self.statement_keys.clear();
        self.statement_warnings.clear();
    }

    pub fn add_edge(&mut self, draft: EdgeDraft) {
        let key = (draft.source.clone(), draft.target.clone(), draft.kind);
        if !self.statement_keys.insert(key) {
            return;
        }
        self.edges.push(LineageEdge {
            source: draft.source,
            target: draft.target,
            kind: draft.kind,
            expression_text: draft.expression_text.filter(|_| self.include_expression_text),
            producing_object: self.producing_object.clone(),
            source_line: draft.line,
            confidence: draft.confidence,
        });
    }

    pub fn warn(&mut self, diagnostic: Diagnostic) {
        if self.statement_warnings.insert(diagnostic.clone()) {
            self.warnings.push(diagnostic);
        }
    }

    pub fn add_dynamic_sql(&mut self, usage: DynamicSqlUsage) {
        self.dynamic_sql.push(usage);
    }

    /// Register (or redefine) a temp table
    pub fn define_temp_table(&mut self, info: TempTableInfo) {
        self.temp_tables.retain(|t| !t.name.eq_ignore_ascii_case(&info.name));
        self.temp_tables.push(info);
    }

    pub fn temp_table(&self, name: &str) -> Option<&TempTableInfo> {
        self.temp_tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn edges(&self) -> &[LineageEdge] {
        &self.edges
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn dynamic_sql(&self) -> &[DynamicSqlUsage] {
        &self.dynamic_sql
    }

    pub fn into_parts(self) -> (Vec<LineageEdge>, Vec<Diagnostic>, Vec<DynamicSqlUsage>, Vec<TempTableInfo>) {
        (self.edges, self.warnings, self.dynamic_sql, self.temp_tables)
    }
}
