//! Column resolution against the scope stack and the schema catalog

use crate::scope::{BindingKind, Scope, TableBinding};
use proclineage_catalog::SchemaCatalog;
use proclineage_core::{Diagnostic, DiagnosticCode, LineageColumn, CTE_SCHEMA};

/// Outcome of resolving one column reference
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(LineageColumn),

    /// Several in-scope tables have the column; the first one in binding order wins
    Ambiguous {
        chosen: LineageColumn,
        candidates: Vec<LineageColumn>,
    },

    /// Nothing in scope has the column; carries a placeholder
    Unresolved(LineageColumn),

    /// Column of an external row source; never becomes an edge
    Opaque(LineageColumn),
}

impl Resolution {
    /// Source column an edge should use
    pub fn column(&self) -> &LineageColumn {
        match self {
            Self::Resolved(c) | Self::Unresolved(c) | Self::Opaque(c) => c,
            Self::Ambiguous { chosen, .. } => chosen,
        }
    }

    pub fn into_column(self) -> LineageColumn {
        match self {
            Self::Resolved(c) | Self::Unresolved(c) | Self::Opaque(c) => c,
            Self::Ambiguous { chosen, .. } => chosen,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Opaque(_))
    }

    /// Per-edge confidence
    pub fn confidence(&self) -> f64 {
        match self {
            Self::Resolved(_) => 1.0,
            Self::Ambiguous { .. } => 0.5,
            Self::Unresolved(_) | Self::Opaque(_) => 0.0,
        }
    }

    /// Warning to record for this resolution, if any
    pub fn warning(&self, reference: &str, line: usize) -> Option<Diagnostic> {
        let diagnostic = match self {
            Self::Resolved(_) | Self::Opaque(_) => return None,
            Self::Ambiguous { candidates, .. } => {
                let tables = candidates
                    .iter()
                    .map(LineageColumn::table_fqn)
                    .collect::<Vec<_>>()
                    .join(", ");
                Diagnostic::warn(
                    DiagnosticCode::LineageAmbiguousColumn,
                    format!("ambiguous column: {} found in {}", reference, tables),
                )
            }
            Self::Unresolved(_) => Diagnostic::warn(
                DiagnosticCode::LineageUnresolvedColumn,
                format!("unable to resolve column: {}", reference),
            ),
        };
        Some(diagnostic.at_line(line))
    }
}

/// Resolves column references; pure apart from catalog lookups
pub struct ColumnResolver<'a> {
    catalog: &'a dyn SchemaCatalog,
}

impl<'a> ColumnResolver<'a> {
    pub fn new(catalog: &'a dyn SchemaCatalog) -> Self {
        Self { catalog }
    }

    /// Resolve a column reference given as identifier parts
    pub fn resolve(&self, parts: &[String], scope: &Scope<'_>) -> Resolution {
        let Some(column) = parts.last() else {
            return Resolution::Unresolved(LineageColumn::placeholder(""));
        };

        if parts.len() >= 2 {
            let qualifier = &parts[parts.len() - 2];
            if let Some(binding) = scope.lookup_binding(qualifier) {
                let resolved = LineageColumn::new(&binding.schema, &binding.table, column);
                return match binding.kind {
                    BindingKind::External => Resolution::Opaque(resolved),
                    _ => Resolution::Resolved(resolved),
                };
            }
            if let Some(cte) = scope.find_cte(qualifier) {
                return Resolution::Resolved(LineageColumn::new(CTE_SCHEMA, &cte.name, column));
            }
        }

        self.resolve_unqualified(column, scope)
    }

    /// Innermost frame with any match decides; within a frame, binding order decides
    fn resolve_unqualified(&self, column: &str, scope: &Scope<'_>) -> Resolution {
        for frame in scope.frames() {
            let mut candidates: Vec<LineageColumn> = frame
                .bindings
                .iter()
                .filter(|b| b.is_searchable() && self.has_column(b, column))
                .map(|b| LineageColumn::new(&b.schema, &b.table, column))
                .collect();

            match candidates.len() {
                // unmatched beside an external source: assume it comes from there
                0 if frame.bindings.iter().any(|b| b.kind == BindingKind::External) => {
                    return Resolution::Opaque(LineageColumn::placeholder(column));
                }
                0 => continue,
                1 => return Resolution::Resolved(candidates.remove(0)),
                _ => {
                    return Resolution::Ambiguous {
                        chosen: candidates[0].clone(),
                        candidates,
                    }
                }
            }
        }
        Resolution::Unresolved(LineageColumn::placeholder(column))
    }

    fn has_column(&self, binding: &TableBinding, column: &str) -> bool {
        match &binding.known_columns {
            Some(known) => known.iter().any(|c| c.eq_ignore_ascii_case(column)),
            None => self.catalog.column_exists(&binding.schema, &binding.table, column),
        }
    }

    /// Ordered columns of a binding, for star expansion
    pub fn columns_of(&self, binding: &TableBinding) -> Vec<String> {
        match &binding.known_columns {
            Some(known) => known.clone(),
            None => self.catalog.columns_of(&binding.schema, &binding.table),
        }
    }
}
