//! Scope context: table bindings visible to one query block
//!
//! Each SELECT/UPDATE/MERGE builds its own `BindingSet`. Nested queries get a
//! child `Scope` that borrows its parent, so an inner block can see (but never
//! mutate) the bindings of the blocks around it.

use crate::ast::ObjectName;
use proclineage_core::{CteDefinition, CTE_SCHEMA, DERIVED_SCHEMA, TEMP_SCHEMA};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Physical,
    Cte,
    Temp,
    /// Subquery in FROM; its columns are never expanded
    Derived,
    /// OPENQUERY and friends
    External,
}

/// One table reference in scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableBinding {
    pub alias: String,
    pub schema: String,
    pub table: String,
    pub kind: BindingKind,

    /// Columns known without asking the catalog (CTE outputs, temp tables)
    pub known_columns: Option<Vec<String>>,
}

impl TableBinding {
    pub fn new(alias: impl Into<String>, schema: impl Into<String>, table: impl Into<String>, kind: BindingKind) -> Self {
        Self {
            alias: alias.into(),
            schema: schema.into(),
            table: table.into(),
            kind,
            known_columns: None,
        }
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.known_columns = Some(columns);
        self
    }

    pub fn derived(alias: impl Into<String>) -> Self {
        let alias = alias.into();
        Self::new(alias.clone(), DERIVED_SCHEMA, alias, BindingKind::Derived)
    }

    /// Only physical, CTE and temp bindings take part in unqualified lookup
    pub fn is_searchable(&self) -> bool {
        !matches!(self.kind, BindingKind::Derived | BindingKind::External)
    }
}

/// Ordered, case-insensitive alias map; a later binding shadows an earlier one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingSet {
    bindings: Vec<TableBinding>,
}

impl BindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, binding: TableBinding) {
        self.bindings.retain(|b| !b.alias.eq_ignore_ascii_case(&binding.alias));
        self.bindings.push(binding);
    }

    pub fn get(&self, alias: &str) -> Option<&TableBinding> {
        self.bindings.iter().find(|b| b.alias.eq_ignore_ascii_case(alias))
    }

    /// Binding whose underlying table (not alias) has this name
    pub fn get_by_table(&self, table: &str) -> Option<&TableBinding> {
        self.bindings.iter().find(|b| b.table.eq_ignore_ascii_case(table))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// One frame of the scope stack
#[derive(Debug)]
pub struct Scope<'p> {
    pub bindings: BindingSet,
    ctes: Vec<CteDefinition>,
    parent: Option<&'p Scope<'p>>,
}

impl<'p> Scope<'p> {
    pub fn root() -> Self {
        Self {
            bindings: BindingSet::new(),
            ctes: Vec::new(),
            parent: None,
        }
    }

    /// Empty frame nested inside `parent`
    pub fn child(parent: &'p Scope<'p>) -> Self {
        Self {
            bindings: BindingSet::new(),
            ctes: Vec::new(),
            parent: Some(parent),
        }
    }

    pub fn add_cte(&mut self, cte: CteDefinition) {
        self.ctes.retain(|c| !c.name.eq_ignore_ascii_case(&cte.name));
        self.ctes.push(cte);
    }

    /// CTE visible from this frame, innermost first
    pub fn find_cte(&self, name: &str) -> Option<&CteDefinition> {
        self.frames()
            .find_map(|frame| frame.ctes.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    /// Binding for a table qualifier: alias first, then the bare table name,
    /// then enclosing frames
    pub fn lookup_binding(&self, qualifier: &str) -> Option<&TableBinding> {
        self.frames().find_map(|frame| {
            frame
                .bindings
                .get(qualifier)
                .or_else(|| frame.bindings.get_by_table(qualifier))
        })
    }

    /// This frame and its ancestors, innermost first
    pub fn frames(&self) -> impl Iterator<Item = &Scope<'p>> {
        std::iter::successors(Some(self), |s| s.parent)
    }
}

/// Enclosing INSERT/UPDATE/MERGE/INTO target of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryContext {
    pub target_schema: String,
    pub target_table: String,
    pub target_columns: Vec<String>,
    pub statement_kind: &'static str,
    pub statement_line: usize,
}

impl QueryContext {
    /// Target column for output position `index`
    pub fn column_at(&self, index: usize) -> Option<&str> {
        self.target_columns.get(index).map(String::as_str)
    }
}

/// Schema, table and kind a table name refers to, before any alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTarget {
    pub schema: String,
    pub table: String,
    pub kind: BindingKind,
}

/// Classify a table name: CTE, then temp object, then physical table
pub fn classify_table(name: &ObjectName, scope: &Scope<'_>, default_schema: &str) -> TableTarget {
    if name.is_single() {
        if let Some(cte) = scope.find_cte(name.base()) {
            return TableTarget {
                schema: CTE_SCHEMA.to_string(),
                table: cte.name.clone(),
                kind: BindingKind::Cte,
            };
        }
    }
    if name.is_temp() {
        return TableTarget {
            schema: TEMP_SCHEMA.to_string(),
            table: name.base().to_string(),
            kind: BindingKind::Temp,
        };
    }
    TableTarget {
        schema: name.schema().unwrap_or(default_schema).to_string(),
        table: name.base().to_string(),
        kind: BindingKind::Physical,
    }
}
