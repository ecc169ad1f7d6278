//! Column-level lineage extraction
//!
//! [`LineageExtractor`] parses a routine, walks its statements once and
//! returns an [`ExtractionResult`]. It never fails: syntax errors, unresolved
//! columns, dynamic SQL and depth-limited input all end up as warnings on the
//! result, with the confidence score reduced accordingly.
//!
//! Every edge produced by a statement targets that statement's own target:
//! the INSERT/UPDATE/MERGE table, the `SELECT ... INTO` table, the view being
//! created, or (for a bare SELECT) the routine's result set. CTE bodies and
//! derived tables only contribute column names and bindings.

use crate::ast::*;
use crate::cancel::CancelToken;
use crate::classify::classify;
use crate::collector::{EdgeDraft, LineageCollector};
use crate::confidence;
use crate::dynamic::{detect_execute, detect_table_ref, Detection};
use crate::parser::{ParseTreeSource, SqlParser};
use crate::resolver::ColumnResolver;
use crate::scope::{classify_table, BindingKind, QueryContext, Scope, TableBinding, TableTarget};
use proclineage_catalog::SchemaCatalog;
use proclineage_core::{
    source_fingerprint, Config, CteDefinition, Diagnostic, DiagnosticCode, ExtractionResult,
    LineageColumn, ObjectKind, Severity, TempColumn, TempTableInfo, TransformationKind,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

/// Extracts lineage from routine text against a schema catalog
pub struct LineageExtractor {
    catalog: Arc<dyn SchemaCatalog>,
    config: Config,
    source: Box<dyn ParseTreeSource>,
}

impl LineageExtractor {
    /// Create an extractor with default configuration and the T-SQL parser
    pub fn new(catalog: Arc<dyn SchemaCatalog>) -> Self {
        let config = Config::default();
        Self {
            source: Box::new(SqlParser::from_config(&config)),
            catalog,
            config,
        }
    }

    /// Replace the configuration; the parser is rebuilt to match it
    pub fn with_config(mut self, config: Config) -> Self {
        self.source = Box::new(SqlParser::from_config(&config));
        self.config = config;
        self
    }

    /// Use a different parse-tree source
    pub fn with_source(mut self, source: Box<dyn ParseTreeSource>) -> Self {
        self.source = source;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Extract lineage from one routine
    ///
    /// `object_name` and `kind` are used when the text carries no
    /// `CREATE PROCEDURE`/`CREATE VIEW` wrapper of its own.
    pub fn extract(&self, sql: &str, object_name: &str, kind: ObjectKind) -> ExtractionResult {
        self.extract_cancellable(sql, object_name, kind, &CancelToken::new())
    }

    /// Like [`extract`](Self::extract), stopping at the next statement once `cancel` fires
    pub fn extract_cancellable(
        &self,
        sql: &str,
        object_name: &str,
        kind: ObjectKind,
        cancel: &CancelToken,
    ) -> ExtractionResult {
        let started = Instant::now();
        let parsed = self.source.parse(sql);

        let name = parsed
            .routine
            .name
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| object_name.to_string());
        let kind = parsed.routine.kind.unwrap_or(kind);

        let mut result = if parsed.errors.is_empty() {
            self.extract_routine(&parsed.routine, &name, kind, cancel)
        } else {
            let mut failed = ExtractionResult::empty(&name, kind);
            failed.warnings = parsed
                .errors
                .iter()
                .map(|e| {
                    Diagnostic::new(DiagnosticCode::SqlParseError, Severity::Error, e.to_string())
                        .at_line(e.line)
                })
                .collect();
            failed
        };

        result.source_hash = source_fingerprint(sql);
        result.duration_ms = started.elapsed().as_millis() as u64;

        tracing::debug!(
            object = %result.object_name,
            edges = result.edges.len(),
            warnings = result.warnings.len(),
            confidence = result.overall_confidence,
            "extraction finished"
        );
        result
    }

    /// Walk an already-parsed routine
    pub fn extract_routine(
        &self,
        routine: &Routine,
        object_name: &str,
        kind: ObjectKind,
        cancel: &CancelToken,
    ) -> ExtractionResult {
        let routine_name = ObjectName::parse(object_name);
        let mut walk = Traversal {
            config: &self.config,
            catalog: &*self.catalog,
            resolver: ColumnResolver::new(&*self.catalog),
            collector: LineageCollector::new(object_name, self.config.include_expression_text),
            routine_schema: routine_name
                .schema()
                .unwrap_or(&self.config.default_schema)
                .to_string(),
            routine_table: routine_name.base().to_string(),
        };

        let truncated: BTreeSet<usize> = routine.truncations.iter().copied().collect();
        for line in truncated {
            tracing::warn!(object = object_name, line, "nesting depth limit reached");
            walk.collector.warn(
                Diagnostic::warn(
                    DiagnosticCode::LineageDepthLimit,
                    format!(
                        "nesting deeper than {} levels at line {}; inner expressions were skipped",
                        self.config.max_depth, line
                    ),
                )
                .at_line(line),
            );
        }

        let total = routine.statements.len();
        for (index, statement) in routine.statements.iter().enumerate() {
            if cancel.is_cancelled() {
                walk.collector.warn(
                    Diagnostic::warn(
                        DiagnosticCode::LineageCancelled,
                        format!(
                            "extraction cancelled after {} of {} statements",
                            index, total
                        ),
                    )
                    .at_line(statement.line()),
                );
                break;
            }
            walk.statement(statement);
        }

        let overall_confidence = confidence::score(
            &self.config.confidence,
            walk.collector.dynamic_sql(),
            walk.collector.warnings(),
        );
        let (edges, warnings, dynamic_sql_usages, temp_tables) = walk.collector.into_parts();

        ExtractionResult {
            object_name: object_name.to_string(),
            object_kind: kind,
            edges,
            warnings,
            dynamic_sql_usages,
            temp_tables,
            overall_confidence,
            duration_ms: 0,
            source_hash: String::new(),
        }
    }
}

/// State of one walk over one routine
struct Traversal<'a> {
    config: &'a Config,
    catalog: &'a dyn SchemaCatalog,
    resolver: ColumnResolver<'a>,
    collector: LineageCollector,

    /// Result-set target for bare SELECT statements
    routine_schema: String,
    routine_table: String,
}

impl<'a> Traversal<'a> {
    fn statement(&mut self, statement: &Statement) {
        self.collector.begin_statement();
        tracing::debug!(kind = statement.kind_name(), line = statement.line(), "visiting statement");

        let root = Scope::root();
        match statement {
            Statement::Query(query) => self.query_statement(query, &root),
            Statement::Insert(insert) => self.insert(insert, &root),
            Statement::Update(update) => self.update(update, &root),
            Statement::Merge(merge) => self.merge(merge, &root),
            Statement::Delete(delete) => self.delete(delete, &root),
            Statement::CreateTable(create) => self.create_table(create, &root),
            Statement::CreateView(view) => self.create_view(view, &root),
            Statement::Execute(exec) => {
                if let Some(detection) = detect_execute(exec) {
                    self.record(detection);
                }
            }
            Statement::Unsupported { kind, line } => self.collector.warn(
                Diagnostic::warn(
                    DiagnosticCode::LineageUnsupportedStatement,
                    format!("unsupported {} statement shape; no lineage recorded", kind),
                )
                .at_line(*line),
            ),
            Statement::Other { .. } => {}
        }
    }

    // ---------------------------------------------------------------------
    // Statement handlers
    // ---------------------------------------------------------------------

    fn query_statement(&mut self, query: &Query, root: &Scope<'_>) {
        if let Some(into) = first_select(&query.body).and_then(|s| s.into.as_ref()) {
            return self.select_into(into, query, root);
        }

        let columns = self.output_columns(query, root);
        let ctx = QueryContext {
            target_schema: self.routine_schema.clone(),
            target_table: self.routine_table.clone(),
            target_columns: columns,
            statement_kind: "SELECT",
            statement_line: query.line,
        };
        self.project_query(query, root, &ctx);
    }

    fn select_into(&mut self, into: &ObjectName, query: &Query, root: &Scope<'_>) {
        let target = classify_table(into, root, &self.config.default_schema);
        let columns = self.output_columns(query, root);

        if target.kind == BindingKind::Temp {
            let temp_columns = columns
                .iter()
                .map(|name| TempColumn {
                    name: name.clone(),
                    data_type: None,
                })
                .collect();
            self.collector
                .define_temp_table(TempTableInfo::from_name(&target.table, temp_columns, query.line));
        }

        let ctx = context(&target, columns, "SELECT INTO", query.line);
        self.project_query(query, root, &ctx);
    }

    fn insert(&mut self, insert: &Insert, root: &Scope<'_>) {
        let target = classify_table(&insert.target, root, &self.config.default_schema);
        let columns = if insert.columns.is_empty() {
            self.enumerate_target(&target, insert.line)
        } else {
            insert.columns.clone()
        };

        let ctx = context(&target, columns, "INSERT", insert.line);
        if let Some(source) = &insert.source {
            self.project_query(source, root, &ctx);
        }
    }

    fn update(&mut self, update: &Update, outer: &Scope<'_>) {
        let mut root = Scope::child(outer);
        self.register_ctes(&update.ctes, &mut root, true);
        let root = &root;

        let target_name = update
            .target_alias
            .clone()
            .unwrap_or_else(|| update.target.base().to_string());

        let mut from_scope = Scope::child(root);
        let mut conditions = self.bind_from(&update.from, &mut from_scope, true);

        // UPDATE t ... FROM dbo.T t: the target is an alias declared in FROM
        let declared = update
            .target
            .is_single()
            .then(|| from_scope.bindings.get(&target_name).cloned())
            .flatten();

        let mut scope = Scope::child(root);
        let target = match declared {
            Some(binding) => {
                scope.bindings = from_scope.bindings;
                TableTarget {
                    schema: binding.schema,
                    table: binding.table,
                    kind: binding.kind,
                }
            }
            None => {
                let target = classify_table(&update.target, root, &self.config.default_schema);
                scope.bindings.push(self.binding_for(target_name, &target, root));
                for binding in from_scope.bindings.iter() {
                    scope.bindings.push(binding.clone());
                }
                target
            }
        };

        let columns = assigned_columns(&update.assignments);
        let ctx = context(&target, columns, "UPDATE", update.line);
        self.assignments(&update.assignments, &scope, &ctx);

        if let Some(selection) = &update.selection {
            conditions.push(selection);
        }
        if self.wants_predicates(&ctx) {
            let wheres = update.selection.as_ref();
            for condition in conditions {
                let kind = match wheres {
                    Some(w) if std::ptr::eq(w, condition) => TransformationKind::Where,
                    _ => TransformationKind::Join,
                };
                self.predicate_edges(condition, kind, &scope, &ctx);
            }
        } else {
            for condition in conditions {
                self.scan_condition(&condition.expr, &scope);
            }
        }
    }

    fn merge(&mut self, merge: &Merge, root: &Scope<'_>) {
        let target = classify_table(&merge.target, root, &self.config.default_schema);
        let alias = merge.target_alias.clone().unwrap_or_else(|| "target".to_string());

        let mut scope = Scope::child(root);
        scope.bindings.push(self.binding_for(alias, &target, root));
        let mut conditions = Vec::new();
        self.bind_table(&merge.source, &mut scope, true, Some("source"), &mut conditions);

        let mut all_targets = Vec::new();
        for clause in &merge.clauses {
            match clause {
                MergeAction::Insert { columns, values } => {
                    let columns = if columns.is_empty() {
                        self.enumerate_target(&target, merge.line)
                    } else {
                        columns.clone()
                    };
                    let ctx = context(&target, columns, "MERGE", merge.line);
                    if let Some(values) = values {
                        self.positional_values(values, &scope, &ctx);
                    }
                    all_targets.extend(ctx.target_columns);
                }
                MergeAction::Update(assignments) => {
                    let ctx = context(&target, assigned_columns(assignments), "MERGE", merge.line);
                    self.assignments(assignments, &scope, &ctx);
                    all_targets.extend(ctx.target_columns);
                }
                MergeAction::Delete => {}
            }
        }

        let ctx = context(&target, dedup_names(all_targets), "MERGE", merge.line);
        if self.wants_predicates(&ctx) {
            self.predicate_edges(&merge.on, TransformationKind::Join, &scope, &ctx);
            for condition in conditions {
                self.predicate_edges(condition, TransformationKind::Join, &scope, &ctx);
            }
        } else {
            for condition in std::iter::once(&merge.on).chain(conditions) {
                self.scan_condition(&condition.expr, &scope);
            }
        }
    }

    /// No edges; only the row sources in FROM, USING and WHERE are scanned
    fn delete(&mut self, delete: &Delete, root: &Scope<'_>) {
        let mut scope = Scope::child(root);
        let conditions = self.bind_from(&delete.from, &mut scope, true);
        for condition in conditions.into_iter().chain(delete.selection.as_ref()) {
            self.scan_condition(&condition.expr, &scope);
        }
    }

    fn create_table(&mut self, create: &CreateTable, root: &Scope<'_>) {
        let target = classify_table(&create.name, root, &self.config.default_schema);

        let mut columns: Vec<String> = create.columns.iter().map(|(name, _)| name.clone()).collect();
        if columns.is_empty() {
            if let Some(query) = &create.query {
                columns = self.output_columns(query, root);
            }
        }

        if target.kind == BindingKind::Temp {
            let temp_columns = if create.columns.is_empty() {
                columns
                    .iter()
                    .map(|name| TempColumn {
                        name: name.clone(),
                        data_type: None,
                    })
                    .collect()
            } else {
                create
                    .columns
                    .iter()
                    .map(|(name, data_type)| TempColumn {
                        name: name.clone(),
                        data_type: data_type.clone(),
                    })
                    .collect()
            };
            self.collector
                .define_temp_table(TempTableInfo::from_name(&target.table, temp_columns, create.line));
        }

        if let Some(query) = &create.query {
            let ctx = context(&target, columns, "CREATE TABLE", create.line);
            self.project_query(query, root, &ctx);
        }
    }

    fn create_view(&mut self, view: &CreateView, root: &Scope<'_>) {
        let target = classify_table(&view.name, root, &self.config.default_schema);
        let columns = if view.columns.is_empty() {
            self.output_columns(&view.query, root)
        } else {
            view.columns.clone()
        };
        let ctx = context(&target, columns, "CREATE VIEW", view.line);
        self.project_query(&view.query, root, &ctx);
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Emit edges from every output column of `query` into `ctx`'s target
    fn project_query(&mut self, query: &Query, scope: &Scope<'_>, ctx: &QueryContext) {
        let mut frame = Scope::child(scope);
        self.register_ctes(&query.ctes, &mut frame, true);

        let mut bodies = vec![&query.body];
        while let Some(body) = bodies.pop() {
            match body {
                SetBody::Select(select) => self.project_select(select, &frame, ctx),
                SetBody::Values(rows) => {
                    for row in rows {
                        self.positional_values(row, &frame, ctx);
                    }
                }
                SetBody::Query(inner) => self.project_query(inner, &frame, ctx),
                // every branch maps onto the same target columns
                SetBody::SetOperation(branches) => bodies.extend(branches.iter().rev()),
                SetBody::Unsupported(text) => self.collector.warn(
                    Diagnostic::warn(
                        DiagnosticCode::LineageUnsupportedStatement,
                        format!("unsupported query shape; no lineage recorded: {}", text),
                    )
                    .at_line(ctx.statement_line),
                ),
                SetBody::Truncated => {}
            }
        }
    }

    fn project_select(&mut self, select: &Select, parent: &Scope<'_>, ctx: &QueryContext) {
        let mut scope = Scope::child(parent);
        let joins = self.bind_from(&select.from, &mut scope, true);

        let mut index = 0;
        for item in &select.projection {
            match item {
                SelectItem::Expr { value, alias } => {
                    let name = ctx
                        .column_at(index)
                        .map(str::to_string)
                        .unwrap_or_else(|| output_name(value, alias.as_deref(), index));
                    let target = ctx_column(ctx, name);
                    self.emit_value(value, &scope, target, ctx.statement_line);
                    index += 1;
                }
                SelectItem::Wildcard => {
                    let bindings: Vec<TableBinding> = scope.bindings.iter().cloned().collect();
                    for binding in &bindings {
                        self.expand_star(binding, ctx, &mut index);
                    }
                }
                SelectItem::QualifiedWildcard(name) => {
                    match scope.lookup_binding(name.base()).cloned() {
                        Some(binding) => self.expand_star(&binding, ctx, &mut index),
                        None => self.star_warning(&format!("{}.*", name), "no such table in scope", ctx.statement_line),
                    }
                }
                SelectItem::Assign { value, .. } => self.scan_condition(&value.expr, &scope),
            }
        }

        if self.wants_predicates(ctx) {
            for condition in joins {
                self.predicate_edges(condition, TransformationKind::Join, &scope, ctx);
            }
            if let Some(selection) = &select.selection {
                self.predicate_edges(selection, TransformationKind::Where, &scope, ctx);
            }
        } else {
            for condition in joins.into_iter().chain(select.selection.as_ref()) {
                self.scan_condition(&condition.expr, &scope);
            }
        }
    }

    /// Emit one `Direct` edge per column of `binding`, advancing the target index
    fn expand_star(&mut self, binding: &TableBinding, ctx: &QueryContext, index: &mut usize) {
        let reference = format!("{}.*", binding.alias);
        if matches!(binding.kind, BindingKind::Derived | BindingKind::External) {
            self.star_warning(&reference, "columns of the source are not known statically", ctx.statement_line);
            return;
        }

        let columns = self.resolver.columns_of(binding);
        if columns.is_empty() {
            let reason = format!("no columns known for {}.{}", binding.schema, binding.table);
            self.star_warning(&reference, &reason, ctx.statement_line);
            return;
        }

        for column in columns {
            let name = ctx.column_at(*index).map(str::to_string).unwrap_or_else(|| column.clone());
            self.collector.add_edge(EdgeDraft {
                source: LineageColumn::new(&binding.schema, &binding.table, &column),
                target: ctx_column(ctx, name),
                kind: TransformationKind::Direct,
                expression_text: Some(reference.clone()),
                line: ctx.statement_line,
                confidence: 1.0,
            });
            *index += 1;
        }
    }

    fn star_warning(&mut self, reference: &str, reason: &str, line: usize) {
        self.collector.warn(
            Diagnostic::warn(
                DiagnosticCode::LineageStarUnexpandable,
                format!("cannot expand {}: {}", reference, reason),
            )
            .at_line(line),
        );
    }

    /// Pair a VALUES row with the target columns by position
    fn positional_values(&mut self, row: &[ValueExpr], scope: &Scope<'_>, ctx: &QueryContext) {
        for (index, value) in row.iter().enumerate() {
            let name = ctx
                .column_at(index)
                .map(str::to_string)
                .unwrap_or_else(|| synthesized_name(index));
            let target = ctx_column(ctx, name);
            self.emit_value(value, scope, target, ctx.statement_line);
        }
    }

    fn assignments(&mut self, assignments: &[Assignment], scope: &Scope<'_>, ctx: &QueryContext) {
        for assignment in assignments {
            for column in &assignment.columns {
                let target = ctx_column(ctx, column.base().to_string());
                self.emit_value(&assignment.value, scope, target, ctx.statement_line);
            }
        }
    }

    /// One edge per source column referenced by `value`
    fn emit_value(&mut self, value: &ValueExpr, scope: &Scope<'_>, target: LineageColumn, line: usize) {
        let kind = classify(&value.expr);
        for (source, confidence) in self.resolve_refs(&value.expr, scope, line) {
            self.collector.add_edge(EdgeDraft {
                source,
                target: target.clone(),
                kind,
                expression_text: value.text.clone(),
                line,
                confidence,
            });
        }
    }

    fn wants_predicates(&self, ctx: &QueryContext) -> bool {
        self.config.predicate_lineage
            && !ctx.target_columns.is_empty()
            && matches!(ctx.statement_kind, "INSERT" | "UPDATE" | "MERGE")
    }

    fn predicate_edges(&mut self, condition: &ValueExpr, kind: TransformationKind, scope: &Scope<'_>, ctx: &QueryContext) {
        let sources = self.resolve_refs(&condition.expr, scope, ctx.statement_line);
        for column in &ctx.target_columns {
            for (source, confidence) in &sources {
                self.collector.add_edge(EdgeDraft {
                    source: source.clone(),
                    target: ctx_column(ctx, column.clone()),
                    kind,
                    expression_text: condition.text.clone(),
                    line: ctx.statement_line,
                    confidence: *confidence,
                });
            }
        }
    }

    /// Resolve every column reference in `expr`, left to right
    fn resolve_refs(&mut self, expr: &Expr, scope: &Scope<'_>, line: usize) -> Vec<(LineageColumn, f64)> {
        let mut resolved = Vec::new();
        let mut stack = vec![expr];

        while let Some(node) = stack.pop() {
            match node {
                Expr::Column(parts) => {
                    let resolution = self.resolver.resolve(parts, scope);
                    if resolution.is_opaque() {
                        continue;
                    }
                    if let Some(warning) = resolution.warning(&parts.join("."), line) {
                        self.collector.warn(warning);
                    }
                    let confidence = resolution.confidence();
                    resolved.push((resolution.into_column(), confidence));
                }
                Expr::Subquery(query) => resolved.extend(self.subquery_sources(query, scope, line)),
                other => stack.extend(other.children().into_iter().rev()),
            }
        }
        resolved
    }

    /// Select-list columns of a scalar/IN/EXISTS subquery, resolved in a child scope
    fn subquery_sources(&mut self, query: &Query, scope: &Scope<'_>, line: usize) -> Vec<(LineageColumn, f64)> {
        let mut frame = Scope::child(scope);
        self.register_ctes(&query.ctes, &mut frame, true);

        let mut sources = Vec::new();
        let mut bodies = vec![&query.body];
        while let Some(body) = bodies.pop() {
            match body {
                SetBody::Select(select) => {
                    let mut inner = Scope::child(&frame);
                    let conditions = self.bind_from(&select.from, &mut inner, true);
                    for item in &select.projection {
                        if let SelectItem::Expr { value, .. } = item {
                            sources.extend(self.resolve_refs(&value.expr, &inner, line));
                        }
                    }
                    for condition in conditions.into_iter().chain(select.selection.as_ref()) {
                        self.scan_condition(&condition.expr, &inner);
                    }
                }
                SetBody::SetOperation(branches) => bodies.extend(branches.iter().rev()),
                SetBody::Query(inner) => sources.extend(self.subquery_sources(inner, &frame, line)),
                SetBody::Values(_) | SetBody::Unsupported(_) | SetBody::Truncated => {}
            }
        }
        sources
    }

    // ---------------------------------------------------------------------
    // Scopes and output columns
    // ---------------------------------------------------------------------

    /// Record CTE names and output columns in order, so later CTEs see earlier ones
    fn register_ctes(&mut self, ctes: &[Cte], frame: &mut Scope<'_>, report: bool) {
        for cte in ctes {
            let output_columns = if cte.columns.is_empty() {
                self.output_columns(&cte.query, frame)
            } else {
                cte.columns.clone()
            };
            if report {
                self.scan_query(&cte.query, frame);
            }
            frame.add_cte(CteDefinition {
                name: cte.name.clone(),
                output_columns,
                line: cte.line,
            });
        }
    }

    /// Output column names of a query, star-expanded; UNION takes the first branch
    fn output_columns(&mut self, query: &Query, scope: &Scope<'_>) -> Vec<String> {
        let mut frame = Scope::child(scope);
        self.register_ctes(&query.ctes, &mut frame, false);

        let mut body = &query.body;
        loop {
            match body {
                SetBody::SetOperation(branches) => match branches.first() {
                    Some(first) => body = first,
                    None => return Vec::new(),
                },
                SetBody::Query(inner) => return self.output_columns(inner, &frame),
                SetBody::Select(select) => return self.select_output_columns(select, &frame),
                SetBody::Values(rows) => {
                    let width = rows.first().map_or(0, Vec::len);
                    return (0..width).map(synthesized_name).collect();
                }
                SetBody::Unsupported(_) | SetBody::Truncated => return Vec::new(),
            }
        }
    }

    fn select_output_columns(&mut self, select: &Select, parent: &Scope<'_>) -> Vec<String> {
        let mut scope = Scope::child(parent);
        self.bind_from(&select.from, &mut scope, false);

        let mut names = Vec::new();
        for item in &select.projection {
            match item {
                SelectItem::Expr { value, alias } => {
                    names.push(output_name(value, alias.as_deref(), names.len()))
                }
                SelectItem::Wildcard => {
                    for binding in scope.bindings.iter().filter(|b| b.is_searchable()) {
                        names.extend(self.resolver.columns_of(binding));
                    }
                }
                SelectItem::QualifiedWildcard(name) => {
                    if let Some(binding) = scope.lookup_binding(name.base()).filter(|b| b.is_searchable()) {
                        names.extend(self.resolver.columns_of(binding));
                    }
                }
                SelectItem::Assign { .. } => {}
            }
        }
        names
    }

    /// Walk a query for dynamic constructs only; no edges
    fn scan_query(&mut self, query: &Query, scope: &Scope<'_>) {
        let mut frame = Scope::child(scope);
        self.register_ctes(&query.ctes, &mut frame, true);

        let mut bodies = vec![&query.body];
        while let Some(body) = bodies.pop() {
            match body {
                SetBody::Select(select) => {
                    let mut inner = Scope::child(&frame);
                    let conditions = self.bind_from(&select.from, &mut inner, true);
                    for item in &select.projection {
                        if let SelectItem::Expr { value, .. } | SelectItem::Assign { value, .. } = item {
                            self.scan_condition(&value.expr, &inner);
                        }
                    }
                    for condition in conditions.into_iter().chain(select.selection.as_ref()) {
                        self.scan_condition(&condition.expr, &inner);
                    }
                }
                SetBody::SetOperation(branches) => bodies.extend(branches.iter().rev()),
                SetBody::Query(inner) => self.scan_query(inner, &frame),
                SetBody::Values(_) | SetBody::Unsupported(_) | SetBody::Truncated => {}
            }
        }
    }

    /// Scan the subqueries nested in an expression that yields no edges
    fn scan_condition(&mut self, expr: &Expr, scope: &Scope<'_>) {
        let mut stack = vec![expr];
        while let Some(node) = stack.pop() {
            match node {
                Expr::Subquery(query) => self.scan_query(query, scope),
                other => stack.extend(other.children().into_iter().rev()),
            }
        }
    }

    /// Bind every FROM entry into `scope`; returns the join conditions met
    fn bind_from<'q>(&mut self, from: &'q [TableRef], scope: &mut Scope<'_>, report: bool) -> Vec<&'q ValueExpr> {
        let mut conditions = Vec::new();
        for table in from {
            self.bind_table(table, scope, report, None, &mut conditions);
        }
        conditions
    }

    /// Flatten a join tree left to right into bindings
    fn bind_table<'q>(
        &mut self,
        table: &'q TableRef,
        scope: &mut Scope<'_>,
        report: bool,
        default_alias: Option<&str>,
        conditions: &mut Vec<&'q ValueExpr>,
    ) {
        let mut stack = vec![table];
        while let Some(node) = stack.pop() {
            let fallback = if std::ptr::eq(node, table) { default_alias } else { None };
            match node {
                TableRef::Join { left, right, on } => {
                    if let Some(on) = on {
                        conditions.push(on);
                    }
                    stack.push(right);
                    stack.push(left);
                }
                TableRef::Named { name, alias } => {
                    let target = classify_table(name, scope, &self.config.default_schema);
                    let alias = alias
                        .clone()
                        .or_else(|| fallback.map(str::to_string))
                        .unwrap_or_else(|| name.base().to_string());
                    let binding = self.binding_for(alias, &target, scope);
                    scope.bindings.push(binding);
                }
                TableRef::Derived { query, alias } => {
                    if report {
                        self.scan_query(query, scope);
                    }
                    let alias = alias
                        .clone()
                        .or_else(|| fallback.map(str::to_string))
                        .unwrap_or_else(|| "derived".to_string());
                    scope.bindings.push(TableBinding::derived(alias));
                }
                TableRef::External { function, alias, .. } => {
                    if report {
                        if let Some(detection) = detect_table_ref(node) {
                            self.record(detection);
                        }
                    }
                    let alias = alias
                        .clone()
                        .or_else(|| fallback.map(str::to_string))
                        .unwrap_or_else(|| function.clone());
                    scope
                        .bindings
                        .push(TableBinding::new(alias.clone(), function.clone(), alias, BindingKind::External));
                }
                TableRef::Unsupported(text) => {
                    if report {
                        self.collector.warn(Diagnostic::warn(
                            DiagnosticCode::LineageUnsupportedStatement,
                            format!("unsupported table reference; no lineage recorded: {}", text),
                        ));
                    }
                }
            }
        }
    }

    /// Binding for a classified table, with CTE/temp columns filled in
    fn binding_for(&self, alias: String, target: &TableTarget, scope: &Scope<'_>) -> TableBinding {
        let binding = TableBinding::new(alias, &target.schema, &target.table, target.kind);
        match target.kind {
            BindingKind::Cte => match scope.find_cte(&target.table) {
                Some(cte) => binding.with_columns(cte.output_columns.clone()),
                None => binding,
            },
            BindingKind::Temp => match self.collector.temp_table(&target.table) {
                Some(temp) => binding.with_columns(temp.column_names()),
                None => binding,
            },
            BindingKind::Physical | BindingKind::Derived | BindingKind::External => binding,
        }
    }

    /// Full column list of an INSERT/MERGE target with no explicit column list
    fn enumerate_target(&mut self, target: &TableTarget, line: usize) -> Vec<String> {
        let columns = match target.kind {
            BindingKind::Temp => self
                .collector
                .temp_table(&target.table)
                .map(TempTableInfo::column_names)
                .unwrap_or_default(),
            _ => self.catalog.columns_of(&target.schema, &target.table),
        };
        if columns.is_empty() {
            self.collector.warn(
                Diagnostic::warn(
                    DiagnosticCode::LineageTargetColumnsUnknown,
                    format!(
                        "target columns unknown for {}.{}; using source column names",
                        target.schema, target.table
                    ),
                )
                .at_line(line),
            );
        }
        columns
    }

    fn record(&mut self, detection: Detection) {
        self.collector.add_dynamic_sql(detection.usage);
        self.collector.warn(detection.warning);
    }
}

fn context(target: &TableTarget, columns: Vec<String>, kind: &'static str, line: usize) -> QueryContext {
    QueryContext {
        target_schema: target.schema.clone(),
        target_table: target.table.clone(),
        target_columns: columns,
        statement_kind: kind,
        statement_line: line,
    }
}

fn ctx_column(ctx: &QueryContext, column: String) -> LineageColumn {
    LineageColumn::new(&ctx.target_schema, &ctx.target_table, column)
}

fn assigned_columns(assignments: &[Assignment]) -> Vec<String> {
    dedup_names(
        assignments
            .iter()
            .flat_map(|a| a.columns.iter().map(|c| c.base().to_string()))
            .collect(),
    )
}

/// Drop case-insensitive repeats, keeping first occurrences in order
fn dedup_names(names: Vec<String>) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    for name in names {
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(&name)) {
            seen.push(name);
        }
    }
    seen
}

/// Alias, else the referenced column's name, else `column_N`
fn output_name(value: &ValueExpr, alias: Option<&str>, index: usize) -> String {
    if let Some(alias) = alias {
        return alias.to_string();
    }
    match value.expr.unnested() {
        Expr::Column(parts) => parts.last().cloned().unwrap_or_else(|| synthesized_name(index)),
        _ => synthesized_name(index),
    }
}

fn synthesized_name(index: usize) -> String {
    format!("column_{}", index + 1)
}

/// Leftmost SELECT of a set expression
fn first_select(body: &SetBody) -> Option<&Select> {
    let mut body = body;
    loop {
        match body {
            SetBody::Select(select) => return Some(select),
            SetBody::SetOperation(branches) => body = branches.first()?,
            SetBody::Query(inner) => body = &inner.body,
            SetBody::Values(_) | SetBody::Unsupported(_) | SetBody::Truncated => return None,
        }
    }
}
