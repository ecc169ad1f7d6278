//! Lowering from the sqlparser tree into the closed lineage AST
//!
//! Lowering is where the nesting guard lives: expressions and queries nested
//! deeper than `max_depth` become `Truncated` nodes and the line is recorded,
//! so nothing downstream has to walk an unbounded tree.

use crate::ast::*;
use crate::normalize::EXEC_STRING_TARGET;
use sqlparser::ast as sql;
use sqlparser::ast::{Spanned, Visit, Visitor};
use sqlparser::tokenizer::Span;
use std::ops::ControlFlow;

/// Longest fragment kept for dynamic SQL and unsupported constructs
const MAX_FRAGMENT_CHARS: usize = 200;

const EXTERNAL_ROW_SOURCES: &[&str] = &["OPENQUERY", "OPENROWSET", "OPENDATASOURCE"];

pub(crate) struct Lowerer {
    line_offset: usize,
    max_depth: usize,
    depth: usize,
    current_line: usize,
    truncations: Vec<usize>,
}

impl Lowerer {
    pub(crate) fn new(line_offset: usize, max_depth: usize) -> Self {
        Self {
            line_offset,
            max_depth,
            depth: 0,
            current_line: 0,
            truncations: Vec::new(),
        }
    }

    pub(crate) fn into_truncations(self) -> Vec<usize> {
        self.truncations
    }

    fn line(&self, span: Span) -> usize {
        match span.start.line {
            0 => 0,
            line => line as usize + self.line_offset,
        }
    }

    /// Enter one nesting level; false (and the line recorded) past the limit
    fn enter(&mut self) -> bool {
        if self.depth >= self.max_depth {
            self.truncations.push(self.current_line);
            return false;
        }
        self.depth += 1;
        true
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    pub(crate) fn lower_statement(&mut self, stmt: &sql::Statement) -> Statement {
        match stmt {
            sql::Statement::Query(query) => {
                // WITH ... INSERT / WITH ... UPDATE
                if let sql::SetExpr::Insert(inner) | sql::SetExpr::Update(inner) = query.body.as_ref() {
                    let ctes = self.lower_ctes(query);
                    let lowered = self.lower_statement(inner);
                    return attach_ctes(lowered, ctes);
                }
                self.current_line = self.query_line(query);
                Statement::Query(self.lower_query(query))
            }
            sql::Statement::Insert(insert) => {
                let line = self.line(insert.table_name.span());
                self.current_line = line;
                Statement::Insert(Insert {
                    target: object_name(&insert.table_name),
                    columns: insert.columns.iter().map(|c| c.value.clone()).collect(),
                    source: insert.source.as_ref().map(|q| self.lower_query(q)),
                    line,
                })
            }
            sql::Statement::Update {
                table,
                assignments,
                from,
                selection,
                ..
            } => {
                let line = self.line(table.relation.span());
                self.current_line = line;

                let sql::TableFactor::Table { name, alias, .. } = &table.relation else {
                    return Statement::Unsupported { kind: "UPDATE".into(), line };
                };

                let mut sources = Vec::new();
                if !table.joins.is_empty() {
                    sources.push(self.lower_table_with_joins(table));
                }
                if let Some(from) = from {
                    sources.push(self.lower_table_with_joins(from));
                }

                Statement::Update(Update {
                    ctes: Vec::new(),
                    target: object_name(name),
                    target_alias: alias.as_ref().map(|a| a.name.value.clone()),
                    assignments: self.lower_assignments(assignments),
                    from: sources,
                    selection: selection.as_ref().map(|e| self.lower_value(e)),
                    line,
                })
            }
            sql::Statement::Merge {
                table,
                source,
                on,
                clauses,
                ..
            } => {
                let line = self.line(table.span());
                self.current_line = line;

                let sql::TableFactor::Table { name, alias, .. } = table else {
                    return Statement::Unsupported { kind: "MERGE".into(), line };
                };

                let mut actions = Vec::with_capacity(clauses.len());
                for clause in clauses {
                    actions.push(self.lower_merge_action(&clause.action));
                }

                Statement::Merge(Merge {
                    target: object_name(name),
                    target_alias: alias.as_ref().map(|a| a.name.value.clone()),
                    source: self.lower_table_factor(source),
                    on: self.lower_value(on),
                    clauses: actions,
                    line,
                })
            }
            sql::Statement::Delete(delete) => {
                let tables = match &delete.from {
                    sql::FromTable::WithFromKeyword(tables) | sql::FromTable::WithoutKeyword(tables) => tables,
                };
                let line = tables
                    .first()
                    .map(|t| self.line(t.relation.span()))
                    .filter(|line| *line != 0)
                    .unwrap_or(self.current_line);
                self.current_line = line;

                let mut from = Vec::new();
                for table in tables.iter().chain(delete.using.iter().flatten()) {
                    from.push(self.lower_table_with_joins(table));
                }
                Statement::Delete(Delete {
                    from,
                    selection: delete.selection.as_ref().map(|e| self.lower_value(e)),
                    line,
                })
            }
            sql::Statement::CreateTable(create) => {
                let line = self.line(create.name.span());
                self.current_line = line;
                Statement::CreateTable(CreateTable {
                    name: object_name(&create.name),
                    columns: create
                        .columns
                        .iter()
                        .map(|c| (c.name.value.clone(), Some(c.data_type.to_string())))
                        .collect(),
                    query: create.query.as_ref().map(|q| self.lower_query(q)),
                    line,
                })
            }
            sql::Statement::CreateView {
                name,
                columns,
                query,
                ..
            } => {
                let line = self.line(name.span());
                self.current_line = line;
                Statement::CreateView(CreateView {
                    name: object_name(name),
                    columns: columns.iter().map(|c| c.name.value.clone()).collect(),
                    query: self.lower_query(query),
                    line,
                })
            }
            sql::Statement::Execute {
                name, parameters, ..
            } => {
                let span = name.span();
                let target = exec_target(name);
                let fragment = match target {
                    ExecTarget::CommandString => format!(
                        "EXEC ({})",
                        parameters
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                    _ => stmt.to_string(),
                };
                Statement::Execute(Execute {
                    target,
                    fragment: truncate(fragment),
                    line: self.line(span),
                    column: span.start.column as usize,
                })
            }
            other => Statement::Other {
                kind: statement_keyword(other),
                line: 0,
            },
        }
    }

    fn lower_assignments(&mut self, assignments: &[sql::Assignment]) -> Vec<Assignment> {
        let mut lowered = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let columns = match &assignment.target {
                sql::AssignmentTarget::ColumnName(name) => vec![object_name(name)],
                sql::AssignmentTarget::Tuple(names) => names.iter().map(object_name).collect(),
            };
            lowered.push(Assignment {
                columns,
                value: self.lower_value(&assignment.value),
            });
        }
        lowered
    }

    fn lower_merge_action(&mut self, action: &sql::MergeAction) -> MergeAction {
        match action {
            sql::MergeAction::Insert(insert) => {
                let values = match &insert.kind {
                    sql::MergeInsertKind::Values(values) => {
                        let mut row = Vec::new();
                        if let Some(first) = values.rows.first() {
                            for expr in first {
                                row.push(self.lower_value(expr));
                            }
                        }
                        Some(row)
                    }
                    sql::MergeInsertKind::Row => None,
                };
                MergeAction::Insert {
                    columns: insert.columns.iter().map(|c| c.value.clone()).collect(),
                    values,
                }
            }
            sql::MergeAction::Update { assignments } => {
                MergeAction::Update(self.lower_assignments(assignments))
            }
            sql::MergeAction::Delete => MergeAction::Delete,
        }
    }

    fn lower_query(&mut self, query: &sql::Query) -> Query {
        let line = self.query_line(query);
        if !self.enter() {
            return Query {
                ctes: Vec::new(),
                body: SetBody::Truncated,
                line,
            };
        }

        let ctes = self.lower_ctes(query);
        let body = self.lower_set_expr(&query.body);

        self.leave();
        Query { ctes, body, line }
    }

    fn lower_ctes(&mut self, query: &sql::Query) -> Vec<Cte> {
        let mut ctes = Vec::new();
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                let body = self.lower_query(&cte.query);
                ctes.push(Cte {
                    name: cte.alias.name.value.clone(),
                    columns: cte.alias.columns.iter().map(|c| c.to_string()).collect(),
                    line: body.line,
                    query: body,
                });
            }
        }
        ctes
    }

    /// Line of the leftmost SELECT, without walking whole set-operation trees
    fn query_line(&self, query: &sql::Query) -> usize {
        let mut body = query.body.as_ref();
        loop {
            match body {
                sql::SetExpr::SetOperation { left, .. } => body = left.as_ref(),
                sql::SetExpr::Query(inner) => body = inner.body.as_ref(),
                sql::SetExpr::Select(select) => return self.line(select.span()),
                _ => return self.current_line,
            }
        }
    }

    /// Flatten a left-deep UNION chain iteratively
    fn lower_set_expr(&mut self, body: &sql::SetExpr) -> SetBody {
        if !matches!(body, sql::SetExpr::SetOperation { .. }) {
            return self.lower_set_leaf(body);
        }

        let mut branches = Vec::new();
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            match node {
                sql::SetExpr::SetOperation { left, right, .. } => {
                    stack.push(right.as_ref());
                    stack.push(left.as_ref());
                }
                leaf => branches.push(self.lower_set_leaf(leaf)),
            }
        }
        SetBody::SetOperation(branches)
    }

    fn lower_set_leaf(&mut self, body: &sql::SetExpr) -> SetBody {
        match body {
            sql::SetExpr::Select(select) => SetBody::Select(Box::new(self.lower_select(select))),
            sql::SetExpr::Query(query) => SetBody::Query(Box::new(self.lower_query(query))),
            sql::SetExpr::Values(values) => {
                let mut rows = Vec::with_capacity(values.rows.len());
                for row in &values.rows {
                    let mut lowered = Vec::with_capacity(row.len());
                    for expr in row {
                        lowered.push(self.lower_value(expr));
                    }
                    rows.push(lowered);
                }
                SetBody::Values(rows)
            }
            sql::SetExpr::SetOperation { .. } => self.lower_set_expr(body),
            other => SetBody::Unsupported(truncate(other.to_string())),
        }
    }

    fn lower_select(&mut self, select: &sql::Select) -> Select {
        let line = self.line(select.span());
        if line != 0 {
            self.current_line = line;
        }

        let mut projection = Vec::with_capacity(select.projection.len());
        for item in &select.projection {
            projection.push(self.lower_select_item(item));
        }

        let mut from = Vec::with_capacity(select.from.len());
        for table in &select.from {
            from.push(self.lower_table_with_joins(table));
        }

        Select {
            projection,
            from,
            into: select.into.as_ref().map(|into| object_name(&into.name)),
            selection: select.selection.as_ref().map(|e| self.lower_value(e)),
            line,
        }
    }

    fn lower_select_item(&mut self, item: &sql::SelectItem) -> SelectItem {
        match item {
            sql::SelectItem::UnnamedExpr(expr) => match assignment_target(expr) {
                // T-SQL: `SELECT @v = expr` assigns, `SELECT name = expr` aliases
                Some((name, value)) if name.starts_with('@') => SelectItem::Assign {
                    variable: name,
                    value: self.lower_value(value),
                },
                Some((name, value)) => SelectItem::Expr {
                    value: self.lower_value(value),
                    alias: Some(name),
                },
                None => SelectItem::Expr {
                    value: self.lower_value(expr),
                    alias: None,
                },
            },
            sql::SelectItem::ExprWithAlias { expr, alias } => SelectItem::Expr {
                value: self.lower_value(expr),
                alias: Some(alias.value.clone()),
            },
            sql::SelectItem::QualifiedWildcard(name, _) => {
                SelectItem::QualifiedWildcard(object_name(name))
            }
            sql::SelectItem::Wildcard(_) => SelectItem::Wildcard,
        }
    }

    fn lower_table_with_joins(&mut self, table: &sql::TableWithJoins) -> TableRef {
        let mut lowered = self.lower_table_factor(&table.relation);
        for join in &table.joins {
            let right = self.lower_table_factor(&join.relation);
            let on = join_condition(&join.join_operator).map(|e| self.lower_value(e));
            lowered = TableRef::Join {
                left: Box::new(lowered),
                right: Box::new(right),
                on,
            };
        }
        lowered
    }

    fn lower_table_factor(&mut self, factor: &sql::TableFactor) -> TableRef {
        match factor {
            sql::TableFactor::Table { name, alias, .. } => {
                let alias = alias.as_ref().map(|a| a.name.value.clone());
                let lowered = object_name(name);
                let function = lowered.base().to_ascii_uppercase();
                if lowered.is_single() && EXTERNAL_ROW_SOURCES.contains(&function.as_str()) {
                    let span = name.span();
                    return TableRef::External {
                        function,
                        alias,
                        fragment: truncate(factor.to_string()),
                        line: self.line(span),
                        column: span.start.column as usize,
                    };
                }
                TableRef::Named {
                    name: lowered,
                    alias,
                }
            }
            sql::TableFactor::Derived {
                subquery, alias, ..
            } => TableRef::Derived {
                query: Box::new(self.lower_query(subquery)),
                alias: alias.as_ref().map(|a| a.name.value.clone()),
            },
            sql::TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.lower_table_with_joins(table_with_joins),
            other => TableRef::Unsupported(truncate(other.to_string())),
        }
    }

    fn lower_value(&mut self, expr: &sql::Expr) -> ValueExpr {
        let before = self.truncations.len();
        let lowered = self.lower_expr(expr);
        let text = (self.truncations.len() == before).then(|| expr.to_string());
        ValueExpr {
            expr: lowered,
            text,
        }
    }

    fn lower_expr(&mut self, expr: &sql::Expr) -> Expr {
        if !self.enter() {
            return Expr::Truncated;
        }
        let lowered = self.lower_expr_inner(expr);
        self.leave();
        lowered
    }

    fn lower_boxed(&mut self, expr: &sql::Expr) -> Box<Expr> {
        Box::new(self.lower_expr(expr))
    }

    fn lower_subquery(&mut self, query: &sql::Query) -> Expr {
        Expr::Subquery(Box::new(self.lower_query(query)))
    }

    fn lower_expr_inner(&mut self, expr: &sql::Expr) -> Expr {
        use sql::Expr as E;

        match expr {
            E::Identifier(ident) => identifier(vec![ident.value.clone()]),
            E::CompoundIdentifier(idents) => {
                identifier(idents.iter().map(|i| i.value.clone()).collect())
            }
            E::Value(value) => match value {
                sql::Value::SingleQuotedString(_) | sql::Value::NationalStringLiteral(_) => {
                    Expr::Literal { is_string: true }
                }
                sql::Value::Placeholder(name) => Expr::Variable(name.clone()),
                _ => Expr::Literal { is_string: false },
            },
            E::Function(function) => self.lower_function(function),
            E::Cast { expr, .. } | E::Convert { expr, .. } => Expr::Cast(self.lower_boxed(expr)),
            E::Case {
                operand,
                conditions,
                results,
                else_result,
                ..
            } => Expr::Case {
                operand: operand.as_ref().map(|e| self.lower_boxed(e)),
                conditions: conditions.iter().map(|e| self.lower_expr(e)).collect(),
                results: results.iter().map(|e| self.lower_expr(e)).collect(),
                else_result: else_result.as_ref().map(|e| self.lower_boxed(e)),
            },
            E::BinaryOp { left, op, right } => Expr::Binary {
                op: binary_op(op),
                left: self.lower_boxed(left),
                right: self.lower_boxed(right),
            },
            E::UnaryOp { op, expr } => Expr::Unary {
                arithmetic: matches!(op, sql::UnaryOperator::Minus | sql::UnaryOperator::Plus),
                expr: self.lower_boxed(expr),
            },
            E::Nested(inner) => Expr::Nested(self.lower_boxed(inner)),
            E::Subquery(query) => self.lower_subquery(query),
            E::Exists { subquery, .. } => Expr::Other(vec![self.lower_subquery(subquery)]),
            E::InSubquery { expr, subquery, .. } => {
                Expr::Other(vec![self.lower_expr(expr), self.lower_subquery(subquery)])
            }
            E::InList { expr, list, .. } => {
                let mut children = vec![self.lower_expr(expr)];
                for item in list {
                    children.push(self.lower_expr(item));
                }
                Expr::Other(children)
            }
            E::Between {
                expr, low, high, ..
            } => Expr::Other(vec![
                self.lower_expr(expr),
                self.lower_expr(low),
                self.lower_expr(high),
            ]),
            E::IsNull(inner) | E::IsNotNull(inner) => Expr::Other(vec![self.lower_expr(inner)]),
            E::Like { expr, pattern, .. } => {
                Expr::Other(vec![self.lower_expr(expr), self.lower_expr(pattern)])
            }
            other => Expr::Other(collect_columns(other)),
        }
    }

    fn lower_function(&mut self, function: &sql::Function) -> Expr {
        let name = function
            .name
            .0
            .last()
            .map(|ident| ident.value.to_ascii_uppercase())
            .unwrap_or_default();

        let mut args = Vec::new();
        match &function.args {
            sql::FunctionArguments::None => {}
            sql::FunctionArguments::Subquery(query) => args.push(self.lower_subquery(query)),
            sql::FunctionArguments::List(list) => {
                for arg in &list.args {
                    let arg = match arg {
                        sql::FunctionArg::Unnamed(arg) => arg,
                        sql::FunctionArg::Named { arg, .. } => arg,
                        #[allow(unreachable_patterns)]
                        _ => continue,
                    };
                    if let sql::FunctionArgExpr::Expr(expr) = arg {
                        args.push(self.lower_expr(expr));
                    }
                }
            }
        }

        Expr::Function { name, args }
    }
}

/// Hand a leading WITH clause to the DML statement it belongs to
fn attach_ctes(statement: Statement, mut ctes: Vec<Cte>) -> Statement {
    match statement {
        Statement::Insert(mut insert) => {
            if let Some(source) = &mut insert.source {
                ctes.append(&mut source.ctes);
                source.ctes = ctes;
            }
            Statement::Insert(insert)
        }
        Statement::Update(mut update) => {
            ctes.append(&mut update.ctes);
            update.ctes = ctes;
            Statement::Update(update)
        }
        other => other,
    }
}

/// Collects column references of an arbitrary expression, skipping subqueries
#[derive(Default)]
struct ColumnCollector {
    query_depth: usize,
    columns: Vec<Vec<String>>,
}

impl Visitor for ColumnCollector {
    type Break = ();

    fn pre_visit_query(&mut self, _query: &sql::Query) -> ControlFlow<Self::Break> {
        self.query_depth += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &sql::Query) -> ControlFlow<Self::Break> {
        self.query_depth -= 1;
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &sql::Expr) -> ControlFlow<Self::Break> {
        if self.query_depth == 0 {
            match expr {
                sql::Expr::Identifier(ident) => self.columns.push(vec![ident.value.clone()]),
                sql::Expr::CompoundIdentifier(idents) => self
                    .columns
                    .push(idents.iter().map(|i| i.value.clone()).collect()),
                _ => {}
            }
        }
        ControlFlow::Continue(())
    }
}

fn collect_columns(expr: &sql::Expr) -> Vec<Expr> {
    let mut collector = ColumnCollector::default();
    let _ = expr.visit(&mut collector);
    collector.columns.into_iter().map(identifier).collect()
}

/// `@name` is a variable, everything else a column reference
fn identifier(parts: Vec<String>) -> Expr {
    match parts.as_slice() {
        [single] if single.starts_with('@') => Expr::Variable(single.clone()),
        _ => Expr::Column(parts),
    }
}

fn object_name(name: &sql::ObjectName) -> ObjectName {
    ObjectName(name.0.iter().map(|i| i.value.clone()).collect())
}

fn exec_target(name: &sql::ObjectName) -> ExecTarget {
    match name.0.as_slice() {
        [single] if single.value.eq_ignore_ascii_case(EXEC_STRING_TARGET) => {
            ExecTarget::CommandString
        }
        [single] if single.value.starts_with('@') => ExecTarget::Variable(single.value.clone()),
        _ => ExecTarget::Procedure(object_name(name)),
    }
}

/// `name = expr` in a select list
fn assignment_target(expr: &sql::Expr) -> Option<(String, &sql::Expr)> {
    if let sql::Expr::BinaryOp {
        left,
        op: sql::BinaryOperator::Eq,
        right,
    } = expr
    {
        if let sql::Expr::Identifier(ident) = left.as_ref() {
            return Some((ident.value.clone(), right.as_ref()));
        }
    }
    None
}

fn join_condition(op: &sql::JoinOperator) -> Option<&sql::Expr> {
    use sql::JoinOperator as J;

    let constraint = match op {
        J::Inner(c) | J::LeftOuter(c) | J::RightOuter(c) | J::FullOuter(c) => c,
        _ => return None,
    };
    match constraint {
        sql::JoinConstraint::On(expr) => Some(expr),
        _ => None,
    }
}

fn binary_op(op: &sql::BinaryOperator) -> BinaryOp {
    use sql::BinaryOperator as B;

    match op {
        B::Plus => BinaryOp::Plus,
        B::Minus => BinaryOp::Minus,
        B::Multiply => BinaryOp::Multiply,
        B::Divide => BinaryOp::Divide,
        B::Modulo => BinaryOp::Modulo,
        B::StringConcat => BinaryOp::StringConcat,
        B::Eq => BinaryOp::Equals,
        B::NotEq | B::Gt | B::Lt | B::GtEq | B::LtEq | B::Spaceship => BinaryOp::Comparison,
        B::And | B::Or | B::Xor => BinaryOp::Logical,
        _ => BinaryOp::Other,
    }
}

/// First keyword of a statement, for logs
fn statement_keyword(stmt: &sql::Statement) -> String {
    stmt.to_string()
        .split_whitespace()
        .next()
        .unwrap_or("STATEMENT")
        .to_ascii_uppercase()
}

fn truncate(mut text: String) -> String {
    if let Some((idx, _)) = text.char_indices().nth(MAX_FRAGMENT_CHARS) {
        text.truncate(idx);
        text.push_str("...");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlparser::dialect::MsSqlDialect;
    use sqlparser::parser::Parser;

    fn lower(sql: &str, max_depth: usize) -> (Vec<Statement>, Vec<usize>) {
        let statements = Parser::parse_sql(&MsSqlDialect {}, sql).unwrap();
        let mut lowerer = Lowerer::new(0, max_depth);
        let lowered = statements.iter().map(|s| lowerer.lower_statement(s)).collect();
        (lowered, lowerer.into_truncations())
    }

    fn select_of(stmt: &Statement) -> &Select {
        match stmt {
            Statement::Query(Query {
                body: SetBody::Select(select),
                ..
            }) => select,
            other => panic!("expected select, got {:?}", other),
        }
    }

    #[test]
    fn insert_select_lowered() {
        let (stmts, _) = lower("INSERT INTO dbo.T (a, b) SELECT x.a, x.b FROM dbo.S x;", 64);
        let Statement::Insert(insert) = &stmts[0] else {
            panic!("expected insert");
        };
        assert_eq!(insert.target, ObjectName::new(["dbo", "T"]));
        assert_eq!(insert.columns, vec!["a", "b"]);
        assert_eq!(insert.line, 1);
        assert!(insert.source.is_some());
    }

    #[test]
    fn union_chain_is_flat() {
        let sql = (0..50)
            .map(|i| format!("SELECT c{} FROM t{}", i, i))
            .collect::<Vec<_>>()
            .join(" UNION ALL ");
        let (stmts, truncations) = lower(&format!("{};", sql), 8);
        assert!(truncations.is_empty());

        let Statement::Query(query) = &stmts[0] else {
            panic!("expected query");
        };
        let SetBody::SetOperation(branches) = &query.body else {
            panic!("expected set operation");
        };
        assert_eq!(branches.len(), 50);
        let SetBody::Select(first) = &branches[0] else {
            panic!("expected select");
        };
        assert!(matches!(&first.from[0], TableRef::Named { name, .. } if name.base() == "t0"));
    }

    #[test]
    fn tsql_alias_and_variable_assignment() {
        let (stmts, _) = lower("SELECT Total = SUM(o.Amount), @n = COUNT(*) FROM dbo.Orders o;", 64);
        let select = select_of(&stmts[0]);
        assert!(matches!(&select.projection[0], SelectItem::Expr { alias: Some(a), .. } if a == "Total"));
        assert!(matches!(&select.projection[1], SelectItem::Assign { variable, .. } if variable == "@n"));
    }

    #[test]
    fn depth_guard_truncates() {
        let (stmts, truncations) = lower("SELECT ((((((a)))))) FROM t;", 3);
        assert!(!truncations.is_empty());
        let select = select_of(&stmts[0]);
        let SelectItem::Expr { value, .. } = &select.projection[0] else {
            panic!("expected expression");
        };
        assert!(value.text.is_none());
    }

    #[test]
    fn exec_targets() {
        let (stmts, _) = lower("EXEC sp_executesql @sql; EXEC @proc; EXEC __exec_string (@sql);", 64);
        let targets: Vec<_> = stmts
            .iter()
            .map(|s| match s {
                Statement::Execute(e) => e.target.clone(),
                other => panic!("expected execute, got {:?}", other),
            })
            .collect();
        assert_eq!(
            targets,
            vec![
                ExecTarget::Procedure(ObjectName::new(["sp_executesql"])),
                ExecTarget::Variable("@proc".into()),
                ExecTarget::CommandString,
            ]
        );
    }

    #[test]
    fn leading_with_moves_into_insert() {
        let (stmts, _) = lower(
            "WITH recent AS (SELECT a FROM dbo.S) INSERT INTO dbo.T (a) SELECT a FROM recent;",
            64,
        );
        let Statement::Insert(insert) = &stmts[0] else {
            panic!("expected insert, got {:?}", stmts[0]);
        };
        let source = insert.source.as_ref().unwrap();
        assert_eq!(source.ctes.len(), 1);
        assert_eq!(source.ctes[0].name, "recent");
    }

    #[test]
    fn external_row_source() {
        let (stmts, _) = lower("SELECT r.a FROM OPENQUERY(LinkedSrv, 'SELECT a FROM t') r;", 64);
        let select = select_of(&stmts[0]);
        assert!(matches!(
            &select.from[0],
            TableRef::External { function, alias: Some(a), .. } if function == "OPENQUERY" && a == "r"
        ));
    }

    #[test]
    fn update_from_joins_become_sources() {
        let (stmts, _) = lower("UPDATE t SET t.a = s.a FROM dbo.T t JOIN dbo.S s ON s.b = t.b;", 64);
        let Statement::Update(update) = &stmts[0] else {
            panic!("expected update, got {:?}", stmts[0]);
        };
        assert_eq!(update.from.len(), 1);
        assert!(matches!(&update.from[0], TableRef::Join { on: Some(_), .. }));
    }

    #[test]
    fn delete_keeps_row_sources() {
        let (stmts, _) = lower(
            "DELETE FROM dbo.T WHERE a IN (SELECT x FROM OPENQUERY(srv, 'select x') q);",
            64,
        );
        let Statement::Delete(delete) = &stmts[0] else {
            panic!("expected delete, got {:?}", stmts[0]);
        };
        assert_eq!(delete.line, 1);
        assert!(matches!(&delete.from[0], TableRef::Named { name, .. } if name.base() == "T"));
        let selection = delete.selection.as_ref().unwrap();
        assert!(matches!(&selection.expr, Expr::Other(children) if matches!(children[1], Expr::Subquery(_))));
    }

    #[test]
    fn fragment_truncation() {
        let long = "x".repeat(500);
        let cut = truncate(long);
        assert_eq!(cut.chars().count(), MAX_FRAGMENT_CHARS + 3);
    }
}
