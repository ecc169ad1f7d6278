//! Closed syntax tree consumed by the lineage traversal
//!
//! The parser's tree is lowered into these types so that every statement and
//! expression shape the extractor cares about is an explicit variant, matched
//! exhaustively. Shapes with no lineage meaning collapse into `Other` variants
//! that keep only what is needed to keep walking.

use proclineage_core::ObjectKind;

/// Multi-part identifier with quoting removed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectName(pub Vec<String>);

impl ObjectName {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Parse `[dbo].[T]`, `"dbo"."T"` or `dbo.T`
    pub fn parse(text: &str) -> Self {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut closing: Option<char> = None;

        for c in text.trim().chars() {
            match closing {
                Some(close) if c == close => closing = None,
                Some(_) => current.push(c),
                None => match c {
                    '[' => closing = Some(']'),
                    '"' => closing = Some('"'),
                    '.' => parts.push(std::mem::take(&mut current)),
                    c if c.is_whitespace() => {}
                    c => current.push(c),
                },
            }
        }
        parts.push(current);
        Self(parts)
    }

    /// Last part (the object itself)
    pub fn base(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }

    /// Second-to-last part, if any
    pub fn schema(&self) -> Option<&str> {
        let len = self.0.len();
        (len >= 2).then(|| self.0[len - 2].as_str())
    }

    pub fn is_single(&self) -> bool {
        self.0.len() == 1
    }

    /// `#temp`, `##global` or `@table` variable
    pub fn is_temp(&self) -> bool {
        self.is_single() && (self.base().starts_with('#') || self.base().starts_with('@'))
    }
}

impl std::fmt::Display for ObjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// A whole routine: optional wrapper identity plus its body statements
#[derive(Debug, Clone, Default)]
pub struct Routine {
    pub name: Option<ObjectName>,
    pub kind: Option<ObjectKind>,
    pub statements: Vec<Statement>,

    /// Lines where nesting exceeded the depth limit during lowering
    pub truncations: Vec<usize>,
}

#[derive(Debug, Clone)]
pub enum Statement {
    Query(Query),
    Insert(Insert),
    Update(Update),
    Merge(Merge),
    Delete(Delete),
    CreateTable(CreateTable),
    CreateView(CreateView),
    Execute(Execute),

    /// Statement that can move data but whose shape is not modeled
    Unsupported { kind: String, line: usize },

    /// Statement with no column lineage (DECLARE, DROP, ...)
    Other { kind: String, line: usize },
}

impl Statement {
    pub fn line(&self) -> usize {
        match self {
            Self::Query(q) => q.line,
            Self::Insert(s) => s.line,
            Self::Update(s) => s.line,
            Self::Merge(s) => s.line,
            Self::Delete(s) => s.line,
            Self::CreateTable(s) => s.line,
            Self::CreateView(s) => s.line,
            Self::Execute(s) => s.line,
            Self::Unsupported { line, .. } | Self::Other { line, .. } => *line,
        }
    }

    pub fn kind_name(&self) -> &str {
        match self {
            Self::Query(_) => "SELECT",
            Self::Insert(_) => "INSERT",
            Self::Update(_) => "UPDATE",
            Self::Merge(_) => "MERGE",
            Self::Delete(_) => "DELETE",
            Self::CreateTable(_) => "CREATE TABLE",
            Self::CreateView(_) => "CREATE VIEW",
            Self::Execute(_) => "EXECUTE",
            Self::Unsupported { kind, .. } | Self::Other { kind, .. } => kind,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Insert {
    pub target: ObjectName,
    pub columns: Vec<String>,

    /// `None` for `DEFAULT VALUES`
    pub source: Option<Query>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct Update {
    /// Leading `WITH` clause, if any
    pub ctes: Vec<Cte>,
    pub target: ObjectName,
    pub target_alias: Option<String>,
    pub assignments: Vec<Assignment>,
    pub from: Vec<TableRef>,
    pub selection: Option<ValueExpr>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct Assignment {
    /// Assigned columns, possibly alias-qualified
    pub columns: Vec<ObjectName>,
    pub value: ValueExpr,
}

#[derive(Debug, Clone)]
pub struct Merge {
    pub target: ObjectName,
    pub target_alias: Option<String>,
    pub source: TableRef,
    pub on: ValueExpr,
    pub clauses: Vec<MergeAction>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub enum MergeAction {
    Insert {
        columns: Vec<String>,
        /// `None` for `INSERT ROW`
        values: Option<Vec<ValueExpr>>,
    },
    Update(Vec<Assignment>),
    Delete,
}

/// DELETE moves no column data; its row sources are still scanned
#[derive(Debug, Clone)]
pub struct Delete {
    /// FROM and USING entries, target included
    pub from: Vec<TableRef>,
    pub selection: Option<ValueExpr>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct CreateTable {
    pub name: ObjectName,
    /// Column name and declared type
    pub columns: Vec<(String, Option<String>)>,
    pub query: Option<Query>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct CreateView {
    pub name: ObjectName,
    pub columns: Vec<String>,
    pub query: Query,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecTarget {
    Procedure(ObjectName),
    /// `EXEC @name`
    Variable(String),
    /// `EXEC (<string>)`
    CommandString,
}

#[derive(Debug, Clone)]
pub struct Execute {
    pub target: ExecTarget,
    pub fragment: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone)]
pub struct Query {
    pub ctes: Vec<Cte>,
    pub body: SetBody,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct Cte {
    pub name: String,
    pub columns: Vec<String>,
    pub query: Query,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub enum SetBody {
    Select(Box<Select>),
    Values(Vec<Vec<ValueExpr>>),
    Query(Box<Query>),
    /// UNION / EXCEPT / INTERSECT branches in source order
    SetOperation(Vec<SetBody>),
    Unsupported(String),
    /// Nesting beyond the depth limit
    Truncated,
}

#[derive(Debug, Clone)]
pub struct Select {
    pub projection: Vec<SelectItem>,
    pub from: Vec<TableRef>,
    pub into: Option<ObjectName>,
    pub selection: Option<ValueExpr>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub enum SelectItem {
    Expr { value: ValueExpr, alias: Option<String> },
    Wildcard,
    QualifiedWildcard(ObjectName),
    /// `SELECT @v = expr`; produces no result column
    Assign { variable: String, value: ValueExpr },
}

/// Expression plus the source text it came from
#[derive(Debug, Clone)]
pub struct ValueExpr {
    pub expr: Expr,

    /// `None` when the expression was truncated by the depth guard
    pub text: Option<String>,
}

#[derive(Debug, Clone)]
pub enum TableRef {
    Named {
        name: ObjectName,
        alias: Option<String>,
    },
    Derived {
        query: Box<Query>,
        alias: Option<String>,
    },
    Join {
        left: Box<TableRef>,
        right: Box<TableRef>,
        on: Option<ValueExpr>,
    },
    /// OPENQUERY / OPENROWSET / OPENDATASOURCE
    External {
        function: String,
        alias: Option<String>,
        fragment: String,
        line: usize,
        column: usize,
    },
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    /// `||`
    StringConcat,
    /// `=`
    Equals,
    Comparison,
    Logical,
    Other,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Plus | Self::Minus | Self::Multiply | Self::Divide | Self::Modulo
        )
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    /// Column reference, identifier parts in order
    Column(Vec<String>),
    Variable(String),
    Literal { is_string: bool },
    Function { name: String, args: Vec<Expr> },
    /// CAST / CONVERT / TRY_CAST
    Cast(Box<Expr>),
    Case {
        operand: Option<Box<Expr>>,
        conditions: Vec<Expr>,
        results: Vec<Expr>,
        else_result: Option<Box<Expr>>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary { arithmetic: bool, expr: Box<Expr> },
    Nested(Box<Expr>),
    Subquery(Box<Query>),
    /// Any other node; only its column-bearing children are kept
    Other(Vec<Expr>),
    /// Nesting beyond the depth limit
    Truncated,
}

impl Expr {
    /// Strip redundant parentheses
    pub fn unnested(&self) -> &Expr {
        let mut expr = self;
        while let Expr::Nested(inner) = expr {
            expr = inner;
        }
        expr
    }

    /// Immediate child expressions (subquery bodies excluded)
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Column(_)
            | Expr::Variable(_)
            | Expr::Literal { .. }
            | Expr::Subquery(_)
            | Expr::Truncated => Vec::new(),
            Expr::Function { args, .. } | Expr::Other(args) => args.iter().collect(),
            Expr::Cast(inner) | Expr::Nested(inner) => vec![inner.as_ref()],
            Expr::Unary { expr, .. } => vec![expr.as_ref()],
            Expr::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => operand
                .iter()
                .map(|e| e.as_ref())
                .chain(conditions.iter())
                .chain(results.iter())
                .chain(else_result.iter().map(|e| e.as_ref()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_name_parse() {
        assert_eq!(ObjectName::parse("[dbo].[Order Lines]").0, vec!["dbo", "Order Lines"]);
        assert_eq!(ObjectName::parse("\"sales\".\"T\"").0, vec!["sales", "T"]);
        assert_eq!(ObjectName::parse("usp_Load").0, vec!["usp_Load"]);
        assert_eq!(ObjectName::parse("db . dbo . t").0, vec!["db", "dbo", "t"]);
    }

    #[test]
    fn object_name_parts() {
        let name = ObjectName::new(["db", "dbo", "T"]);
        assert_eq!(name.base(), "T");
        assert_eq!(name.schema(), Some("dbo"));
        assert_eq!(name.to_string(), "db.dbo.T");

        let temp = ObjectName::new(["#stage"]);
        assert!(temp.is_temp());
        assert_eq!(temp.schema(), None);
        assert!(!ObjectName::new(["dbo", "#x"]).is_temp());
    }

    #[test]
    fn unnested_strips_parentheses() {
        let expr = Expr::Nested(Box::new(Expr::Nested(Box::new(Expr::Column(vec!["a".into()])))));
        assert!(matches!(expr.unnested(), Expr::Column(_)));
    }

    #[test]
    fn case_children_in_order() {
        let col = |n: &str| Expr::Column(vec![n.to_string()]);
        let expr = Expr::Case {
            operand: None,
            conditions: vec![col("a")],
            results: vec![col("b")],
            else_result: Some(Box::new(col("c"))),
        };
        let names: Vec<_> = expr
            .children()
            .into_iter()
            .filter_map(|e| match e {
                Expr::Column(parts) => Some(parts[0].clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
