//! Parse-tree source backed by datafusion-sqlparser-rs
//!
//! Splits a script on `GO`, normalizes each batch, parses it and lowers the
//! result into the crate's closed AST. Syntax errors are collected per batch
//! with their line shifted back into the caller's text.

use crate::ast::{ObjectName, Routine, Statement};
use crate::lower::Lowerer;
use crate::normalize::{normalize_batch, split_batches};
use proclineage_core::{Config, DialectConfig, ObjectKind};
use regex::Regex;
use sqlparser::dialect::{Dialect, GenericDialect, MsSqlDialect};
use sqlparser::parser::{Parser, ParserError};
use std::sync::LazyLock;

/// Position suffix sqlparser appends to its messages
static POSITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*at Line: (\d+), Column: (\d+)").unwrap());

/// Floor for the nesting limit handed to sqlparser itself
pub const DEFAULT_RECURSION_LIMIT: usize = 50;

/// sqlparser's limit tracks `max_depth` with headroom, so over-deep input
/// reaches the lowering guard (a warning) instead of failing the batch
fn recursion_limit_for(max_depth: usize) -> usize {
    max_depth.saturating_mul(2).max(DEFAULT_RECURSION_LIMIT)
}

/// Anything that can turn routine text into a lowered tree plus syntax errors
pub trait ParseTreeSource: Send + Sync {
    fn parse(&self, sql: &str) -> ParseOutput;
}

/// Result of parsing one routine
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub routine: Routine,
    pub errors: Vec<SyntaxError>,
}

impl ParseOutput {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A syntax error located in the caller's text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("parse error at line {line}: {message}")]
pub struct SyntaxError {
    /// 1-indexed line
    pub line: usize,
    pub column: Option<usize>,
    pub message: String,
}

impl SyntaxError {
    /// Convert a parser error raised inside a batch starting after `line_offset` lines
    pub fn from_parser_error(error: &ParserError, line_offset: usize) -> Self {
        let raw = error.to_string();
        let raw = raw.strip_prefix("sql parser error: ").unwrap_or(&raw);

        match POSITION_RE.captures(raw) {
            Some(caps) => {
                let line: usize = caps[1].parse().unwrap_or(1);
                let column = caps[2].parse().ok();
                let message = POSITION_RE.replace(raw, "").trim().to_string();
                Self {
                    line: line + line_offset,
                    column,
                    message,
                }
            }
            None => Self {
                line: line_offset + 1,
                column: None,
                message: raw.trim().to_string(),
            },
        }
    }
}

/// SQL parser with configurable dialect
pub struct SqlParser {
    dialect: Box<dyn Dialect + Send + Sync>,
    /// Explicit override; otherwise derived from `max_depth`
    recursion_limit: Option<usize>,
    max_depth: usize,
}

impl SqlParser {
    /// Create a T-SQL parser
    pub fn new() -> Self {
        Self::mssql()
    }

    pub fn mssql() -> Self {
        Self::with_dialect(Box::new(MsSqlDialect {}))
    }

    pub fn generic() -> Self {
        Self::with_dialect(Box::new(GenericDialect {}))
    }

    fn with_dialect(dialect: Box<dyn Dialect + Send + Sync>) -> Self {
        Self {
            dialect,
            recursion_limit: None,
            max_depth: Config::default().max_depth,
        }
    }

    /// Create a parser from a dialect config
    pub fn from_dialect(dialect: &DialectConfig) -> Self {
        match dialect {
            DialectConfig::MsSql => Self::mssql(),
            DialectConfig::Generic => Self::generic(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::from_dialect(&config.dialect).with_max_depth(config.max_depth)
    }

    /// Nesting depth past which lowering truncates expressions and queries
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = Some(limit);
        self
    }

    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
            .unwrap_or_else(|| recursion_limit_for(self.max_depth))
    }

    fn parse_batch(&self, text: &str) -> Result<Vec<sqlparser::ast::Statement>, ParserError> {
        Parser::new(&*self.dialect)
            .with_recursion_limit(self.recursion_limit())
            .try_with_sql(text)
            .and_then(|mut parser| parser.parse_statements())
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ParseTreeSource for SqlParser {
    fn parse(&self, sql: &str) -> ParseOutput {
        let mut output = ParseOutput::default();
        let routine = &mut output.routine;

        for batch in split_batches(sql) {
            let normalized = normalize_batch(batch.text);
            if let (None, Some(header)) = (&routine.name, &normalized.header) {
                routine.name = Some(ObjectName::parse(&header.name));
                routine.kind = Some(header.kind);
            }

            let statements = match self.parse_batch(&normalized.text) {
                Ok(statements) => statements,
                Err(e) => {
                    let error = SyntaxError::from_parser_error(&e, batch.line_offset);
                    tracing::debug!(line = error.line, "batch failed to parse: {}", error.message);
                    output.errors.push(error);
                    continue;
                }
            };

            let mut lowerer = Lowerer::new(batch.line_offset, self.max_depth);
            for statement in &statements {
                let lowered = lowerer.lower_statement(statement);
                if let (None, Statement::CreateView(view)) = (&routine.name, &lowered) {
                    routine.name = Some(view.name.clone());
                    routine.kind = Some(ObjectKind::View);
                }
                routine.statements.push(lowered);
            }
            routine.truncations.extend(lowerer.into_truncations());
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_procedure_body() {
        let sql = "CREATE PROCEDURE dbo.usp_Load AS\nBEGIN\n  SET NOCOUNT ON;\n  INSERT INTO dbo.T (a) SELECT a FROM dbo.S;\nEND";
        let output = SqlParser::new().parse(sql);

        assert!(output.is_ok(), "{:?}", output.errors);
        assert_eq!(output.routine.name, Some(ObjectName::new(["dbo", "usp_Load"])));
        assert_eq!(output.routine.kind, Some(ObjectKind::Procedure));

        let inserts: Vec<_> = output
            .routine
            .statements
            .iter()
            .filter(|s| matches!(s, Statement::Insert(_)))
            .collect();
        assert_eq!(inserts.len(), 1);
        assert_eq!(inserts[0].line(), 4);
    }

    #[test]
    fn parse_view_names_routine() {
        let output = SqlParser::new().parse("CREATE OR ALTER VIEW rpt.V AS SELECT a FROM dbo.S");
        assert!(output.is_ok(), "{:?}", output.errors);
        assert_eq!(output.routine.name, Some(ObjectName::new(["rpt", "V"])));
        assert_eq!(output.routine.kind, Some(ObjectKind::View));
    }

    #[test]
    fn syntax_error_line_is_shifted_by_batch() {
        let sql = "SELECT a FROM dbo.S;\nGO\nSELECT a FROM dbo.S WHERE;";
        let output = SqlParser::new().parse(sql);

        assert_eq!(output.errors.len(), 1);
        let error = &output.errors[0];
        assert_eq!(error.line, 3);
        assert!(error.to_string().starts_with("parse error at line 3: "));
        assert!(!error.message.contains("sql parser error"));

        // The healthy batch still lowers
        assert_eq!(output.routine.statements.len(), 1);
    }

    #[test]
    fn error_without_position_uses_batch_start() {
        let error = SyntaxError::from_parser_error(&ParserError::RecursionLimitExceeded, 10);
        assert_eq!(error.line, 11);
        assert_eq!(error.column, None);
    }

    #[test]
    fn recursion_limit_follows_max_depth() {
        assert_eq!(SqlParser::new().recursion_limit(), 128);
        assert_eq!(SqlParser::new().with_max_depth(4).recursion_limit(), DEFAULT_RECURSION_LIMIT);
        assert_eq!(SqlParser::new().with_recursion_limit(20).recursion_limit(), 20);
    }

    #[test]
    fn nesting_past_max_depth_still_parses() {
        let nested = format!("{}b{}", "(".repeat(70), ")".repeat(70));
        let sql = format!(
            "INSERT INTO dbo.T (a) SELECT s.a FROM dbo.S s;\nINSERT INTO dbo.T (b) SELECT {} FROM dbo.S;",
            nested
        );
        let output = SqlParser::new().parse(&sql);

        assert!(output.is_ok(), "{:?}", output.errors);
        assert_eq!(output.routine.statements.len(), 2);
        assert_eq!(output.routine.truncations, vec![2]);
    }

    #[test]
    fn different_dialects() {
        let sql = "SELECT id FROM users";
        assert!(SqlParser::mssql().parse(sql).is_ok());
        assert!(SqlParser::generic().parse(sql).is_ok());
        assert!(SqlParser::from_dialect(&DialectConfig::Generic).parse(sql).is_ok());
    }
}
