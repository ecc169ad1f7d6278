//! T-SQL source normalization ahead of parsing
//!
//! Every rewrite here keeps line numbers intact: a replaced span always
//! contains exactly as many newlines as the text it replaces, so parser
//! locations still point at the caller's source.

use proclineage_core::ObjectKind;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// Procedure name substituted for `EXEC (<string>)`
pub const EXEC_STRING_TARGET: &str = "__exec_string";

// =============================================================================
// Cached Regex Patterns
// =============================================================================

/// Batch separator: GO on its own line, with an optional repeat count
static GO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*GO(?:\s+\d+)?\s*;?\s*$").unwrap());

/// Routine header through the routine name; the body-opening AS is found by [`body_as`]
static ROUTINE_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)\b(?:CREATE(?:\s+OR\s+ALTER)?|ALTER)\s+(PROCEDURE|PROC|FUNCTION|TRIGGER)\s+((?:\[[^\]]+\]|"[^"]+"|[\w@#$]+)(?:\s*\.\s*(?:\[[^\]]+\]|"[^"]+"|[\w@#$]+))*)"#,
    )
    .unwrap()
});

/// Words, parentheses and separators, for token-level scans of masked text
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[@#$\w]+|[();]").unwrap());

/// Keywords that open a statement, ending an IF / WHILE condition
const STATEMENT_KEYWORDS: &[&str] = &[
    "BEGIN", "SELECT", "INSERT", "UPDATE", "DELETE", "MERGE", "EXEC", "EXECUTE", "SET", "DECLARE",
    "RETURN", "PRINT", "RAISERROR", "THROW", "WITH", "TRUNCATE", "DROP", "CREATE", "ALTER", "IF",
    "WHILE", "BREAK", "CONTINUE", "GOTO", "COMMIT", "ROLLBACK", "SAVE", "WAITFOR", "OPEN", "FETCH",
    "CLOSE", "DEALLOCATE",
];

/// Words before an `IF EXISTS` that belongs to DDL, not control flow
const DROP_TARGETS: &[&str] = &[
    "TABLE", "VIEW", "PROC", "PROCEDURE", "FUNCTION", "INDEX", "TRIGGER", "SCHEMA", "SEQUENCE",
    "TYPE", "SYNONYM", "COLUMN", "CONSTRAINT",
];

/// `BEGIN <word>` forms that are statements rather than blocks
const TRANSACTION_WORDS: &[&str] = &["TRAN", "TRANSACTION", "DISTRIBUTED", "DIALOG", "CONVERSATION"];

/// `DECLARE @t TABLE` table variable definition
static TABLE_VARIABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bDECLARE\s+(@\w+)\s+(?:AS\s+)?TABLE\b").unwrap());

/// `EXEC (` / `EXECUTE (` command string execution
static EXEC_STRING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bEXEC(?:UTE)?\s*\(").unwrap());

/// Session options with no lineage meaning
static SESSION_OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bSET\s+(?:NOCOUNT|XACT_ABORT|ANSI_NULLS|QUOTED_IDENTIFIER|ANSI_WARNINGS|ANSI_PADDING|ARITHABORT|CONCAT_NULL_YIELDS_NULL)\s+(?:ON|OFF)\b\s*;?",
    )
    .unwrap()
});

/// `CREATE OR ALTER VIEW` / `ALTER VIEW`
static ALTER_VIEW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:CREATE\s+OR\s+ALTER|ALTER)\s+VIEW\b").unwrap());

/// One GO-separated batch of the input text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a> {
    pub text: &'a str,

    /// Lines of the input preceding this batch
    pub line_offset: usize,
}

/// Routine wrapper recognized and removed from a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineHeader {
    pub kind: ObjectKind,

    /// Name as written, brackets included
    pub name: String,

    /// 1-indexed line within the batch
    pub line: usize,
}

/// Parser-ready batch text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedBatch {
    pub text: String,
    pub header: Option<RoutineHeader>,
}

/// Split on `GO` separator lines; blank batches are dropped
pub fn split_batches(source: &str) -> Vec<Batch<'_>> {
    let mut batches = Vec::new();
    let mut start = 0;
    let mut start_line = 0;
    let mut offset = 0;

    for (i, line) in source.split_inclusive('\n').enumerate() {
        if GO_RE.is_match(line.trim_end_matches(['\r', '\n'])) {
            push_batch(&mut batches, &source[start..offset], start_line);
            start = offset + line.len();
            start_line = i + 1;
        }
        offset += line.len();
    }
    push_batch(&mut batches, &source[start..], start_line);

    batches
}

fn push_batch<'a>(batches: &mut Vec<Batch<'a>>, text: &'a str, line_offset: usize) {
    if !text.trim().is_empty() {
        batches.push(Batch { text, line_offset });
    }
}

/// Rewrite one batch into something the parser accepts
pub fn normalize_batch(text: &str) -> NormalizedBatch {
    let masked = mask_literals_and_comments(text);
    let mut edits = Vec::new();

    let (header, body_start) = match strip_routine_header(text, &masked, &mut edits) {
        Some((header, body_start)) => (Some(header), body_start),
        None => (None, 0),
    };
    strip_control_flow(text, &masked, body_start, &mut edits);

    for m in TABLE_VARIABLE_RE.captures_iter(&masked) {
        let (Some(whole), Some(var)) = (m.get(0), m.get(1)) else {
            continue;
        };
        edits.push(Edit::replace(text, whole.range(), format!("CREATE TABLE {}", var.as_str())));
    }

    for m in EXEC_STRING_RE.find_iter(&masked) {
        edits.push(Edit::replace(text, m.range(), format!("EXEC {} (", EXEC_STRING_TARGET)));
    }

    for m in SESSION_OPTION_RE.find_iter(&masked) {
        edits.push(Edit::blank(text, m.range()));
    }

    for m in ALTER_VIEW_RE.find_iter(&masked) {
        edits.push(Edit::replace(text, m.range(), "CREATE VIEW".to_string()));
    }

    NormalizedBatch {
        text: apply_edits(text, edits),
        header,
    }
}

/// Blank `CREATE PROCEDURE ... AS` and an outer `BEGIN ... END` around the body;
/// returns the header and the offset where the body starts
fn strip_routine_header(text: &str, masked: &str, edits: &mut Vec<Edit>) -> Option<(RoutineHeader, usize)> {
    let caps = ROUTINE_HEADER_RE.captures(masked)?;
    let named = caps.get(0)?;
    let opening = body_as(masked, named.end())?;
    let whole = named.start()..opening.end;
    let kind = match caps.get(1)?.as_str().to_ascii_uppercase().as_str() {
        "FUNCTION" => ObjectKind::Function,
        "TRIGGER" => ObjectKind::Trigger,
        _ => ObjectKind::Procedure,
    };
    let name = caps.get(2)?.as_str().to_string();
    let line = masked[..whole.start].matches('\n').count() + 1;

    edits.push(Edit::blank(text, whole.clone()));

    let body = whole.end..masked.len();
    if let Some((begin, end)) = outer_block(masked, body.clone()) {
        edits.push(Edit::blank(text, begin));
        edits.push(Edit::blank(text, end));
    } else if kind == ObjectKind::Function {
        // inline table-valued function: AS RETURN (SELECT ...)
        if let Some(ret) = leading_word(masked, body.start, "RETURN") {
            edits.push(Edit::blank(text, ret));
        }
    }

    Some((RoutineHeader { kind, name, line }, whole.end))
}

/// The AS opening a routine body: outside parentheses, not a parameter type
/// (`@p AS INT`) and not an `EXECUTE AS` option
fn body_as(masked: &str, from: usize) -> Option<Range<usize>> {
    let mut depth = 0usize;
    let mut previous = String::new();
    for m in TOKEN_RE.find_iter(&masked[from..]) {
        let word = m.as_str().to_ascii_uppercase();
        match word.as_str() {
            "(" => depth += 1,
            ")" => depth = depth.saturating_sub(1),
            "AS" if depth == 0
                && !previous.starts_with('@')
                && !matches!(previous.as_str(), "EXECUTE" | "EXEC") =>
            {
                return Some(from + m.start()..from + m.end());
            }
            _ => {}
        }
        previous = word;
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Case,
    Block,
}

/// Blank IF / ELSE / WHILE, `BEGIN ... END` blocks and TRY / CATCH so the
/// statements inside parse on their own. Conditions are dropped, not analyzed,
/// and so are THROW, RAISERROR and PRINT, which move no data.
fn strip_control_flow(text: &str, masked: &str, from: usize, edits: &mut Vec<Edit>) {
    let bytes = masked.as_bytes();
    let tokens: Vec<(Range<usize>, String)> = TOKEN_RE
        .find_iter(&masked[from..])
        // `[End]`, `t.Case` and `"If"` are identifiers
        .filter(|m| from + m.start() == 0 || !matches!(bytes[from + m.start() - 1], b'[' | b'.' | b'"'))
        .map(|m| (from + m.start()..from + m.end(), m.as_str().to_ascii_uppercase()))
        .collect();
    let word = |i: usize| tokens.get(i).map_or("", |(_, w)| w.as_str());

    let mut frames = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let start = tokens[i].0.start;
        match word(i) {
            "CASE" => frames.push(Frame::Case),
            "BEGIN" if TRANSACTION_WORDS.contains(&word(i + 1)) => {}
            "BEGIN" => {
                frames.push(Frame::Block);
                if matches!(word(i + 1), "TRY" | "CATCH") {
                    i += 1;
                }
                edits.push(Edit::separator(text, start..tokens[i].0.end));
            }
            "END" => {
                let frame = frames.pop();
                let tail = matches!(word(i + 1), "TRY" | "CATCH");
                if frame == Some(Frame::Block) || (frame.is_none() && tail) {
                    if tail {
                        i += 1;
                    }
                    edits.push(Edit::separator(text, start..tokens[i].0.end));
                }
            }
            "ELSE" if frames.last() != Some(&Frame::Case) => {
                edits.push(Edit::separator(text, tokens[i].0.clone()));
            }
            "BREAK" | "CONTINUE" => edits.push(Edit::separator(text, tokens[i].0.clone())),
            "RETURN" => {
                let value = word(i + 1);
                if value.starts_with('@') || value.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                    i += 1;
                }
                edits.push(Edit::separator(text, start..tokens[i].0.end));
            }
            "IF" if i > 0 && DROP_TARGETS.contains(&word(i - 1)) => {}
            "IF" | "WHILE" | "THROW" | "RAISERROR" | "PRINT" => {
                // a condition has at least one token; THROW may have none
                let end = match word(i) {
                    "IF" | "WHILE" => condition_end(&tokens, i + 1),
                    _ => condition_end(&tokens, i),
                };
                let stop = tokens.get(end).map_or(masked.len(), |(range, _)| range.start);
                edits.push(Edit::separator(text, start..stop));
                i = end;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
}

/// Index of the next token at nesting level zero that opens a statement
fn condition_end(tokens: &[(Range<usize>, String)], start: usize) -> usize {
    let mut parens = 0usize;
    let mut cases = 0usize;
    for (j, (_, word)) in tokens.iter().enumerate().skip(start) {
        match word.as_str() {
            "(" => parens += 1,
            ")" => parens = parens.saturating_sub(1),
            ";" if parens == 0 => return j,
            "CASE" => cases += 1,
            "END" if cases > 0 => cases -= 1,
            // `IF UPDATE(col)` in triggers is a function call
            "UPDATE" if tokens.get(j + 1).is_some_and(|(_, next)| next == "(") => {}
            keyword if j > start && parens == 0 && cases == 0 && STATEMENT_KEYWORDS.contains(&keyword) => {
                return j;
            }
            _ => {}
        }
    }
    tokens.len()
}

/// Ranges of a `BEGIN` opening the body and the `END` closing it
fn outer_block(masked: &str, body: Range<usize>) -> Option<(Range<usize>, Range<usize>)> {
    let begin = leading_word(masked, body.start, "BEGIN")?;

    let rest = masked[begin.end..].trim_start();
    let next = rest
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .next()
        .unwrap_or("")
        .to_ascii_uppercase();
    if matches!(next.as_str(), "TRAN" | "TRANSACTION" | "DISTRIBUTED" | "TRY") {
        return None;
    }

    let trimmed = masked[..body.end].trim_end_matches(|c: char| c.is_whitespace() || c == ';');
    if trimmed.len() < 3 || !trimmed[trimmed.len() - 3..].eq_ignore_ascii_case("END") {
        return None;
    }
    let end_start = trimmed.len() - 3;
    let preceded_by_word = trimmed[..end_start]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || c == '_');
    if preceded_by_word || end_start < begin.end {
        return None;
    }

    Some((begin, end_start..trimmed.len()))
}

/// Range of `word` if it is the first token at or after `from`
fn leading_word(masked: &str, from: usize, word: &str) -> Option<Range<usize>> {
    let rest = &masked[from..];
    let start = from + (rest.len() - rest.trim_start().len());
    let end = start + word.len();
    let candidate = masked.get(start..end)?;
    let boundary = masked[end..]
        .chars()
        .next()
        .map_or(true, |c| !c.is_alphanumeric() && c != '_');
    (candidate.eq_ignore_ascii_case(word) && boundary).then_some(start..end)
}

/// Same-length copy of `text` with comments and string literals turned into
/// spaces (newlines kept), so patterns only ever match real code.
fn mask_literals_and_comments(text: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Literal,
    }

    let bytes = text.as_bytes();
    let mut out = bytes.to_vec();
    let mut state = State::Code;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            State::Code => match (b, next) {
                (b'-', Some(b'-')) => {
                    state = State::LineComment;
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 1;
                }
                (b'/', Some(b'*')) => {
                    state = State::BlockComment;
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 1;
                }
                (b'\'', _) => state = State::Literal,
                _ => {}
            },
            State::LineComment => {
                if b == b'\n' {
                    state = State::Code;
                } else {
                    out[i] = b' ';
                }
            }
            State::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 1;
                    state = State::Code;
                } else if b != b'\n' {
                    out[i] = b' ';
                }
            }
            State::Literal => {
                if b == b'\'' {
                    if next == Some(b'\'') {
                        out[i] = b' ';
                        out[i + 1] = b' ';
                        i += 1;
                    } else {
                        state = State::Code;
                    }
                } else if b != b'\n' {
                    out[i] = b' ';
                }
            }
        }
        i += 1;
    }

    // every replaced byte is ASCII and whole characters were replaced
    String::from_utf8(out).unwrap_or_else(|_| text.to_string())
}

/// A pending text replacement
#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    range: Range<usize>,
    replacement: String,
}

impl Edit {
    /// Replace with `replacement`, padded with the newlines of the original span
    fn replace(text: &str, range: Range<usize>, mut replacement: String) -> Self {
        let newlines = text[range.clone()].matches('\n').count();
        for _ in 0..newlines {
            replacement.push('\n');
        }
        Self { range, replacement }
    }

    fn blank(text: &str, range: Range<usize>) -> Self {
        let replacement = text[range.clone()]
            .chars()
            .map(|c| if c == '\n' { '\n' } else { ' ' })
            .collect();
        Self { range, replacement }
    }

    /// Blank, keeping a `;` in the first byte to separate the statements around it
    fn separator(text: &str, range: Range<usize>) -> Self {
        let mut edit = Self::blank(text, range);
        if edit.replacement.starts_with(' ') {
            edit.replacement.replace_range(0..1, ";");
        }
        edit
    }
}

/// Apply non-overlapping edits; an edit overlapping an earlier one is dropped
fn apply_edits(text: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| (e.range.start, e.range.end));

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for edit in edits {
        if edit.range.start < cursor {
            continue;
        }
        out.push_str(&text[cursor..edit.range.start]);
        out.push_str(&edit.replacement);
        cursor = edit.range.end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line_count(s: &str) -> usize {
        s.matches('\n').count()
    }

    #[test]
    fn test_split_batches() {
        let sql = "CREATE TABLE t1 (id INT);\nGO\nCREATE TABLE t2 (id INT);\ngo 2\nSELECT 1;";
        let batches = split_batches(sql);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].line_offset, 0);
        assert_eq!(batches[1].line_offset, 2);
        assert_eq!(batches[2].line_offset, 4);
        assert_eq!(batches[2].text, "SELECT 1;");
    }

    #[test]
    fn test_split_batches_no_go() {
        let sql = "SELECT category, good FROM dbo.t;";
        let batches = split_batches(sql);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].text, sql);
    }

    #[test]
    fn test_blank_batches_dropped() {
        let batches = split_batches("GO\n\nGO\nSELECT 1;\n");
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].line_offset, 3);
    }

    #[test]
    fn test_procedure_header_stripped() {
        let sql = "CREATE PROCEDURE [dbo].[usp_Load]\n    @since DATE\nAS\nBEGIN\n    INSERT INTO dbo.T (a) SELECT a FROM dbo.S;\nEND\n";
        let batch = normalize_batch(sql);

        let header = batch.header.unwrap();
        assert_eq!(header.kind, ObjectKind::Procedure);
        assert_eq!(header.name, "[dbo].[usp_Load]");
        assert_eq!(header.line, 1);

        assert_eq!(batch.text.trim(), "INSERT INTO dbo.T (a) SELECT a FROM dbo.S;");
        assert_eq!(line_count(&batch.text), line_count(sql));
        assert_eq!(batch.text.lines().nth(4).unwrap().trim(), "INSERT INTO dbo.T (a) SELECT a FROM dbo.S;");
    }

    #[test]
    fn test_create_or_alter_proc_without_block() {
        let batch = normalize_batch("CREATE OR ALTER PROC p AS SELECT 1;");
        assert_eq!(batch.header.unwrap().name, "p");
        assert_eq!(batch.text.trim(), "SELECT 1;");
    }

    #[test]
    fn test_begin_transaction_is_not_outer_block() {
        let batch = normalize_batch("CREATE PROC p AS BEGIN TRANSACTION; SELECT 1; COMMIT;");
        assert!(batch.text.contains("BEGIN TRANSACTION"));
    }

    #[test]
    fn test_inline_function_return_blanked() {
        let batch = normalize_batch("CREATE FUNCTION dbo.f() RETURNS TABLE AS RETURN (SELECT a FROM dbo.S);");
        assert_eq!(batch.header.unwrap().kind, ObjectKind::Function);
        assert_eq!(batch.text.trim(), "(SELECT a FROM dbo.S);");
    }

    #[test]
    fn test_table_variable_rewrite() {
        let batch = normalize_batch("DECLARE @rows TABLE (id INT, name NVARCHAR(50));");
        assert_eq!(batch.text, "CREATE TABLE @rows (id INT, name NVARCHAR(50));");
    }

    #[test]
    fn test_exec_string_rewrite() {
        let batch = normalize_batch("EXEC (@sql);\nEXECUTE\n('SELECT 1');");
        assert!(batch.text.starts_with("EXEC __exec_string (@sql);"));
        assert_eq!(line_count(&batch.text), 2);
    }

    #[test]
    fn test_session_options_blanked() {
        let batch = normalize_batch("SET NOCOUNT ON;\nSET XACT_ABORT OFF\nSELECT 1;");
        assert_eq!(batch.text.trim(), "SELECT 1;");
        assert_eq!(line_count(&batch.text), 2);
    }

    #[test]
    fn test_rewrites_skip_literals_and_comments() {
        let sql = "-- CREATE PROCEDURE fake AS\nSET @sql = N'EXEC (''x'')';";
        let batch = normalize_batch(sql);
        assert!(batch.header.is_none());
        assert_eq!(batch.text, sql);
    }

    #[test]
    fn test_parameter_as_type_is_not_body() {
        let sql = "CREATE PROCEDURE dbo.usp_Load\n    @since AS DATE,\n    @limit AS INT = 10\nAS\nBEGIN\n    INSERT INTO dbo.T (a) SELECT a FROM dbo.S;\nEND";
        let batch = normalize_batch(sql);

        let header = batch.header.unwrap();
        assert_eq!(header.name, "dbo.usp_Load");
        assert_eq!(batch.text.trim(), "INSERT INTO dbo.T (a) SELECT a FROM dbo.S;");
        assert_eq!(line_count(&batch.text), line_count(sql));
    }

    #[test]
    fn test_execute_as_option_is_not_body() {
        let sql = "CREATE PROCEDURE dbo.p @p INT\nWITH EXECUTE AS OWNER\nAS\nSELECT a FROM dbo.S;";
        let batch = normalize_batch(sql);
        assert_eq!(batch.header.unwrap().name, "dbo.p");
        assert_eq!(batch.text.trim(), "SELECT a FROM dbo.S;");
        assert_eq!(batch.text.lines().nth(3).unwrap(), "SELECT a FROM dbo.S;");

        let quoted = normalize_batch("CREATE PROC dbo.p WITH EXECUTE AS 'etl' AS SELECT 1;");
        assert_eq!(quoted.text.trim(), "SELECT 1;");
    }

    #[test]
    fn test_if_else_blocks_blanked() {
        let sql = "\
IF @mode = 1 AND EXISTS (SELECT 1 FROM dbo.S)
BEGIN
    INSERT INTO dbo.T (a) SELECT a FROM dbo.S;
END
ELSE
    UPDATE dbo.T SET a = 0;";
        let batch = normalize_batch(sql);

        assert_eq!(line_count(&batch.text), line_count(sql));
        let lines: Vec<_> = batch.text.lines().map(str::trim).collect();
        assert_eq!(lines[0], ";");
        assert_eq!(lines[1], ";");
        assert_eq!(lines[2], "INSERT INTO dbo.T (a) SELECT a FROM dbo.S;");
        assert_eq!(lines[3], ";");
        assert_eq!(lines[4], ";");
        assert_eq!(lines[5], "UPDATE dbo.T SET a = 0;");
    }

    #[test]
    fn test_while_and_try_catch_blanked() {
        let sql = "\
BEGIN TRY
    WHILE @i < 10
    BEGIN
        INSERT INTO dbo.T (a) SELECT a FROM dbo.S;
        IF @i > 5 BREAK
    END
END TRY
BEGIN CATCH
    THROW;
END CATCH";
        let batch = normalize_batch(sql);

        assert_eq!(line_count(&batch.text), line_count(sql));
        let code: Vec<_> = batch
            .text
            .lines()
            .map(str::trim)
            .filter(|l| !l.chars().all(|c| c == ';' || c == ' '))
            .collect();
        assert_eq!(code, vec!["INSERT INTO dbo.T (a) SELECT a FROM dbo.S;"]);
    }

    #[test]
    fn test_case_and_drop_if_exists_untouched() {
        let sql = "DROP TABLE IF EXISTS #t;\nSELECT CASE WHEN a > 0 THEN 1 ELSE 0 END AS [End] FROM dbo.S;";
        let batch = normalize_batch(sql);
        assert_eq!(batch.text, sql);
    }

    #[test]
    fn test_alter_view_rewrite() {
        let batch = normalize_batch("CREATE OR ALTER VIEW dbo.v AS SELECT 1 AS one;");
        assert_eq!(batch.text, "CREATE VIEW dbo.v AS SELECT 1 AS one;");
    }
}
