//! Detection of constructs that defeat static analysis

use crate::ast::{ExecTarget, Execute, TableRef};
use proclineage_core::{Diagnostic, DiagnosticCode, DynamicSqlKind, DynamicSqlUsage, Location};

const PREPARED_STATEMENT_PROCS: &[&str] = &["sp_executesql", "sp_prepare", "sp_prepexec", "sp_execute"];

/// A detected construct plus the warning that reports it
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub usage: DynamicSqlUsage,
    pub warning: Diagnostic,
}

/// Classify an EXEC statement; ordinary procedure calls yield nothing
pub fn detect_execute(exec: &Execute) -> Option<Detection> {
    let kind = match &exec.target {
        ExecTarget::Procedure(name) => {
            let base = name.base();
            if !PREPARED_STATEMENT_PROCS.iter().any(|p| p.eq_ignore_ascii_case(base)) {
                return None;
            }
            DynamicSqlKind::PreparedStatement
        }
        ExecTarget::Variable(_) | ExecTarget::CommandString => DynamicSqlKind::ExecString,
    };

    Some(detection(
        kind,
        DiagnosticCode::LineageDynamicSql,
        exec.line,
        exec.column,
        &exec.fragment,
    ))
}

/// Classify a FROM-clause table reference
pub fn detect_table_ref(table: &TableRef) -> Option<Detection> {
    match table {
        TableRef::External {
            fragment,
            line,
            column,
            ..
        } => Some(detection(
            DynamicSqlKind::ExternalRowSource,
            DiagnosticCode::LineageExternalRowSource,
            *line,
            *column,
            fragment,
        )),
        _ => None,
    }
}

fn detection(kind: DynamicSqlKind, code: DiagnosticCode, line: usize, column: usize, fragment: &str) -> Detection {
    let location = if column > 0 {
        Location::with_position(line, column)
    } else {
        Location::line(line)
    };
    Detection {
        usage: DynamicSqlUsage {
            kind,
            line,
            column,
            fragment: fragment.to_string(),
        },
        warning: Diagnostic::warn(
            code,
            format!(
                "{} at line {} cannot be statically determined: {}",
                kind, line, fragment
            ),
        )
        .with_location(location),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ObjectName;

    fn exec(target: ExecTarget) -> Execute {
        Execute {
            target,
            fragment: "EXEC x".into(),
            line: 7,
            column: 5,
        }
    }

    #[test]
    fn prepared_statements() {
        for name in ["sp_executesql", "SP_PREPEXEC", "sp_execute"] {
            let found = detect_execute(&exec(ExecTarget::Procedure(ObjectName::new(["sys", name])))).unwrap();
            assert_eq!(found.usage.kind, DynamicSqlKind::PreparedStatement);
            assert_eq!(found.warning.code, DiagnosticCode::LineageDynamicSql);
            assert!(found.warning.message.contains("cannot be statically determined"));
        }
    }

    #[test]
    fn exec_strings() {
        let found = detect_execute(&exec(ExecTarget::CommandString)).unwrap();
        assert_eq!(found.usage.kind, DynamicSqlKind::ExecString);
        assert_eq!(found.usage.line, 7);

        let found = detect_execute(&exec(ExecTarget::Variable("@proc".into()))).unwrap();
        assert_eq!(found.usage.kind, DynamicSqlKind::ExecString);
    }

    #[test]
    fn ordinary_procedure_is_silent() {
        assert!(detect_execute(&exec(ExecTarget::Procedure(ObjectName::new(["dbo", "usp_Refresh"])))).is_none());
    }

    #[test]
    fn external_row_source() {
        let table = TableRef::External {
            function: "OPENQUERY".into(),
            alias: None,
            fragment: "OPENQUERY(srv, 'q')".into(),
            line: 2,
            column: 10,
        };
        let found = detect_table_ref(&table).unwrap();
        assert_eq!(found.usage.kind, DynamicSqlKind::ExternalRowSource);
        assert_eq!(found.warning.code, DiagnosticCode::LineageExternalRowSource);

        let named = TableRef::Named {
            name: ObjectName::new(["t"]),
            alias: None,
        };
        assert!(detect_table_ref(&named).is_none());
    }
}
