//! Run-level confidence score

use proclineage_core::{ConfidenceConfig, Diagnostic, DiagnosticCode, DynamicSqlUsage};

/// `max(0, 1 - penalties)`, rounded to four decimals
pub fn score(config: &ConfidenceConfig, dynamic_sql: &[DynamicSqlUsage], warnings: &[Diagnostic]) -> f64 {
    let count = |code| warnings.iter().filter(|w| w.code == code).count() as f64;

    let penalty = config.dynamic_sql_penalty * dynamic_sql.len() as f64
        + config.unresolved_penalty * count(DiagnosticCode::LineageUnresolvedColumn)
        + config.ambiguous_penalty * count(DiagnosticCode::LineageAmbiguousColumn);

    ((1.0 - penalty).max(0.0) * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proclineage_core::DynamicSqlKind;

    fn usage() -> DynamicSqlUsage {
        DynamicSqlUsage {
            kind: DynamicSqlKind::PreparedStatement,
            line: 1,
            column: 1,
            fragment: String::new(),
        }
    }

    fn warn(code: DiagnosticCode) -> Diagnostic {
        Diagnostic::warn(code, "w")
    }

    #[test]
    fn clean_run_is_one() {
        assert_eq!(score(&ConfidenceConfig::default(), &[], &[]), 1.0);
    }

    #[test]
    fn penalties_add_up() {
        let warnings = vec![
            warn(DiagnosticCode::LineageUnresolvedColumn),
            warn(DiagnosticCode::LineageAmbiguousColumn),
            warn(DiagnosticCode::LineageStarUnexpandable),
        ];
        assert_eq!(score(&ConfidenceConfig::default(), &[usage()], &warnings), 0.82);
    }

    #[test]
    fn floored_at_zero() {
        let usages: Vec<_> = (0..15).map(|_| usage()).collect();
        assert_eq!(score(&ConfidenceConfig::default(), &usages, &[]), 0.0);
    }
}
