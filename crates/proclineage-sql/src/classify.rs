//! Transformation classification
//!
//! Looks only at the outermost node of an expression (after stripping
//! parentheses). A `+` counts as concatenation only when a string literal
//! takes part in the same `+` chain; operand types are never guessed.

use crate::ast::{BinaryOp, Expr};
use proclineage_core::TransformationKind;

const AGGREGATE_FUNCTIONS: &[&str] = &[
    "SUM",
    "COUNT",
    "AVG",
    "MIN",
    "MAX",
    "STDEV",
    "VAR",
    "COUNT_BIG",
    "STDEVP",
    "VARP",
    "GROUPING",
    "CHECKSUM_AGG",
];

const COALESCE_FUNCTIONS: &[&str] = &["COALESCE", "NULLIF", "ISNULL"];

pub fn is_aggregate(name: &str) -> bool {
    AGGREGATE_FUNCTIONS.iter().any(|f| f.eq_ignore_ascii_case(name))
}

pub fn classify(expr: &Expr) -> TransformationKind {
    match expr.unnested() {
        Expr::Column(_) => TransformationKind::Direct,
        Expr::Function { name, .. } if is_aggregate(name) => TransformationKind::Aggregation,
        Expr::Function { name, .. } if COALESCE_FUNCTIONS.iter().any(|f| f.eq_ignore_ascii_case(name)) => {
            TransformationKind::Coalesce
        }
        Expr::Function { .. } | Expr::Cast(_) => TransformationKind::Function,
        Expr::Case { .. } => TransformationKind::CaseExpression,
        Expr::Binary {
            op: BinaryOp::StringConcat,
            ..
        } => TransformationKind::Concatenation,
        e @ Expr::Binary { op: BinaryOp::Plus, .. } if has_string_operand(e) => {
            TransformationKind::Concatenation
        }
        Expr::Binary { op, .. } if op.is_arithmetic() => TransformationKind::Arithmetic,
        Expr::Unary {
            arithmetic: true, ..
        } => TransformationKind::Arithmetic,
        Expr::Binary { .. }
        | Expr::Unary { .. }
        | Expr::Variable(_)
        | Expr::Literal { .. }
        | Expr::Nested(_)
        | Expr::Subquery(_)
        | Expr::Other(_)
        | Expr::Truncated => TransformationKind::Unknown,
    }
}

/// Whether a string literal appears anywhere in a `+` chain
fn has_string_operand(expr: &Expr) -> bool {
    let mut stack = vec![expr];
    while let Some(e) = stack.pop() {
        match e.unnested() {
            Expr::Literal { is_string: true } => return true,
            Expr::Binary {
                op: BinaryOp::Plus,
                left,
                right,
            } => {
                stack.push(left);
                stack.push(right);
            }
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> Expr {
        Expr::Column(vec![name.to_string()])
    }

    fn func(name: &str, args: Vec<Expr>) -> Expr {
        Expr::Function {
            name: name.to_string(),
            args,
        }
    }

    fn plus(left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op: BinaryOp::Plus,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[test]
    fn direct_and_nested_direct() {
        assert_eq!(classify(&col("a")), TransformationKind::Direct);
        assert_eq!(
            classify(&Expr::Nested(Box::new(col("a")))),
            TransformationKind::Direct
        );
    }

    #[test]
    fn functions() {
        assert_eq!(classify(&func("sum", vec![col("a")])), TransformationKind::Aggregation);
        assert_eq!(classify(&func("COUNT_BIG", vec![])), TransformationKind::Aggregation);
        assert_eq!(classify(&func("COALESCE", vec![col("a"), col("b")])), TransformationKind::Coalesce);
        assert_eq!(classify(&func("IsNull", vec![col("a")])), TransformationKind::Coalesce);
        assert_eq!(classify(&func("UPPER", vec![col("a")])), TransformationKind::Function);
        assert_eq!(classify(&Expr::Cast(Box::new(col("a")))), TransformationKind::Function);
    }

    #[test]
    fn outer_node_decides() {
        let nested = func("ROUND", vec![func("SUM", vec![col("a")])]);
        assert_eq!(classify(&nested), TransformationKind::Function);
    }

    #[test]
    fn case_expression() {
        let case = Expr::Case {
            operand: None,
            conditions: vec![col("a")],
            results: vec![col("b")],
            else_result: None,
        };
        assert_eq!(classify(&case), TransformationKind::CaseExpression);
    }

    #[test]
    fn plus_needs_string_evidence_for_concatenation() {
        assert_eq!(classify(&plus(col("a"), col("b"))), TransformationKind::Arithmetic);

        let with_literal = plus(plus(col("first"), Expr::Literal { is_string: true }), col("last"));
        assert_eq!(classify(&with_literal), TransformationKind::Concatenation);

        let concat = Expr::Binary {
            op: BinaryOp::StringConcat,
            left: Box::new(col("a")),
            right: Box::new(col("b")),
        };
        assert_eq!(classify(&concat), TransformationKind::Concatenation);
    }

    #[test]
    fn everything_else_is_unknown() {
        let comparison = Expr::Binary {
            op: BinaryOp::Comparison,
            left: Box::new(col("a")),
            right: Box::new(col("b")),
        };
        assert_eq!(classify(&comparison), TransformationKind::Unknown);
        assert_eq!(classify(&Expr::Literal { is_string: false }), TransformationKind::Unknown);
        assert_eq!(classify(&Expr::Other(vec![col("a")])), TransformationKind::Unknown);
        assert_eq!(
            classify(&Expr::Unary {
                arithmetic: true,
                expr: Box::new(col("a"))
            }),
            TransformationKind::Arithmetic
        );
    }
}
