//! Benchmarks for lineage extraction on wide and deep routines
//!
//! Long UNION ALL chains and many-way joins are the shapes that stress the
//! traversal; both should scale linearly.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use proclineage_catalog::CatalogSnapshot;
use proclineage_core::ObjectKind;
use proclineage_sql::LineageExtractor;
use std::sync::Arc;

/// Catalog with `num_tables` tables of `num_columns` columns each
fn generate_catalog(num_tables: usize, num_columns: usize) -> CatalogSnapshot {
    let columns: Vec<String> = (0..num_columns).map(|i| format!("col_{}", i)).collect();
    let mut snapshot = CatalogSnapshot::new().with_table("dbo", "target", columns.clone());
    for t in 0..num_tables {
        snapshot = snapshot.with_table("dbo", &format!("src_{}", t), columns.clone());
    }
    snapshot
}

/// `INSERT ... SELECT ... UNION ALL SELECT ...` with one branch per table
fn generate_union_sql(branches: usize, num_columns: usize) -> String {
    let select_list = (0..num_columns)
        .map(|i| format!("col_{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let body = (0..branches)
        .map(|t| format!("SELECT {} FROM dbo.src_{}", select_list, t))
        .collect::<Vec<_>>()
        .join("\nUNION ALL\n");
    format!("INSERT INTO dbo.target ({})\n{};", select_list, body)
}

/// One SELECT joining `num_joins` tables, reading one column from each
fn generate_join_sql(num_joins: usize) -> String {
    let mut select_cols = vec!["t0.col_0".to_string()];
    let mut joins = Vec::new();
    for i in 1..=num_joins {
        select_cols.push(format!("t{}.col_{}", i, i % 8));
        joins.push(format!("LEFT JOIN dbo.src_{} t{} ON t0.col_0 = t{}.col_0", i, i, i));
    }
    format!(
        "SELECT\n    {}\nFROM dbo.src_0 t0\n{};",
        select_cols.join(",\n    "),
        joins.join("\n")
    )
}

/// Benchmark: UNION ALL chains (10, 100, 1000 branches)
fn bench_wide_union(c: &mut Criterion) {
    let mut group = c.benchmark_group("wide_union");

    for branches in [10, 100, 1000].iter() {
        let extractor = LineageExtractor::new(Arc::new(generate_catalog(*branches, 8)));
        let sql = generate_union_sql(*branches, 8);

        group.bench_with_input(BenchmarkId::from_parameter(branches), branches, |b, _| {
            b.iter(|| black_box(extractor.extract(&sql, "dbo.usp_Union", ObjectKind::Procedure)));
        });
    }

    group.finish();
}

/// Benchmark: many-way joins (10, 50, 200 tables)
fn bench_many_joins(c: &mut Criterion) {
    let mut group = c.benchmark_group("many_joins");

    for num_joins in [10, 50, 200].iter() {
        let extractor = LineageExtractor::new(Arc::new(generate_catalog(*num_joins + 1, 8)));
        let sql = generate_join_sql(*num_joins);

        group.bench_with_input(BenchmarkId::from_parameter(num_joins), num_joins, |b, _| {
            b.iter(|| black_box(extractor.extract(&sql, "dbo.usp_Join", ObjectKind::Procedure)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_wide_union, bench_many_joins);
criterion_main!(benches);
