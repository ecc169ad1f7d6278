//! Concurrent driver over many routines
//!
//! Each routine is a single synchronous tree walk, so it runs on the
//! blocking pool. A semaphore bounds how many run at once; permits are
//! taken in input order, which is also the order routines start in.

use proclineage_core::{
    source_fingerprint, Diagnostic, DiagnosticCode, ExtractionResult, LineageReport, ObjectKind,
};
use proclineage_sql::{CancelToken, LineageExtractor};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One routine to extract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineInput {
    pub name: String,
    pub kind: ObjectKind,
    pub sql: String,
}

impl RoutineInput {
    pub fn new(name: impl Into<String>, kind: ObjectKind, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            sql: sql.into(),
        }
    }
}

/// Errors from the batch driver itself; extraction never fails
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("extraction task for {routine} did not complete: {message}")]
    TaskFailed { routine: String, message: String },

    #[error("worker pool closed before {routine} could start")]
    PoolClosed { routine: String },
}

enum Pending {
    Running(String, JoinHandle<ExtractionResult>),
    Skipped(ExtractionResult),
}

/// Runs a [`LineageExtractor`] over a batch of routines
pub struct BatchExtractor {
    extractor: Arc<LineageExtractor>,
    max_parallel: usize,
}

impl BatchExtractor {
    /// Parallelism comes from the extractor's `batch.max_parallel`
    pub fn new(extractor: Arc<LineageExtractor>) -> Self {
        let max_parallel = extractor.config().batch.max_parallel.max(1);
        Self {
            extractor,
            max_parallel,
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Extract every routine and collect the results in input order
    ///
    /// Once `cancel` fires, routines already running stop at their next
    /// statement and the rest are reported as skipped.
    pub async fn run(&self, routines: Vec<RoutineInput>, cancel: &CancelToken) -> Result<LineageReport, BatchError> {
        let started = Instant::now();
        let total = routines.len();
        info!(routines = total, max_parallel = self.max_parallel, "batch extraction started");

        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut pending = Vec::with_capacity(total);

        for routine in routines {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| BatchError::PoolClosed {
                    routine: routine.name.clone(),
                })?;

            if cancel.is_cancelled() {
                drop(permit);
                pending.push(Pending::Skipped(skipped(routine)));
                continue;
            }

            debug!(routine = %routine.name, "routine scheduled");
            let extractor = Arc::clone(&self.extractor);
            let token = cancel.clone();
            let name = routine.name.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                extractor.extract_cancellable(&routine.sql, &routine.name, routine.kind, &token)
            });
            pending.push(Pending::Running(name, handle));
        }

        let mut results = Vec::with_capacity(total);
        for entry in pending {
            let result = match entry {
                Pending::Skipped(result) => result,
                Pending::Running(routine, handle) => handle.await.map_err(|e| BatchError::TaskFailed {
                    routine,
                    message: e.to_string(),
                })?,
            };
            if result.has_parse_errors() {
                warn!(routine = %result.object_name, "routine failed to parse");
            }
            results.push(result);
        }

        let report = LineageReport::from_results(results);
        info!(
            routines = report.summary.routines,
            edges = report.summary.edges,
            parse_failures = report.summary.parse_failures,
            cancelled = report.summary.cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch extraction finished"
        );
        Ok(report)
    }
}

/// Result for a routine that never started
fn skipped(routine: RoutineInput) -> ExtractionResult {
    let mut result = ExtractionResult::empty(&routine.name, routine.kind);
    result.warnings.push(Diagnostic::warn(
        DiagnosticCode::LineageCancelled,
        "extraction cancelled before the routine started",
    ));
    result.source_hash = source_fingerprint(&routine.sql);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proclineage_catalog::CatalogSnapshot;
    use proclineage_core::Config;

    fn extractor() -> Arc<LineageExtractor> {
        let catalog = CatalogSnapshot::new()
            .with_table("dbo", "S", ["a", "b"])
            .with_table("dbo", "T", ["a", "b"]);
        Arc::new(LineageExtractor::new(Arc::new(catalog)))
    }

    fn routines(n: usize) -> Vec<RoutineInput> {
        (0..n)
            .map(|i| {
                RoutineInput::new(
                    format!("dbo.usp_{}", i),
                    ObjectKind::Procedure,
                    "INSERT INTO dbo.T (a, b) SELECT a, b FROM dbo.S",
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn results_keep_input_order() {
        let batch = BatchExtractor::new(extractor()).with_max_parallel(3);
        let report = batch.run(routines(12), &CancelToken::new()).await.unwrap();

        let names: Vec<_> = report.results.iter().map(|r| r.object_name.clone()).collect();
        let expected: Vec<_> = (0..12).map(|i| format!("dbo.usp_{}", i)).collect();
        assert_eq!(names, expected);
        assert_eq!(report.summary.edges, 24);
        assert_eq!(report.summary.mean_confidence, 1.0);
    }

    #[tokio::test]
    async fn cancelled_batch_skips_everything() {
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = BatchExtractor::new(extractor())
            .run(routines(4), &cancel)
            .await
            .unwrap();

        assert_eq!(report.summary.routines, 4);
        assert_eq!(report.summary.cancelled, 4);
        assert_eq!(report.summary.edges, 0);
        assert!(report.results.iter().all(|r| !r.source_hash.is_empty()));
    }

    #[tokio::test]
    async fn parse_failures_are_counted() {
        let mut inputs = routines(2);
        inputs.push(RoutineInput::new("dbo.broken", ObjectKind::Procedure, "SELECT a FROM dbo.S WHERE;"));

        let report = BatchExtractor::new(extractor())
            .run(inputs, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(report.summary.parse_failures, 1);
        assert!(report.has_parse_failures());
        assert_eq!(report.results[2].overall_confidence, 0.0);
    }

    #[test]
    fn parallelism_follows_config() {
        let mut config = Config::default();
        config.batch.max_parallel = 0;
        let extractor = LineageExtractor::new(Arc::new(CatalogSnapshot::new())).with_config(config);
        assert_eq!(BatchExtractor::new(Arc::new(extractor)).max_parallel(), 1);
    }
}
