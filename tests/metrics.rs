//! Metrics emitted while batches and comparisons run.

use digger::{
    core::{QueryStatus, RecordType},
    query::test_utils::FakeQueryExecutor,
    ComparisonRequest, ExecutionMode,
};
use std::sync::Arc;

mod helpers;
use helpers::{collect, engine_with, tasks, test_metrics::TestMetrics};

#[tokio::test]
async fn runs_and_tasks_are_counted() {
    let metrics = TestMetrics::new();
    metrics::set_global_recorder(metrics.clone()).unwrap();

    let fake = Arc::new(FakeQueryExecutor::new());
    fake.add_status_response("host0.example.com", QueryStatus::Timeout);
    let engine = engine_with(fake);

    let handle = engine.start_batch(tasks(4), ExecutionMode::Concurrent).unwrap();
    collect(handle).await;

    assert_eq!(metrics.get_counter("batch_tasks_total"), 4);
    assert_eq!(metrics.get_counter("batch_tasks_total{outcome=succeeded}"), 3);
    assert_eq!(metrics.get_counter("batch_tasks_total{outcome=failed}"), 1);
    assert_eq!(metrics.get_counter("batch_runs_total{outcome=completed}"), 1);

    let text = "example.com\nbad..name\n";
    let handle = engine
        .start_import_batch(
            text.as_bytes().to_vec(),
            text.len() as u64,
            RecordType::A,
            ExecutionMode::Sequential,
        )
        .unwrap();
    collect(handle).await;
    assert_eq!(metrics.get_counter("import_entries_skipped_total"), 1);

    let handle = engine
        .start_comparison(ComparisonRequest::new("example.com", RecordType::A, vec!["8.8.8.8".into()]))
        .unwrap();
    collect(handle).await;
    assert_eq!(metrics.get_counter("comparison_runs_total{outcome=failed}"), 1);
}
