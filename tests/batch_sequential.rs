//! Sequential batch runs driven through the engine.

use digger::{
    core::QueryStatus,
    query::test_utils::FakeQueryExecutor,
    BatchEvent, ExecutionMode, RunStatus, TaskOutcome,
};
use std::sync::Arc;

mod helpers;
use helpers::{collect, engine_with, tasks};

#[tokio::test]
async fn all_tasks_succeed() {
    let fake = Arc::new(FakeQueryExecutor::new());
    let engine = engine_with(fake.clone());

    let handle = engine.start_batch(tasks(3), ExecutionMode::Sequential).unwrap();
    let (events, report) = collect(handle).await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.completed, 3);
    assert_eq!(fake.total_calls(), 3);
    assert!(report.tasks.iter().all(|t| t.is_succeeded()));

    match events.last() {
        Some(BatchEvent::Completed(tasks)) => {
            assert_eq!(tasks.len(), 3);
            assert!(tasks.iter().all(|t| t.is_succeeded()));
        }
        other => panic!("expected Completed as last event, got {other:?}"),
    }
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert_eq!(fake.max_in_flight(), 1);
}

#[tokio::test]
async fn cancellation_leaves_remaining_tasks_pending() {
    let fake = Arc::new(FakeQueryExecutor::new());
    let engine = engine_with(fake.clone());

    let handle = engine.start_batch(tasks(10), ExecutionMode::Sequential).unwrap();
    let token = handle.cancel_token();
    fake.on_call(move |call| {
        if call == 2 {
            token.cancel();
        }
    });
    let (events, report) = collect(handle).await;

    assert!(report.is_cancelled());
    assert_eq!(report.completed, 2);
    assert_eq!(fake.total_calls(), 2);
    assert_eq!(report.tasks.iter().filter(|t| t.is_pending()).count(), 8);
    assert!(report.tasks[..2].iter().all(|t| t.is_succeeded()));

    assert_eq!(events.last(), Some(&BatchEvent::Cancelled));
    assert!(!events.iter().any(|e| matches!(e, BatchEvent::Completed(_))));
    let last_progress = events.iter().rev().find_map(|e| match e {
        BatchEvent::Progress { completed, total } => Some((*completed, *total)),
        _ => None,
    });
    assert_eq!(last_progress, Some((2, 10)));
}

#[tokio::test]
async fn failures_do_not_stop_the_run() {
    let fake = Arc::new(FakeQueryExecutor::new());
    fake.add_status_response("host1.example.com", QueryStatus::NotFound);
    fake.add_error_response("host2.example.com", "connection refused");
    let engine = engine_with(fake.clone());

    let handle = engine.start_batch(tasks(4), ExecutionMode::Sequential).unwrap();
    let (_, report) = collect(handle).await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.completed, 4);
    assert_eq!(report.stats.succeeded, 2);
    assert_eq!(report.stats.failed, 2);
    assert_eq!(
        report.tasks[1].outcome,
        TaskOutcome::Failed("domain not found (NXDOMAIN)".into())
    );
    assert!(matches!(
        &report.tasks[2].outcome,
        TaskOutcome::Failed(reason) if reason.contains("connection refused")
    ));
    assert!(report.tasks[3].is_succeeded());
}

#[tokio::test]
async fn task_events_arrive_in_submission_order() {
    let fake = Arc::new(FakeQueryExecutor::new());
    let engine = engine_with(fake);

    let handle = engine.start_batch(tasks(5), ExecutionMode::Sequential).unwrap();
    let (events, _) = collect(handle).await;

    let domains: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            BatchEvent::TaskCompleted(task) => Some(task.domain.clone()),
            _ => None,
        })
        .collect();
    let expected: Vec<String> = (0..5).map(|i| format!("host{i}.example.com")).collect();
    assert_eq!(domains, expected);
}
