//! Bulk imports handed to the engine.

use digger::{
    core::RecordType, query::test_utils::FakeQueryExecutor, BatchEvent, ExecutionMode,
    ImportError, RunStatus, Task,
};
use std::sync::Arc;

mod helpers;
use helpers::{collect, engine_with};

#[tokio::test]
async fn oversized_input_is_rejected_before_any_query() {
    let fake = Arc::new(FakeQueryExecutor::new());
    let engine = engine_with(fake.clone());
    let data = b"example.com,A\n".to_vec();

    let handle = engine
        .start_import_batch(data, 11 * 1024 * 1024, RecordType::A, ExecutionMode::Concurrent)
        .unwrap();
    let (events, report) = collect(handle).await;

    assert!(matches!(report.status, RunStatus::Failed(_)));
    assert_eq!(fake.total_calls(), 0);
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], BatchEvent::Error(message) if message.contains("limit")));
}

#[tokio::test]
async fn malformed_lines_are_skipped_and_the_rest_run() {
    let fake = Arc::new(FakeQueryExecutor::new());
    let engine = engine_with(fake.clone());
    let text = "example.com,A\ntest.org,MX,8.8.8.8\nbad..domain,A\n";

    let handle = engine
        .start_import_batch(
            text.as_bytes().to_vec(),
            text.len() as u64,
            RecordType::A,
            ExecutionMode::Sequential,
        )
        .unwrap();
    let (events, report) = collect(handle).await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.total, 2);
    assert_eq!(fake.get_call_count("example.com"), 1);
    assert_eq!(fake.get_call_count("test.org"), 1);
    assert_eq!(fake.get_call_count("bad..domain"), 0);

    let mut expected = Task::new("test.org", RecordType::Mx, Some("8.8.8.8".into()));
    expected.outcome = report.tasks[1].outcome.clone();
    assert_eq!(report.tasks[1], expected);
    assert!(matches!(events.last(), Some(BatchEvent::Completed(tasks)) if tasks.len() == 2));
}

#[tokio::test]
async fn input_without_valid_entries_ends_with_error() {
    let fake = Arc::new(FakeQueryExecutor::new());
    let engine = engine_with(fake.clone());
    let text = "# only comments\n\n;rm -rf,A\n";

    let handle = engine
        .start_import_batch(
            text.as_bytes().to_vec(),
            text.len() as u64,
            RecordType::A,
            ExecutionMode::Concurrent,
        )
        .unwrap();
    let (events, report) = collect(handle).await;

    assert_eq!(
        report.status,
        RunStatus::Failed(ImportError::NoValidEntries { skipped: 1 }.to_string())
    );
    assert_eq!(fake.total_calls(), 0);
    assert_eq!(
        events,
        vec![BatchEvent::Error(ImportError::NoValidEntries { skipped: 1 }.to_string())]
    );
}

#[tokio::test]
async fn default_type_applies_to_lines_without_one() {
    let fake = Arc::new(FakeQueryExecutor::new());
    let engine = engine_with(fake);
    let text = "example.com\nexample.net,AAAA\n";

    let handle = engine
        .start_import_batch(
            text.as_bytes().to_vec(),
            text.len() as u64,
            RecordType::Txt,
            ExecutionMode::Sequential,
        )
        .unwrap();
    let (_, report) = collect(handle).await;

    let types: Vec<RecordType> = report.tasks.iter().map(|t| t.record_type).collect();
    assert_eq!(types, vec![RecordType::Txt, RecordType::Aaaa]);
}

#[test]
fn declared_size_is_checked_up_front() {
    let engine = engine_with(Arc::new(FakeQueryExecutor::new()));
    let importer = engine.importer();
    assert!(importer.check_size(10 * 1024 * 1024).is_ok());
    assert_eq!(
        importer.check_size(10 * 1024 * 1024 + 1),
        Err(ImportError::TooLarge {
            size: 10 * 1024 * 1024 + 1,
            max: 10 * 1024 * 1024
        })
    );
}
