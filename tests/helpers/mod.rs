//! Common fixtures for integration tests.

#![allow(dead_code)]

pub mod test_metrics;

use digger::{
    config::Config,
    core::{DnsRecord, RecordType},
    engine::RunHandle,
    query::test_utils::FakeQueryExecutor,
    Engine, Task,
};
use std::{sync::Arc, time::Duration};

/// Configuration with the pauses shortened so runs finish quickly.
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.batch.sequential_yield = Duration::from_millis(1);
    config.comparison.yield_between = Duration::from_millis(1);
    config
}

pub fn engine_with(fake: Arc<FakeQueryExecutor>) -> Engine {
    Engine::new(fake, fast_config())
}

pub fn tasks(count: usize) -> Vec<Task> {
    (0..count)
        .map(|i| Task::new(format!("host{i}.example.com"), RecordType::A, None))
        .collect()
}

pub fn record(record_type: RecordType, value: &str) -> DnsRecord {
    DnsRecord::new("example.com", 300, record_type, value)
}

/// Reads every event until the run closes its channel, then returns the
/// events together with the run's result.
pub async fn collect<E, R>(mut handle: RunHandle<E, R>) -> (Vec<E>, R) {
    let mut events = Vec::new();
    while let Some(event) = handle.events.recv().await {
        events.push(event);
    }
    let result = handle.wait().await.expect("run task panicked");
    (events, result)
}
