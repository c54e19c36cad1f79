//! A metrics recorder that periodically logs all captured metrics.

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use metrics_util::registry::{AtomicStorage, Registry};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A metrics recorder that periodically logs all captured metrics to `tracing::info!`.
pub struct LoggingRecorder {
    registry: Arc<Registry<Key, AtomicStorage>>,
}

impl LoggingRecorder {
    /// Creates a new `LoggingRecorder` and starts a background task to log metrics.
    ///
    /// A final snapshot is logged when `shutdown_rx` changes or closes.
    ///
    /// # Arguments
    /// * `aggregation_interval` - The interval at which to log the metrics.
    pub fn new(
        aggregation_interval: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let registry = Arc::new(Registry::new(AtomicStorage));
        let recorder = Self {
            registry: registry.clone(),
        };

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(aggregation_interval);
            // The first tick fires immediately; skip it so the first snapshot has data.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tracing::debug!("--- Metrics Snapshot ---");
                        for line in snapshot(&registry) {
                            tracing::info!("{}", line);
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!("--- Final Metrics Snapshot ---");
                        for line in snapshot(&registry) {
                            tracing::info!("{}", line);
                        }
                        break;
                    }
                }
            }
        });

        (recorder, handle)
    }
}

/// Renders every counter, gauge and histogram as one sorted line each.
fn snapshot(registry: &Registry<Key, AtomicStorage>) -> Vec<String> {
    let counters = registry.get_counter_handles().into_iter().map(|(key, counter)| {
        format!("[Counter] {}: {}", render_key(&key), counter.load(Ordering::Relaxed))
    });
    let gauges = registry.get_gauge_handles().into_iter().map(|(key, gauge)| {
        let value = f64::from_bits(gauge.load(Ordering::Relaxed));
        format!("[Gauge] {}: {}", render_key(&key), value)
    });
    let histograms = registry.get_histogram_handles().into_iter().map(|(key, bucket)| {
        // Each snapshot covers the samples recorded since the previous one.
        let (mut count, mut sum) = (0usize, 0.0f64);
        bucket.clear_with(|block| {
            count += block.len();
            sum += block.iter().sum::<f64>();
        });
        let mean = if count == 0 { 0.0 } else { sum / count as f64 };
        format!(
            "[Histogram] {}: count={} mean={:.4}",
            render_key(&key),
            count,
            mean
        )
    });

    let mut lines: Vec<String> = counters.chain(gauges).chain(histograms).collect();
    lines.sort();
    lines
}

fn render_key(key: &Key) -> String {
    let labels: Vec<String> = key
        .labels()
        .map(|label| format!("{}={}", label.key(), label.value()))
        .collect();
    if labels.is_empty() {
        key.name().to_string()
    } else {
        format!("{}{{{}}}", key.name(), labels.join(","))
    }
}

impl Recorder for LoggingRecorder {
    // Descriptions are registered for exporters; snapshots only need values.
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        self.registry.get_or_create_counter(key, |c| c.clone().into())
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        self.registry.get_or_create_gauge(key, |g| g.clone().into())
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        self.registry.get_or_create_histogram(key, |h| h.clone().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::{Key, Label, Recorder};

    fn metadata() -> Metadata<'static> {
        Metadata::new("test", metrics::Level::INFO, Some("test"))
    }

    #[tokio::test]
    async fn snapshot_lists_every_metric_kind() {
        let (tx, rx) = watch::channel(false);
        let (recorder, handle) = LoggingRecorder::new(Duration::from_secs(60), rx);

        let counter_key = Key::from_parts(
            "batch_tasks_total",
            vec![Label::new("outcome", "succeeded")],
        );
        recorder.register_counter(&counter_key, &metadata()).increment(3);
        recorder
            .register_gauge(&Key::from_name("batch_round_size"), &metadata())
            .set(7.0);
        let histogram = recorder.register_histogram(&Key::from_name("dns_query_duration_seconds"), &metadata());
        histogram.record(0.5);
        histogram.record(1.5);

        let lines = snapshot(&recorder.registry);
        assert_eq!(
            lines,
            vec![
                "[Counter] batch_tasks_total{outcome=succeeded}: 3".to_string(),
                "[Gauge] batch_round_size: 7".to_string(),
                "[Histogram] dns_query_duration_seconds: count=2 mean=1.0000".to_string(),
            ]
        );

        histogram.record(4.0);
        let lines = snapshot(&recorder.registry);
        assert_eq!(lines[2], "[Histogram] dns_query_duration_seconds: count=1 mean=4.0000");
        let lines = snapshot(&recorder.registry);
        assert_eq!(lines[2], "[Histogram] dns_query_duration_seconds: count=0 mean=0.0000");

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("recorder task should stop on shutdown")
            .unwrap();
    }
}
