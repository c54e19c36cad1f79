//! # Internal Metrics Module
//!
//! Metric names used by the engine and their descriptions. The engine only
//! talks to the `metrics` facade; whether anything is recorded depends on the
//! recorder the host installs (see [`logging_recorder::LoggingRecorder`]).

pub mod logging_recorder;

use metrics::Unit;

/// Registers descriptions for every metric the engine emits.
pub fn describe_metrics() {
    metrics::describe_counter!("dns_queries_total", Unit::Count, "Total number of DNS queries performed, labeled by their status.");
    metrics::describe_histogram!("dns_query_duration_seconds", Unit::Seconds, "A histogram of the latency for DNS queries.");
    metrics::describe_counter!("batch_runs_total", Unit::Count, "Total number of batch runs, labeled by how they ended.");
    metrics::describe_counter!("batch_tasks_total", Unit::Count, "Total number of batch tasks completed, labeled by outcome.");
    metrics::describe_gauge!("batch_round_size", Unit::Count, "The current adaptive round size of the running concurrent batch.");
    metrics::describe_counter!("comparison_runs_total", Unit::Count, "Total number of comparison runs, labeled by how they ended.");
    metrics::describe_counter!("import_entries_skipped_total", Unit::Count, "Total number of bulk import lines skipped as malformed.");
}
