//! The unit of batch work and the statistics derived from a task list.

use crate::core::{Query, QueryResponse, RecordType};
use serde::{Deserialize, Serialize};

/// Where a task stands. Moves from `Pending` to a terminal state exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum TaskOutcome {
    #[default]
    Pending,
    Succeeded(QueryResponse),
    Failed(String),
}

/// One domain + record type (+ server) lookup in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub domain: String,
    pub record_type: RecordType,
    pub dns_server: Option<String>,
    #[serde(default)]
    pub outcome: TaskOutcome,
}

impl Task {
    pub fn new(domain: impl Into<String>, record_type: RecordType, dns_server: Option<String>) -> Self {
        Self {
            domain: domain.into(),
            record_type,
            dns_server,
            outcome: TaskOutcome::Pending,
        }
    }

    pub fn query(&self) -> Query {
        Query::new(self.domain.clone(), self.record_type).with_server(self.dns_server.clone())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Pending)
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Succeeded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Failed(_))
    }

    pub fn response(&self) -> Option<&QueryResponse> {
        match &self.outcome {
            TaskOutcome::Succeeded(response) => Some(response),
            _ => None,
        }
    }

    /// Records the terminal outcome. Returns `false`, leaving the task
    /// untouched, if an outcome was already recorded.
    pub(crate) fn complete(&mut self, outcome: TaskOutcome) -> bool {
        if !self.is_pending() || matches!(outcome, TaskOutcome::Pending) {
            return false;
        }
        self.outcome = outcome;
        true
    }
}

/// Aggregate counts over a task list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BatchStats {
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub pending: usize,
    /// Mean elapsed time of succeeded tasks, if any succeeded
    pub average_elapsed_ms: Option<f64>,
}

impl BatchStats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let succeeded: Vec<u64> = tasks
            .iter()
            .filter_map(|t| t.response().map(|r| r.elapsed_ms))
            .collect();
        let failed = tasks.iter().filter(|t| t.is_failed()).count();
        let average_elapsed_ms = (!succeeded.is_empty())
            .then(|| succeeded.iter().sum::<u64>() as f64 / succeeded.len() as f64);

        Self {
            total: tasks.len(),
            completed: succeeded.len() + failed,
            succeeded: succeeded.len(),
            failed,
            pending: tasks.iter().filter(|t| t.is_pending()).count(),
            average_elapsed_ms,
        }
    }
}
