//! Adaptive batch execution.
//!
//! A batch is a list of independent [`Task`]s. It runs either one task at a
//! time or in rounds of concurrent queries whose size follows the observed
//! error rate (see [`SchedulerState`]).

pub mod scheduler;
pub mod tuning;

use crate::task::{BatchStats, Task};
use serde::{Deserialize, Serialize};

pub use scheduler::BatchScheduler;
pub use tuning::{SchedulerState, TuningDecision};

/// How the tasks of a batch are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One task at a time, with a short pause after each.
    Sequential,
    /// Adaptive rounds of concurrent tasks.
    #[default]
    Concurrent,
}

/// Notifications emitted while a batch runs.
///
/// Exactly one of `Completed`, `Cancelled` or `Error` ends every run, and it
/// is always the last event on the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Progress { completed: usize, total: usize },
    TaskCompleted(Task),
    RoundStarted { round: usize, size: usize },
    RoundSizeChanged { from: usize, to: usize },
    Completed(Vec<Task>),
    Cancelled,
    Error(String),
}

impl BatchEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchEvent::Completed(_) | BatchEvent::Cancelled | BatchEvent::Error(_)
        )
    }
}

/// How a batch run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed(String),
}

/// Final state of a batch run, returned when the run finishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub status: RunStatus,
    pub total: usize,
    pub completed: usize,
    pub stats: BatchStats,
    pub tasks: Vec<Task>,
}

impl BatchReport {
    pub(crate) fn new(status: RunStatus, tasks: Vec<Task>, completed: usize) -> Self {
        Self {
            status,
            total: tasks.len(),
            completed,
            stats: BatchStats::from_tasks(&tasks),
            tasks,
        }
    }

    /// Report for a run that failed before any task was started.
    pub(crate) fn failed(message: impl Into<String>) -> Self {
        Self::new(RunStatus::Failed(message.into()), Vec::new(), 0)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RunStatus::Cancelled
    }
}
