use crate::{
    batch::{BatchEvent, BatchReport, ExecutionMode, RunStatus, SchedulerState},
    cancel::CancelToken,
    config::BatchConfig,
    core::{Query, QueryExecutor},
    task::{Task, TaskOutcome},
};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, info, instrument, warn};

/// Drives one batch run from first task to terminal event.
///
/// A scheduler is built per run. It owns the task list for the duration of
/// the run and is the only thing that writes task outcomes.
pub struct BatchScheduler {
    executor: Arc<dyn QueryExecutor>,
    config: BatchConfig,
    events: mpsc::UnboundedSender<BatchEvent>,
    cancel: CancelToken,
}

/// Counters shared by both execution modes.
struct Progress {
    completed: usize,
    total: usize,
}

impl BatchScheduler {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        config: BatchConfig,
        events: mpsc::UnboundedSender<BatchEvent>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            executor,
            config,
            events,
            cancel,
        }
    }

    /// Runs every task, or stops early on cancellation.
    ///
    /// Task failures are recorded on the task and never end the run.
    #[instrument(skip_all, fields(tasks = tasks.len(), ?mode))]
    pub async fn run(self, mut tasks: Vec<Task>, mode: ExecutionMode) -> BatchReport {
        if tasks.is_empty() {
            let message = "no tasks to run".to_string();
            warn!("Batch rejected: {}", message);
            self.emit(BatchEvent::Error(message.clone()));
            return BatchReport::failed(message);
        }

        info!("Batch started.");
        let mut progress = Progress {
            completed: 0,
            total: tasks.len(),
        };

        let cancelled = match mode {
            ExecutionMode::Sequential => self.run_sequential(&mut tasks, &mut progress).await,
            ExecutionMode::Concurrent => self.run_concurrent(&mut tasks, &mut progress).await,
        };

        if cancelled {
            info!(
                completed = progress.completed,
                total = progress.total,
                "Batch cancelled."
            );
            metrics::counter!("batch_runs_total", "outcome" => "cancelled").increment(1);
            self.emit(BatchEvent::Cancelled);
            BatchReport::new(RunStatus::Cancelled, tasks, progress.completed)
        } else {
            info!(total = progress.total, "Batch completed.");
            metrics::counter!("batch_runs_total", "outcome" => "completed").increment(1);
            self.emit(BatchEvent::Completed(tasks.clone()));
            BatchReport::new(RunStatus::Completed, tasks, progress.completed)
        }
    }

    /// Returns `true` if the run stopped because of cancellation.
    async fn run_sequential(&self, tasks: &mut [Task], progress: &mut Progress) -> bool {
        for index in 0..tasks.len() {
            if self.cancel.is_cancelled() {
                return true;
            }
            if index > 0 {
                // Hand the runtime back to the host between tasks.
                tokio::time::sleep(self.config.sequential_yield).await;
                if self.cancel.is_cancelled() {
                    return true;
                }
            }
            let outcome = execute(self.executor.as_ref(), tasks[index].query()).await;
            self.finish_task(&mut tasks[index], outcome, progress);
        }
        false
    }

    /// Returns `true` if the run stopped because of cancellation.
    async fn run_concurrent(&self, tasks: &mut [Task], progress: &mut Progress) -> bool {
        let mut state = SchedulerState::new(&self.config, Instant::now());
        let mut next = 0;
        let mut round = 0;

        while next < tasks.len() {
            if self.cancel.is_cancelled() {
                return true;
            }

            if let Some(decision) = state.tune(Instant::now()) {
                debug!(
                    error_rate = decision.error_rate,
                    size = decision.current,
                    "Tuning step evaluated."
                );
                if decision.changed() {
                    info!(
                        from = decision.previous,
                        to = decision.current,
                        error_rate = decision.error_rate,
                        "Adjusted round size."
                    );
                    self.emit(BatchEvent::RoundSizeChanged {
                        from: decision.previous,
                        to: decision.current,
                    });
                }
            }

            round += 1;
            let size = state.current_round_size();
            metrics::gauge!("batch_round_size").set(size as f64);
            self.emit(BatchEvent::RoundStarted { round, size });

            let round_end = (next + size).min(tasks.len());
            let mut in_flight = FuturesUnordered::new();
            let mut stopped = false;
            while next < round_end {
                if self.cancel.is_cancelled() {
                    stopped = true;
                    break;
                }
                let index = next;
                let query = tasks[index].query();
                let executor = self.executor.clone();
                in_flight.push(async move { (index, execute(executor.as_ref(), query).await) });
                next += 1;
            }
            debug!(round, issued = in_flight.len(), "Round issued.");

            // Everything issued is allowed to finish, cancelled or not.
            while let Some((index, outcome)) = in_flight.next().await {
                state.record(matches!(outcome, TaskOutcome::Succeeded(_)));
                self.finish_task(&mut tasks[index], outcome, progress);
            }

            if stopped {
                return true;
            }
        }
        false
    }

    fn finish_task(&self, task: &mut Task, outcome: TaskOutcome, progress: &mut Progress) {
        let label = match &outcome {
            TaskOutcome::Succeeded(_) => "succeeded",
            _ => "failed",
        };
        if !task.complete(outcome) {
            warn!(domain = %task.domain, "Task already completed; ignoring second outcome.");
            return;
        }
        if let TaskOutcome::Failed(reason) = &task.outcome {
            debug!(domain = %task.domain, %reason, "Task failed.");
        }
        metrics::counter!("batch_tasks_total", "outcome" => label).increment(1);

        progress.completed += 1;
        self.emit(BatchEvent::TaskCompleted(task.clone()));
        self.emit(BatchEvent::Progress {
            completed: progress.completed,
            total: progress.total,
        });
    }

    fn emit(&self, event: BatchEvent) {
        // A dropped receiver only means nobody is listening.
        let _ = self.events.send(event);
    }
}

/// Runs one query and folds every kind of failure into the task outcome.
async fn execute(executor: &dyn QueryExecutor, query: Query) -> TaskOutcome {
    match executor.perform_query(&query).await {
        Ok(response) if response.is_success() => TaskOutcome::Succeeded(response),
        Ok(response) => TaskOutcome::Failed(response.status.description().to_string()),
        Err(e) => TaskOutcome::Failed(e.to_string()),
    }
}
