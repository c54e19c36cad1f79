//! The orchestration entry point used by a host application.
//!
//! `Engine` owns the query executor and configuration and starts batch and
//! comparison runs on the tokio runtime. At most one batch run and one
//! comparison run can be active per engine at any time.

use crate::{
    batch::{BatchEvent, BatchReport, BatchScheduler, ExecutionMode},
    cancel::CancelToken,
    comparison::{ComparisonError, ComparisonEvent, ComparisonRequest, ComparisonRun, ComparisonScheduler},
    config::Config,
    core::{QueryExecutor, RecordType},
    import::BulkImporter,
    task::Task,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("a batch run is already in progress")]
    BatchAlreadyRunning,

    #[error("a comparison run is already in progress")]
    ComparisonAlreadyRunning,
}

/// Clears a running flag when the run that set it ends, however it ends.
struct RunningGuard(Arc<AtomicBool>);

impl RunningGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A started run: its event stream, a way to cancel it, and its result.
pub struct RunHandle<E, R> {
    pub events: mpsc::UnboundedReceiver<E>,
    cancel: CancelToken,
    join: JoinHandle<R>,
}

impl<E, R> RunHandle<E, R> {
    /// Stops the run from starting new queries. Queries already issued finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Waits for the run to finish and returns its result.
    pub async fn wait(self) -> Result<R, tokio::task::JoinError> {
        self.join.await
    }
}

pub type BatchHandle = RunHandle<BatchEvent, BatchReport>;
pub type ComparisonHandle = RunHandle<ComparisonEvent, Result<ComparisonRun, ComparisonError>>;

pub struct Engine {
    executor: Arc<dyn QueryExecutor>,
    config: Config,
    batch_running: Arc<AtomicBool>,
    comparison_running: Arc<AtomicBool>,
}

impl Engine {
    pub fn new(executor: Arc<dyn QueryExecutor>, config: Config) -> Self {
        Self {
            executor,
            config,
            batch_running: Arc::new(AtomicBool::new(false)),
            comparison_running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn importer(&self) -> BulkImporter {
        BulkImporter::new(self.config.import.clone())
    }

    pub fn is_batch_running(&self) -> bool {
        self.batch_running.load(Ordering::Acquire)
    }

    pub fn is_comparison_running(&self) -> bool {
        self.comparison_running.load(Ordering::Acquire)
    }

    /// Starts a batch run over `tasks`.
    pub fn start_batch(&self, tasks: Vec<Task>, mode: ExecutionMode) -> Result<BatchHandle, EngineError> {
        let guard = RunningGuard::acquire(&self.batch_running).ok_or(EngineError::BatchAlreadyRunning)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelToken::new();
        let scheduler = BatchScheduler::new(
            self.executor.clone(),
            self.config.batch.clone(),
            tx,
            cancel.clone(),
        );

        info!(tasks = tasks.len(), ?mode, "Starting batch run.");
        let join = tokio::spawn(async move {
            let _guard = guard;
            scheduler.run(tasks, mode).await
        });

        Ok(RunHandle {
            events: rx,
            cancel,
            join,
        })
    }

    /// Validates bulk input and, if it holds at least one valid entry, runs
    /// it as a batch. A rejected import ends the run with a single
    /// `BatchEvent::Error` and issues no query.
    pub fn start_import_batch(
        &self,
        data: Vec<u8>,
        declared_size: u64,
        default_type: RecordType,
        mode: ExecutionMode,
    ) -> Result<BatchHandle, EngineError> {
        let guard = RunningGuard::acquire(&self.batch_running).ok_or(EngineError::BatchAlreadyRunning)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelToken::new();
        let importer = self.importer();
        let scheduler = BatchScheduler::new(
            self.executor.clone(),
            self.config.batch.clone(),
            tx.clone(),
            cancel.clone(),
        );

        let join = tokio::spawn(async move {
            let _guard = guard;
            match importer.import_with_default(&data, declared_size, default_type) {
                Ok(outcome) => {
                    info!(
                        tasks = outcome.tasks.len(),
                        skipped = outcome.skipped,
                        "Import accepted, starting batch run."
                    );
                    scheduler.run(outcome.tasks, mode).await
                }
                Err(e) => {
                    warn!(error = %e, "Import rejected.");
                    let _ = tx.send(BatchEvent::Error(e.to_string()));
                    BatchReport::failed(e.to_string())
                }
            }
        });

        Ok(RunHandle {
            events: rx,
            cancel,
            join,
        })
    }

    /// Starts a comparison of one query across the requested servers.
    pub fn start_comparison(&self, request: ComparisonRequest) -> Result<ComparisonHandle, EngineError> {
        let guard = RunningGuard::acquire(&self.comparison_running)
            .ok_or(EngineError::ComparisonAlreadyRunning)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelToken::new();
        let scheduler = ComparisonScheduler::new(
            self.executor.clone(),
            self.config.comparison.clone(),
            tx,
            cancel.clone(),
        );

        info!(domain = %request.domain, servers = request.servers.len(), "Starting comparison run.");
        let join = tokio::spawn(async move {
            let _guard = guard;
            scheduler.run(request).await
        });

        Ok(RunHandle {
            events: rx,
            cancel,
            join,
        })
    }
}
