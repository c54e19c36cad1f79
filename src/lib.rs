//! Digger - batch and multi-server comparison engine for DNS lookups
//!
//! This library takes large sets of independent DNS lookups, either
//! bulk-imported from a file or one domain fanned out across several servers,
//! and runs them concurrently and adaptively while isolating failures.

pub mod batch;
pub mod cancel;
pub mod cli;
pub mod comparison;
pub mod config;
pub mod core;
pub mod engine;
pub mod import;
pub mod internal_metrics;
pub mod query;
pub mod task;
pub mod validation;

// Re-export core types for convenience
pub use crate::core::*;
pub use batch::{BatchEvent, BatchReport, ExecutionMode, RunStatus};
pub use cancel::CancelToken;
pub use comparison::{ComparisonEvent, ComparisonRequest, ComparisonRun};
pub use engine::{BatchHandle, ComparisonHandle, Engine, EngineError};
pub use import::{BulkImporter, ImportError, ImportOutcome};
pub use task::{BatchStats, Task, TaskOutcome};
