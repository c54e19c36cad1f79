//! Running one query against several servers and comparing the answers.

pub mod discrepancy;
pub mod run;
pub mod scheduler;

use crate::{
    core::{QueryOptions, RecordType},
    query::QueryError,
    validation::InvalidServer,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use discrepancy::{detect_discrepancies, has_discrepancies, ServerDiscrepancy};
pub use run::{ComparisonRun, ServerResult};
pub use scheduler::ComparisonScheduler;

/// What to compare and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRequest {
    pub domain: String,
    pub record_type: RecordType,
    /// Servers in the order they will be queried
    pub servers: Vec<String>,
    /// Lookup flags passed unchanged to every server's query
    #[serde(default)]
    pub options: QueryOptions,
}

impl ComparisonRequest {
    pub fn new(domain: impl Into<String>, record_type: RecordType, servers: Vec<String>) -> Self {
        Self {
            domain: domain.into(),
            record_type,
            servers,
            options: QueryOptions::default(),
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

/// Notifications emitted while a comparison runs.
///
/// Exactly one of `Completed` or `Error` ends every run.
#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonEvent {
    Progress { completed: usize, total: usize },
    Completed(ComparisonRun),
    Error(String),
}

impl ComparisonEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ComparisonEvent::Completed(_) | ComparisonEvent::Error(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComparisonError {
    #[error("select at least {required} servers to compare ({selected} selected)")]
    TooFewServers { selected: usize, required: usize },

    #[error("invalid domain {domain:?}: {reason}")]
    InvalidDomain { domain: String, reason: String },

    #[error(transparent)]
    InvalidServer(#[from] InvalidServer),

    #[error("query to {server} failed: {source}")]
    Query {
        server: String,
        #[source]
        source: QueryError,
    },

    #[error("comparison cancelled")]
    Cancelled,
}
