use crate::{
    comparison::discrepancy::{detect_discrepancies, has_discrepancies, ServerDiscrepancy},
    core::{QueryResponse, RecordType},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One server's answer within a comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerResult {
    pub server: String,
    pub response: QueryResponse,
}

/// The answers collected for one domain and record type across servers.
///
/// Results are kept in the order the servers were queried. The list only
/// grows, and never past the number of servers requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRun {
    domain: String,
    record_type: RecordType,
    timestamp: DateTime<Utc>,
    requested_servers: usize,
    results: Vec<ServerResult>,
}

impl ComparisonRun {
    pub(crate) fn new(domain: impl Into<String>, record_type: RecordType, requested_servers: usize) -> Self {
        Self {
            domain: domain.into(),
            record_type,
            timestamp: Utc::now(),
            requested_servers,
            results: Vec::with_capacity(requested_servers),
        }
    }

    /// Appends a server's answer. Returns `false` once every requested
    /// server already has one.
    pub(crate) fn push(&mut self, server: impl Into<String>, response: QueryResponse) -> bool {
        if self.results.len() >= self.requested_servers {
            return false;
        }
        self.results.push(ServerResult {
            server: server.into(),
            response,
        });
        true
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn results(&self) -> &[ServerResult] {
        &self.results
    }

    pub fn requested_servers(&self) -> usize {
        self.requested_servers
    }

    pub fn is_complete(&self) -> bool {
        self.results.len() == self.requested_servers
    }

    /// `true` if any server's records differ from the first server's.
    pub fn has_discrepancies(&self) -> bool {
        has_discrepancies(&self.results)
    }

    /// Per-server differences relative to the first server.
    pub fn discrepancies(&self) -> Vec<ServerDiscrepancy> {
        detect_discrepancies(&self.results)
    }

    fn successful(&self) -> impl Iterator<Item = &ServerResult> {
        self.results.iter().filter(|r| r.response.is_success())
    }

    /// The successful answer with the lowest elapsed time.
    pub fn fastest(&self) -> Option<&ServerResult> {
        self.successful().min_by_key(|r| r.response.elapsed_ms)
    }

    /// The successful answer with the highest elapsed time.
    pub fn slowest(&self) -> Option<&ServerResult> {
        self.successful().max_by_key(|r| r.response.elapsed_ms)
    }

    /// Mean elapsed time over successful answers only.
    pub fn average_elapsed_ms(&self) -> Option<f64> {
        let (count, sum) = self
            .successful()
            .fold((0u64, 0u64), |(n, sum), r| (n + 1, sum + r.response.elapsed_ms));
        (count > 0).then(|| sum as f64 / count as f64)
    }
}
