//! Core domain types and service traits for Digger
//!
//! This module defines the query and response structures shared by every
//! scheduler, and the `QueryExecutor` trait that is the engine's only way of
//! touching the network.

use crate::query::QueryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Supported DNS record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    #[default]
    A,
    Aaaa,
    Cname,
    Mx,
    Ns,
    Ptr,
    Soa,
    Txt,
}

impl RecordType {
    pub const ALL: [RecordType; 8] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Cname,
        RecordType::Mx,
        RecordType::Ns,
        RecordType::Ptr,
        RecordType::Soa,
        RecordType::Txt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Ns => "NS",
            RecordType::Ptr => "PTR",
            RecordType::Soa => "SOA",
            RecordType::Txt => "TXT",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a supported record type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported record type: {0}")]
pub struct UnknownRecordType(pub String);

impl FromStr for RecordType {
    type Err = UnknownRecordType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        RecordType::ALL
            .into_iter()
            .find(|rt| rt.as_str() == upper)
            .ok_or_else(|| UnknownRecordType(s.to_string()))
    }
}

/// Outcome classification reported by the query collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Success,
    NotFound,
    ServerFailure,
    Timeout,
    NetworkError,
    InvalidInput,
}

impl QueryStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, QueryStatus::Success)
    }

    /// Label used for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Success => "success",
            QueryStatus::NotFound => "nxdomain",
            QueryStatus::ServerFailure => "servfail",
            QueryStatus::Timeout => "timeout",
            QueryStatus::NetworkError => "network_error",
            QueryStatus::InvalidInput => "invalid_input",
        }
    }

    /// Human readable explanation, used as the failure reason of a task.
    pub fn description(&self) -> &'static str {
        match self {
            QueryStatus::Success => "query succeeded",
            QueryStatus::NotFound => "domain not found (NXDOMAIN)",
            QueryStatus::ServerFailure => "server failure (SERVFAIL)",
            QueryStatus::Timeout => "query timed out",
            QueryStatus::NetworkError => "network error",
            QueryStatus::InvalidInput => "invalid query input",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single resource record returned by a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Owner name, without the trailing dot
    pub name: String,
    pub ttl: u32,
    pub record_type: RecordType,
    /// Presentation-format record data
    pub value: String,
}

impl DnsRecord {
    pub fn new(
        name: impl Into<String>,
        ttl: u32,
        record_type: RecordType,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ttl,
            record_type,
            value: value.into(),
        }
    }

    /// The `TYPE:value` key used for order-independent comparison.
    pub fn comparison_key(&self) -> String {
        format!("{}:{}", self.record_type, self.value)
    }
}

/// Flags that change how the collaborator performs a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Treat the domain as an IP address and look up its PTR record.
    pub reverse: bool,
    /// Follow the delegation path from the root.
    pub trace: bool,
    /// Only the record data is of interest.
    pub short: bool,
}

/// One lookup request handed to a `QueryExecutor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub domain: String,
    pub record_type: RecordType,
    /// Target server; `None` uses the executor's default resolver.
    pub server: Option<String>,
    #[serde(default)]
    pub options: QueryOptions,
}

impl Query {
    pub fn new(domain: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            domain: domain.into(),
            record_type,
            server: None,
            options: QueryOptions::default(),
        }
    }

    pub fn with_server(mut self, server: Option<String>) -> Self {
        self.server = server;
        self
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

/// The structured answer to a single query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub domain: String,
    pub record_type: RecordType,
    pub server: Option<String>,
    pub status: QueryStatus,
    /// Time spent waiting for the answer, in milliseconds
    pub elapsed_ms: u64,
    pub records: Vec<DnsRecord>,
    pub queried_at: DateTime<Utc>,
}

impl QueryResponse {
    /// Creates a response for `query` with the given status and no records.
    pub fn new(query: &Query, status: QueryStatus, elapsed_ms: u64) -> Self {
        Self {
            domain: query.domain.clone(),
            record_type: query.record_type,
            server: query.server.clone(),
            status,
            elapsed_ms,
            records: Vec::new(),
            queried_at: Utc::now(),
        }
    }

    pub fn with_records(mut self, records: Vec<DnsRecord>) -> Self {
        self.records = records;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Performs DNS lookups on behalf of the schedulers
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Performs one lookup.
    ///
    /// # Returns
    /// * `Ok(QueryResponse)` whenever the server could be asked, including
    ///   NXDOMAIN, SERVFAIL and timeouts, which are reported through `status`
    /// * `Err` if the query could not be performed at all
    async fn perform_query(&self, query: &Query) -> Result<QueryResponse, QueryError>;
}
