use crate::{
    core::{DnsRecord, Query, QueryExecutor, QueryResponse, QueryStatus, RecordType},
    query::QueryError,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A scripted answer returned by `FakeQueryExecutor`.
#[derive(Debug, Clone)]
pub enum FakeAnswer {
    Records(Vec<DnsRecord>),
    Status(QueryStatus),
    Error(String),
}

type CallHook = Box<dyn Fn(usize) + Send + Sync>;

/// Fake query executor for testing
pub struct FakeQueryExecutor {
    // A queue of answers per key. The front of the queue is the next answer.
    responses: Arc<Mutex<HashMap<String, VecDeque<FakeAnswer>>>>,
    call_count: Arc<Mutex<HashMap<String, u32>>>,
    total_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Duration,
    fallback: FakeAnswer,
    call_hook: Mutex<Option<CallHook>>,
    queries: Mutex<Vec<Query>>,
}

impl Default for FakeQueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeQueryExecutor {
    /// Answers every unscripted query with a single `A 127.0.0.1` record.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            call_count: Arc::new(Mutex::new(HashMap::new())),
            total_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            latency: Duration::ZERO,
            fallback: FakeAnswer::Records(vec![DnsRecord::new(
                "fake",
                300,
                RecordType::A,
                "127.0.0.1",
            )]),
            call_hook: Mutex::new(None),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Every query sleeps for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Answer used when nothing is scripted for a query.
    pub fn with_fallback(mut self, fallback: FakeAnswer) -> Self {
        self.fallback = fallback;
        self
    }

    /// Runs `hook` with the 1-based call number after each query is answered.
    pub fn on_call(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.call_hook.lock().unwrap() = Some(Box::new(hook));
    }

    fn push(&self, key: String, answer: FakeAnswer) {
        self.responses
            .lock()
            .unwrap()
            .entry(key)
            .or_default()
            .push_back(answer);
    }

    /// Add a successful response to the queue for a domain
    pub fn add_success_response(&self, domain: &str, records: Vec<DnsRecord>) {
        self.push(domain.to_string(), FakeAnswer::Records(records));
    }

    /// Add a non-success status to the queue for a domain
    pub fn add_status_response(&self, domain: &str, status: QueryStatus) {
        self.push(domain.to_string(), FakeAnswer::Status(status));
    }

    /// Add a collaborator failure to the queue for a domain
    pub fn add_error_response(&self, domain: &str, error: &str) {
        self.push(domain.to_string(), FakeAnswer::Error(error.to_string()));
    }

    /// Add a successful response for a domain asked of a specific server
    pub fn add_server_response(&self, domain: &str, server: &str, records: Vec<DnsRecord>) {
        self.push(server_key(domain, server), FakeAnswer::Records(records));
    }

    /// Add a collaborator failure for a domain asked of a specific server
    pub fn add_server_error(&self, domain: &str, server: &str, error: &str) {
        self.push(server_key(domain, server), FakeAnswer::Error(error.to_string()));
    }

    /// Get the number of times a domain was queried
    pub fn get_call_count(&self, domain: &str) -> u32 {
        let call_count = self.call_count.lock().unwrap();
        call_count.get(domain).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    /// Every query received so far, in arrival order.
    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().unwrap().clone()
    }

    /// Highest number of queries that were outstanding at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_answer(&self, query: &Query) -> FakeAnswer {
        let mut responses = self.responses.lock().unwrap();
        if let Some(server) = &query.server {
            if let Some(answer) = responses
                .get_mut(&server_key(&query.domain, server))
                .and_then(VecDeque::pop_front)
            {
                return answer;
            }
        }
        responses
            .get_mut(&query.domain)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.fallback.clone())
    }
}

fn server_key(domain: &str, server: &str) -> String {
    format!("{domain}@{server}")
}

#[async_trait]
impl QueryExecutor for FakeQueryExecutor {
    async fn perform_query(&self, query: &Query) -> Result<QueryResponse, QueryError> {
        {
            let mut call_count = self.call_count.lock().unwrap();
            *call_count.entry(query.domain.clone()).or_insert(0) += 1;
        }
        self.queries.lock().unwrap().push(query.clone());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let answer = self.next_answer(query);
        let elapsed_ms = u64::try_from(self.latency.as_millis()).unwrap_or(u64::MAX);
        let result = match answer {
            FakeAnswer::Records(records) => {
                Ok(QueryResponse::new(query, QueryStatus::Success, elapsed_ms).with_records(records))
            }
            FakeAnswer::Status(status) => Ok(QueryResponse::new(query, status, elapsed_ms)),
            FakeAnswer::Error(error) => Err(QueryError::Resolution(error)),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let call_number = self.total_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = self.call_hook.lock().unwrap().as_ref() {
            hook(call_number);
        }
        result
    }
}
