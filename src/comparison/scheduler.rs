use crate::{
    cancel::CancelToken,
    comparison::{ComparisonError, ComparisonEvent, ComparisonRequest, ComparisonRun},
    config::ComparisonConfig,
    core::{Query, QueryExecutor},
    validation::{validate_domain, validate_server},
};
use std::{net::IpAddr, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Runs one query against each requested server, one server at a time.
///
/// Servers are queried strictly in the order given, with a short pause
/// between consecutive queries, so the result list is always in submission
/// order and never holds a half-written answer while the host looks at it.
pub struct ComparisonScheduler {
    executor: Arc<dyn QueryExecutor>,
    config: ComparisonConfig,
    events: mpsc::UnboundedSender<ComparisonEvent>,
    cancel: CancelToken,
}

impl ComparisonScheduler {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        config: ComparisonConfig,
        events: mpsc::UnboundedSender<ComparisonEvent>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            executor,
            config,
            events,
            cancel,
        }
    }

    /// Runs the comparison and reports its terminal event.
    #[instrument(skip_all, fields(domain = %request.domain, servers = request.servers.len()))]
    pub async fn run(self, request: ComparisonRequest) -> Result<ComparisonRun, ComparisonError> {
        let result = self.compare(&request).await;
        match &result {
            Ok(run) => {
                let discrepancies = run.has_discrepancies();
                info!(discrepancies, "Comparison completed.");
                metrics::counter!("comparison_runs_total", "outcome" => "completed").increment(1);
                self.emit(ComparisonEvent::Completed(run.clone()));
            }
            Err(e) => {
                warn!(error = %e, "Comparison failed.");
                metrics::counter!("comparison_runs_total", "outcome" => "failed").increment(1);
                self.emit(ComparisonEvent::Error(e.to_string()));
            }
        }
        result
    }

    async fn compare(&self, request: &ComparisonRequest) -> Result<ComparisonRun, ComparisonError> {
        let total = request.servers.len();
        if total < self.config.min_servers {
            return Err(ComparisonError::TooFewServers {
                selected: total,
                required: self.config.min_servers,
            });
        }
        if request.options.reverse {
            // A reverse lookup names an address, not a domain.
            request
                .domain
                .parse::<IpAddr>()
                .map_err(|_| ComparisonError::InvalidDomain {
                    domain: request.domain.clone(),
                    reason: "reverse lookup needs an IP address".to_string(),
                })?;
        } else {
            validate_domain(&request.domain).map_err(|e| ComparisonError::InvalidDomain {
                domain: request.domain.clone(),
                reason: e.to_string(),
            })?;
        }
        for server in &request.servers {
            validate_server(server)?;
        }

        let mut run = ComparisonRun::new(request.domain.clone(), request.record_type, total);
        for (index, server) in request.servers.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(ComparisonError::Cancelled);
            }
            if index > 0 {
                tokio::time::sleep(self.config.yield_between).await;
                if self.cancel.is_cancelled() {
                    return Err(ComparisonError::Cancelled);
                }
            }

            let query = Query::new(request.domain.clone(), request.record_type)
                .with_server(Some(server.clone()))
                .with_options(request.options);
            let response = self
                .executor
                .perform_query(&query)
                .await
                .map_err(|source| ComparisonError::Query {
                    server: server.clone(),
                    source,
                })?;
            debug!(server, status = %response.status, elapsed_ms = response.elapsed_ms, "Server answered.");

            run.push(server.clone(), response);
            self.emit(ComparisonEvent::Progress {
                completed: run.results().len(),
                total,
            });
        }
        Ok(run)
    }

    fn emit(&self, event: ComparisonEvent) {
        let _ = self.events.send(event);
    }
}
