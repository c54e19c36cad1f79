use crate::{
    config::QueryConfig,
    core::{DnsRecord, Query, QueryExecutor, QueryResponse, QueryStatus, RecordType},
    query::QueryError,
};
use anyhow::Result;
use async_trait::async_trait;
use hickory_resolver::{
    config::{NameServerConfig, ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
    proto::{
        rr::{Name, RecordType as WireRecordType},
        xfer::Protocol,
    },
    system_conf, TokioResolver,
};
use moka::future::Cache;
use std::{
    net::{IpAddr, SocketAddr},
    str::FromStr,
    sync::Arc,
    time::Instant,
};
use tracing::{debug, instrument, trace, warn};

const DNS_PORT: u16 = 53;

/// Query executor backed by `hickory-resolver`.
///
/// Queries without a server go to the system resolver. Queries that name a
/// server get a dedicated resolver pointed only at that server; those are
/// cached by server label.
pub struct HickoryQueryExecutor {
    default_resolver: Arc<TokioResolver>,
    server_resolvers: Cache<String, Arc<TokioResolver>>,
    opts: ResolverOpts,
}

impl HickoryQueryExecutor {
    /// Creates a new executor from the application's query configuration.
    pub fn from_config(config: &QueryConfig) -> Result<(Self, Vec<SocketAddr>)> {
        let (system_config, _) = system_conf::read_system_conf()?;
        let base_config = if system_config.name_servers().is_empty() {
            warn!("No system DNS servers found, falling back to Cloudflare DNS.");
            ResolverConfig::cloudflare()
        } else {
            system_config
        };

        // Drop search domains so the domain is always resolved as written.
        let mut resolver_config = ResolverConfig::new();
        for ns in base_config.name_servers() {
            resolver_config.add_name_server(ns.clone());
        }

        let mut nameservers: Vec<_> = resolver_config
            .name_servers()
            .iter()
            .map(|ns| ns.socket_addr)
            .collect();
        nameservers.sort();
        nameservers.dedup();

        Ok((Self::with_resolver_config(resolver_config, config), nameservers))
    }

    /// Creates an executor whose default resolver uses `resolver_config`.
    pub fn with_resolver_config(resolver_config: ResolverConfig, config: &QueryConfig) -> Self {
        let mut opts = ResolverOpts::default();
        opts.ndots = 1;
        opts.timeout = config.timeout;
        opts.attempts = config.attempts;
        // Every answer must reflect what the server says right now.
        opts.cache_size = 0;

        let default_resolver = Arc::new(build_resolver(resolver_config, opts.clone()));
        let server_resolvers = Cache::builder()
            .max_capacity(config.cache_capacity)
            .build();

        Self {
            default_resolver,
            server_resolvers,
            opts,
        }
    }

    /// Returns the resolver for `server`, building and caching it on first use.
    async fn resolver_for(&self, server: Option<&str>) -> Result<Arc<TokioResolver>, QueryError> {
        let Some(server) = server.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(self.default_resolver.clone());
        };

        // Concurrent first queries to the same server share one initializer.
        self.server_resolvers
            .try_get_with(server.to_string(), self.build_server_resolver(server))
            .await
            .map_err(|e| (*e).clone())
    }

    async fn build_server_resolver(&self, server: &str) -> Result<Arc<TokioResolver>, QueryError> {
        let ip = match IpAddr::from_str(server) {
            Ok(ip) => ip,
            Err(_) => {
                // A hostname: find its address through the default resolver.
                let lookup = self
                    .default_resolver
                    .lookup_ip(server)
                    .await
                    .map_err(|e| QueryError::Resolution(format!("cannot resolve server {server}: {e}")))?;
                lookup.iter().next().ok_or_else(|| {
                    QueryError::Resolution(format!("server {server} has no address"))
                })?
            }
        };

        let socket_addr = SocketAddr::new(ip, DNS_PORT);
        let mut config = ResolverConfig::new();
        config.add_name_server(NameServerConfig::new(socket_addr, Protocol::Udp));
        config.add_name_server(NameServerConfig::new(socket_addr, Protocol::Tcp));
        debug!(server, %socket_addr, "Built dedicated resolver");

        Ok(Arc::new(build_resolver(config, self.opts.clone())))
    }
}

fn build_resolver(config: ResolverConfig, opts: ResolverOpts) -> TokioResolver {
    hickory_resolver::Resolver::builder_with_config(config, TokioConnectionProvider::default())
        .with_options(opts)
        .build()
}

#[async_trait]
impl QueryExecutor for HickoryQueryExecutor {
    #[instrument(skip_all, fields(domain = %query.domain, record_type = %query.record_type))]
    async fn perform_query(&self, query: &Query) -> Result<QueryResponse, QueryError> {
        if query.options.trace {
            return Err(QueryError::Unsupported("trace"));
        }

        let (name, wire_type) = if query.options.reverse {
            let ip = IpAddr::from_str(query.domain.trim()).map_err(|_| {
                QueryError::InvalidInput(format!(
                    "reverse lookup needs an IP address, got {}",
                    query.domain
                ))
            })?;
            (Name::from(ip), WireRecordType::PTR)
        } else {
            let name = Name::from_str(query.domain.trim())
                .map_err(|e| QueryError::InvalidInput(format!("{}: {e}", query.domain)))?;
            let wire_type = WireRecordType::from_str(query.record_type.as_str())
                .map_err(|e| QueryError::InvalidInput(e.to_string()))?;
            (name, wire_type)
        };

        let resolver = self.resolver_for(query.server.as_deref()).await?;

        let start_time = Instant::now();
        let result = resolver.lookup(name, wire_type).await;
        let duration = start_time.elapsed();
        let elapsed_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        metrics::histogram!("dns_query_duration_seconds").record(duration.as_secs_f64());

        let response = match result {
            Ok(lookup) => {
                let records = lookup
                    .record_iter()
                    .filter_map(|record| {
                        let record_type = RecordType::from_str(&record.record_type().to_string())
                            .map_err(|e| trace!(error = %e, "Skipping record"))
                            .ok()?;
                        Some(DnsRecord::new(
                            record.name().to_string().trim_end_matches('.'),
                            record.ttl(),
                            record_type,
                            record.data().to_string().trim_end_matches('.'),
                        ))
                    })
                    .collect();
                QueryResponse::new(query, QueryStatus::Success, elapsed_ms).with_records(records)
            }
            Err(e) => {
                let status = classify_error_str(&e.to_string());
                debug!(error = %e, %status, "Lookup did not succeed");
                QueryResponse::new(query, status, elapsed_ms)
            }
        };

        metrics::counter!("dns_queries_total", "status" => response.status.as_str()).increment(1);
        Ok(response)
    }
}

/// Maps a resolver error message onto a `QueryStatus`.
///
/// An empty NOERROR answer is a success with no records.
fn classify_error_str(err_str: &str) -> QueryStatus {
    let lower = err_str.to_lowercase();
    if lower.contains("nxdomain") {
        QueryStatus::NotFound
    } else if lower.contains("servfail") || lower.contains("response_code: refused") {
        QueryStatus::ServerFailure
    } else if lower.contains("timed out") || lower.contains("timeout") {
        QueryStatus::Timeout
    } else if lower.contains("no record") || lower.contains("no records found") {
        QueryStatus::Success
    } else {
        QueryStatus::NetworkError
    }
}
