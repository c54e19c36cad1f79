//! Digger - bulk and multi-server DNS lookups from the command line.
//!
//! `digger batch FILE` runs every lookup listed in a bulk file and prints the
//! final report as JSON. `digger compare DOMAIN -s SERVER -s SERVER` asks each
//! server the same question and reports where their answers differ.

use anyhow::{bail, Result};
use clap::Parser;
use digger::{
    cli::{BatchArgs, Cli, Command, CompareArgs},
    comparison::ComparisonRun,
    config::Config,
    engine::RunHandle,
    internal_metrics::{describe_metrics, logging_recorder::LoggingRecorder},
    query::HickoryQueryExecutor,
    BatchEvent, ComparisonEvent, ComparisonRequest, Engine, ExecutionMode, RunStatus,
};
use itertools::Itertools;
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Defaults, then the file, then DIGGER_* variables, then flags.
    let config = Config::load(cli.config.as_deref(), cli.clone()).unwrap_or_else(|err| {
        tracing_subscriber::fmt().init();
        error!("Failed to load configuration: {:#}", err);
        std::process::exit(1);
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Digger starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Log Metrics: {}", config.log_metrics);
    info!("Query Timeout: {}ms", config.query.timeout.as_millis());
    info!("Query Attempts: {}", config.query.attempts);
    info!(
        "Round Size: initial {}, bounds [{}, {}]",
        config.batch.initial_round_size, config.batch.min_round_size, config.batch.max_round_size
    );
    info!(
        "Tuning: every {} outcomes, at most every {}ms",
        config.batch.tuning_window,
        config.batch.tuning_interval.as_millis()
    );
    info!(
        "Import Limits: {} bytes, {} lines",
        config.import.max_file_bytes, config.import.max_lines
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    describe_metrics();
    let mut metrics_task: Option<JoinHandle<()>> = None;
    if config.log_metrics {
        info!(
            "Logging recorder enabled. Metrics will be printed every {} seconds.",
            config.log_aggregation_seconds
        );
        let (recorder, handle) = LoggingRecorder::new(
            Duration::from_secs(config.log_aggregation_seconds),
            shutdown_rx.clone(),
        );
        if let Err(e) = metrics::set_global_recorder(recorder) {
            warn!("Failed to install logging recorder: {}", e);
        }
        metrics_task = Some(handle);
    }

    let (executor, nameservers) = HickoryQueryExecutor::from_config(&config.query)?;
    info!(
        "DNS Resolver: System Default ({})",
        nameservers.iter().join(", ")
    );
    info!("-------------------------------------------------------");

    let engine = Engine::new(Arc::new(executor), config);
    let result = match cli.command {
        Command::Batch(args) => run_batch(&engine, args).await,
        Command::Compare(args) => run_compare(&engine, args).await,
    };

    let _ = shutdown_tx.send(true);
    if let Some(task) = metrics_task {
        let _ = task.await;
    }
    info!("Digger finished.");
    result
}

async fn run_batch(engine: &Engine, args: BatchArgs) -> Result<()> {
    let importer = engine.importer();
    // Reject an oversized file before reading any of it.
    let declared_size = tokio::fs::metadata(&args.file).await?.len();
    importer.check_size(declared_size)?;
    let data = tokio::fs::read(&args.file).await?;

    let mode = if args.sequential {
        ExecutionMode::Sequential
    } else {
        ExecutionMode::Concurrent
    };
    info!(file = %args.file.display(), ?mode, "Importing bulk file.");
    let handle = engine.start_import_batch(
        data,
        declared_size,
        engine.config().import.default_record_type,
        mode,
    )?;

    let report = drive(handle, |event| match event {
        BatchEvent::Progress { completed, total } => debug!("Progress: {}/{}", completed, total),
        BatchEvent::TaskCompleted(task) => debug!(
            domain = %task.domain,
            record_type = %task.record_type,
            succeeded = task.is_succeeded(),
            "Task finished."
        ),
        BatchEvent::RoundStarted { round, size } => debug!("Round {} started with {} tasks.", round, size),
        BatchEvent::RoundSizeChanged { from, to } => info!("Round size changed from {} to {}.", from, to),
        BatchEvent::Completed(tasks) => info!("Batch completed ({} tasks).", tasks.len()),
        BatchEvent::Cancelled => warn!("Batch cancelled."),
        BatchEvent::Error(message) => error!("Batch failed: {}", message),
    })
    .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    match report.status {
        RunStatus::Failed(message) => bail!(message),
        RunStatus::Cancelled | RunStatus::Completed => Ok(()),
    }
}

async fn run_compare(engine: &Engine, args: CompareArgs) -> Result<()> {
    let options = args.query_options();
    let request = ComparisonRequest::new(args.domain, args.record_type, args.servers)
        .with_options(options);
    let handle = engine.start_comparison(request)?;

    let result = drive(handle, |event| match event {
        ComparisonEvent::Progress { completed, total } => debug!("Progress: {}/{}", completed, total),
        ComparisonEvent::Completed(run) => info!("Comparison completed ({} servers).", run.results().len()),
        ComparisonEvent::Error(message) => error!("Comparison failed: {}", message),
    })
    .await?;

    print_comparison(&result?, options.short);
    Ok(())
}

/// Forwards every event to `on_event` until the run ends, cancelling it on
/// Ctrl-C, and returns the run's result.
async fn drive<E, R>(mut handle: RunHandle<E, R>, mut on_event: impl FnMut(&E)) -> Result<R> {
    let cancel = handle.cancel_token();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            _ = &mut ctrl_c, if !interrupted => {
                warn!("Interrupt received, letting in-flight queries finish...");
                interrupted = true;
                cancel.cancel();
            }
            event = handle.events.recv() => match event {
                Some(event) => on_event(&event),
                None => break,
            },
        }
    }
    Ok(handle.wait().await?)
}

fn print_comparison(run: &ComparisonRun, short: bool) {
    if short {
        for result in run.results() {
            let records = result.response.records.iter().map(|r| r.value.as_str()).join(" ");
            println!("{}: {}", result.server, records);
        }
        return;
    }

    println!("{} {} ({})", run.domain(), run.record_type(), run.timestamp().to_rfc3339());
    for result in run.results() {
        let records = result
            .response
            .records
            .iter()
            .map(|record| record.value.as_str())
            .join(", ");
        println!(
            "  {:<20} {:<14} {:>6}ms  {}",
            result.server,
            result.response.status.as_str(),
            result.response.elapsed_ms,
            records
        );
    }
    if let (Some(fastest), Some(slowest)) = (run.fastest(), run.slowest()) {
        println!(
            "  fastest {} ({}ms), slowest {} ({}ms)",
            fastest.server, fastest.response.elapsed_ms, slowest.server, slowest.response.elapsed_ms
        );
    }

    let discrepancies = run.discrepancies();
    if discrepancies.is_empty() {
        println!("All servers agree.");
        return;
    }
    for d in discrepancies {
        println!(
            "  {} differs from {}: {} vs {} records, missing [{}], extra [{}]",
            d.server,
            d.reference_server,
            d.record_count,
            d.reference_record_count,
            d.missing.iter().join(", "),
            d.extra.iter().join(", ")
        );
    }
}
