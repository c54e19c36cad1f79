//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `digger.toml` file and environment variables.

use crate::core::{QueryOptions, RecordType};
use clap::{Args, Parser, Subcommand};
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Run bulk and multi-server DNS lookups.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Per-query timeout in milliseconds.
    #[arg(long, value_name = "MS", global = true)]
    pub timeout_ms: Option<u64>,

    /// Logging level (e.g. "debug", "info", "digger=trace").
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Periodically log collected metrics.
    #[arg(long, global = true)]
    pub log_metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run every lookup listed in a bulk file.
    Batch(BatchArgs),
    /// Ask several servers the same question and compare the answers.
    Compare(CompareArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Bulk file with one `domain[,record_type[,dns_server]]` per line.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Run one lookup at a time instead of in adaptive rounds.
    #[arg(long)]
    pub sequential: bool,

    /// Record type for lines that do not name one.
    #[arg(long, value_name = "TYPE")]
    pub default_type: Option<RecordType>,

    /// Upper bound for the adaptive round size.
    #[arg(long, value_name = "N")]
    pub max_round_size: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    /// Domain to look up.
    pub domain: String,

    /// Record type to look up.
    #[arg(short = 't', long = "type", value_name = "TYPE", default_value = "A")]
    pub record_type: RecordType,

    /// Server to query; repeat for each server to compare.
    #[arg(short, long = "server", value_name = "SERVER", required = true)]
    pub servers: Vec<String>,

    /// Treat DOMAIN as an IP address and compare its PTR records.
    #[arg(short = 'x', long)]
    pub reverse: bool,

    /// Print only the record values for each server.
    #[arg(long)]
    pub short: bool,
}

impl CompareArgs {
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            reverse: self.reverse,
            short: self.short,
            ..Default::default()
        }
    }
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();
        let mut query = Dict::new();
        let mut import = Dict::new();
        let mut batch = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(timeout) = self.timeout_ms {
            query.insert("timeout_ms".into(), Value::from(timeout));
        }

        // Only an explicit flag overrides the file; absence keeps its value.
        if self.log_metrics {
            dict.insert("log_metrics".into(), Value::from(true));
        }

        if let Command::Batch(args) = &self.command {
            if let Some(record_type) = args.default_type {
                import.insert(
                    "default_record_type".into(),
                    Value::from(record_type.as_str().to_string()),
                );
            }
            if let Some(max) = args.max_round_size {
                batch.insert("max_round_size".into(), Value::from(max));
            }
        }

        for (section, values) in [("query", query), ("import", import), ("batch", batch)] {
            if !values.is_empty() {
                dict.insert(section.into(), Value::from(values));
            }
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
