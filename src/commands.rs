use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use common::cli::{CommonArgs, CommonCommands, utils};
use common::config::Configuration;
use querier::query::promql::{
    LabelMatchers, MetricsQuerier, PrometheusClient, QuerySpec, RangeFunction, Universal, render,
    shared_client,
};

#[derive(Parser)]
#[command(name = "promql-bridge", version, about = "Build PromQL from query specs and normalize the results")]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the PromQL rendered from a spec
    Render {
        #[command(flatten)]
        spec: SpecArgs,
    },
    /// Evaluate a spec at a single instant
    Instant {
        #[command(flatten)]
        spec: SpecArgs,

        /// Evaluation time (RFC 3339), defaults to now
        #[arg(long)]
        time: Option<DateTime<Utc>>,

        /// Override the configured query timeout, e.g. `10s`
        #[arg(long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,
    },
    /// Evaluate a spec over a time range
    Range {
        #[command(flatten)]
        spec: SpecArgs,

        /// Range start (RFC 3339), defaults to `end - last`
        #[arg(long)]
        start: Option<DateTime<Utc>>,

        /// Range end (RFC 3339), defaults to now
        #[arg(long)]
        end: Option<DateTime<Utc>>,

        /// Length of the range ending at `end` when no start is given
        #[arg(long, default_value = "1h", value_parser = humantime::parse_duration)]
        last: Duration,

        /// Resolution step
        #[arg(long, default_value = "1m", value_parser = humantime::parse_duration)]
        step: Duration,

        /// Override the configured query timeout, e.g. `10s`
        #[arg(long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,
    },
    #[command(flatten)]
    Common(CommonCommands),
}

/// Where the query spec comes from
#[derive(Args, Debug, Clone)]
pub struct SpecArgs {
    /// Query spec file, TOML or JSON by extension
    #[arg(short, long, conflicts_with = "metric")]
    pub file: Option<PathBuf>,

    /// Metric name for an ad-hoc spec
    #[arg(long, required_unless_present = "file")]
    pub metric: Option<String>,

    /// Equality matcher `name=value`, repeatable
    #[arg(long = "match", value_parser = parse_label)]
    pub matchers: Vec<(String, String)>,

    /// Wrap the ad-hoc selector in `rate(...[WINDOW])`
    #[arg(long, value_name = "WINDOW")]
    pub rate: Option<String>,
}

impl SpecArgs {
    pub fn load(&self) -> Result<QuerySpec> {
        if let Some(path) = &self.file {
            return load_spec(path);
        }

        let name = self
            .metric
            .clone()
            .context("either --file or --metric is required")?;
        let matchers = self
            .matchers
            .iter()
            .fold(LabelMatchers::new(), |m, (k, v)| m.must(k, v));

        let mut spec = QuerySpec::new(name).with_matchers(matchers);
        if let Some(window) = &self.rate {
            spec = spec.with_range(Some(RangeFunction::Rate), window);
        }
        Ok(spec)
    }
}

fn parse_label(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .filter(|(k, _)| !k.is_empty())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{s}'"))
}

/// Read a spec file, choosing the format by extension
pub fn load_spec(path: &Path) -> Result<QuerySpec> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read spec file {}", path.display()))?;

    let spec = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&text)
            .with_context(|| format!("Invalid JSON spec {}", path.display()))?,
        _ => toml::from_str(&text)
            .with_context(|| format!("Invalid TOML spec {}", path.display()))?,
    };
    Ok(spec)
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        utils::init_logging(&self.common);
        let config = utils::load_config(self.common.config.as_ref())?;

        match self.command {
            Command::Common(command) => {
                utils::handle_common_command(&command, &config, &app_version())
            }
            Command::Render { spec } => {
                println!("{}", render(&spec.load()?));
                Ok(())
            }
            Command::Instant {
                spec,
                time,
                timeout,
            } => {
                let spec = spec.load()?;
                let querier = MetricsQuerier::new(client(&config, timeout));
                let universal = querier.query(&spec, time.unwrap_or_else(Utc::now)).await?;
                print_universal(&universal)
            }
            Command::Range {
                spec,
                start,
                end,
                last,
                step,
                timeout,
            } => {
                let spec = spec.load()?;
                let (start, end) = resolve_range(start, end, last)?;
                let querier = MetricsQuerier::new(client(&config, timeout));
                let universal = querier.query_range(&spec, start, end, step).await?;
                print_universal(&universal)
            }
        }
    }
}

fn app_version() -> String {
    utils::version_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Get the shared client, exiting the process if it cannot be built
fn client(config: &Configuration, timeout: Option<Duration>) -> Arc<PrometheusClient> {
    let client = match shared_client(&config.prometheus) {
        Ok(client) => client,
        Err(e) => {
            log::error!("Error creating client: {e}");
            std::process::exit(1);
        }
    };

    match timeout {
        Some(timeout) => Arc::new(client.as_ref().clone().with_timeout(timeout)),
        None => client,
    }
}

fn resolve_range(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    last: Duration,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let end = end.unwrap_or_else(Utc::now);
    let start = match start {
        Some(start) => start,
        None => end - chrono::Duration::from_std(last).context("--last is out of range")?,
    };
    if start > end {
        anyhow::bail!("range start {start} is after end {end}");
    }
    Ok((start, end))
}

fn print_universal(universal: &Universal) -> Result<()> {
    let json =
        serde_json::to_string_pretty(universal).context("Failed to serialize query result")?;
    println!("{json}");
    Ok(())
}
