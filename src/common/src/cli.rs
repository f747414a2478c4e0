use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Common CLI arguments shared across all binaries
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Subcommands that inspect the configuration instead of querying
#[derive(Subcommand, Debug, Clone)]
pub enum CommonCommands {
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Pick the log filter directive for the given arguments
    pub fn log_level(args: &CommonArgs) -> &'static str {
        if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Initialize logging based on CLI arguments
    ///
    /// `RUST_LOG` wins over the flags when it is set.
    pub fn init_logging(args: &CommonArgs) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level(args)));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("promql-bridge Configuration:");
            println!("============================");
            println!("Prometheus URL: {}", config.prometheus.url);
            println!("Query timeout: {:?}", config.prometheus.timeout);
            println!(
                "Bearer token: {}",
                if config.prometheus.bearer_token.is_some() {
                    "set"
                } else {
                    "not set"
                }
            );
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");

        if config.prometheus.url.is_empty() {
            anyhow::bail!("Prometheus URL cannot be empty");
        }

        if !(config.prometheus.url.starts_with("http://")
            || config.prometheus.url.starts_with("https://"))
        {
            anyhow::bail!(
                "Prometheus URL must use http or https: {}",
                config.prometheus.url
            );
        }

        if config.prometheus.timeout.is_zero() {
            anyhow::bail!("Query timeout must be greater than zero");
        }

        log::info!("Configuration validation passed");
        Ok(())
    }

    /// Handle the configuration subcommands
    ///
    /// `version` is the binary's own version line, see [`version_info`].
    pub fn handle_common_command(
        command: &CommonCommands,
        config: &Configuration,
        version: &str,
    ) -> Result<()> {
        match command {
            CommonCommands::Config { json } => display_config(config, *json),
            CommonCommands::Validate => validate_config(config),
            CommonCommands::Version => {
                println!("{version}");
                Ok(())
            }
        }
    }

    /// Standard version line for a binary, e.g. `promql-bridge 0.1.0 (1.85.0)`
    ///
    /// Callers pass their own `CARGO_PKG_NAME` and `CARGO_PKG_VERSION`.
    pub fn version_info(name: &str, version: &str) -> String {
        format!("{name} {version} ({})", env!("CARGO_PKG_RUST_VERSION"))
    }
}
