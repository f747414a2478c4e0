use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "promql-bridge.toml";

/// Environment variable prefix, nested keys are separated by `__`
pub const ENV_PREFIX: &str = "PROMQL_BRIDGE__";

/// Connection settings for the Prometheus-compatible backend
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Base URL of the HTTP API, e.g. `http://localhost:9090`
    pub url: String,
    /// Upper bound for a single query round trip
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Optional bearer token sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            url: String::from("http://localhost:9090"),
            timeout: Duration::from_secs(30),
            bearer_token: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    /// Query backend configuration
    pub prometheus: PrometheusConfig,
}

impl Configuration {
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(DEFAULT_CONFIG_FILE))
    }

    /// Load configuration from an explicit TOML file, still honouring env overrides
    ///
    /// Unlike [`Configuration::load`], the file must exist.
    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        if !path.is_file() {
            return Err(Box::new(figment::Error::from(format!(
                "configuration file not found: {}",
                path.display()
            ))));
        }
        Self::figment(Toml::file(path))
    }

    fn figment(file: figment::providers::Data<Toml>) -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}
