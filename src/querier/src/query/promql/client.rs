//! Execution of rendered queries against the Prometheus HTTP API

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use common::config::PrometheusConfig;
use once_cell::sync::OnceCell;
use serde::Deserialize;

use super::error::PromQLError;
use super::result::BackendResult;

const INSTANT_QUERY_PATH: &str = "/api/v1/query";
const RANGE_QUERY_PATH: &str = "/api/v1/query_range";

static SHARED_CLIENT: OnceCell<Arc<PrometheusClient>> = OnceCell::new();

/// Raw result of a query plus any advisory warnings from the backend
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub result: BackendResult,
    /// Non-fatal warnings, to be logged by the caller
    pub warnings: Vec<String>,
}

/// Something that can run PromQL text against a backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Evaluate `query` at a single instant
    async fn instant_query(
        &self,
        query: &str,
        time: DateTime<Utc>,
    ) -> Result<QueryResponse, PromQLError>;

    /// Evaluate `query` over `[start, end]` every `step`
    async fn range_query(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<QueryResponse, PromQLError>;
}

/// HTTP client for a Prometheus-compatible query API
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl PrometheusClient {
    /// Create a client from configuration
    pub fn new(config: &PrometheusConfig) -> Result<Self, PromQLError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = &config.bearer_token {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|e| PromQLError::ClientInit(e.to_string()))?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PromQLError::ClientInit(e.to_string()))?;

        let base_url = reqwest::Url::parse(&config.url)
            .map_err(|e| PromQLError::ClientInit(format!("invalid url '{}': {e}", config.url)))?;

        Ok(Self {
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            timeout: config.timeout,
            http,
        })
    }

    /// Override the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn execute(
        &self,
        path: &str,
        query: &str,
        params: Vec<(&'static str, String)>,
    ) -> Result<QueryResponse, PromQLError> {
        let url = format!("{}{path}", self.base_url);
        let mut form = vec![
            ("query", query.to_string()),
            ("timeout", self.timeout.as_secs_f64().to_string()),
        ];
        form.extend(params);

        log::debug!("POST {url} promQL:{query}");
        let resp = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.transport_error(query, e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| self.transport_error(query, e))?;

        decode_response(query, status, &body)
    }

    fn transport_error(&self, query: &str, source: reqwest::Error) -> PromQLError {
        if source.is_timeout() {
            PromQLError::Timeout {
                query: query.to_string(),
                timeout: self.timeout,
            }
        } else {
            log::error!("err:{source}");
            PromQLError::Transport {
                query: query.to_string(),
                source,
            }
        }
    }
}

#[async_trait]
impl QueryExecutor for PrometheusClient {
    async fn instant_query(
        &self,
        query: &str,
        time: DateTime<Utc>,
    ) -> Result<QueryResponse, PromQLError> {
        self.execute(INSTANT_QUERY_PATH, query, vec![("time", format_time(time))])
            .await
    }

    async fn range_query(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<QueryResponse, PromQLError> {
        let params = vec![
            ("start", format_time(start)),
            ("end", format_time(end)),
            ("step", step.as_secs_f64().to_string()),
        ];
        self.execute(RANGE_QUERY_PATH, query, params).await
    }
}

/// Return the process-wide client, constructing it on first use
///
/// Only the first successful call's configuration is used; later callers get
/// the same client whatever they pass.
pub fn shared_client(config: &PrometheusConfig) -> Result<Arc<PrometheusClient>, PromQLError> {
    SHARED_CLIENT
        .get_or_try_init(|| PrometheusClient::new(config).map(Arc::new))
        .cloned()
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Envelope shared by all Prometheus API responses
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(rename = "errorType", default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    #[serde(rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: serde_json::Value,
}

fn decode_response(
    query: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> Result<QueryResponse, PromQLError> {
    let envelope: ApiResponse = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => {
            return Err(PromQLError::Backend {
                query: query.to_string(),
                error_type: status.to_string(),
                message: body.trim().to_string(),
            });
        }
        Err(e) => {
            return Err(PromQLError::Decode {
                query: query.to_string(),
                reason: e.to_string(),
            });
        }
    };

    if !envelope.warnings.is_empty() {
        log::warn!("Warnings: {:?}", envelope.warnings);
    }

    if envelope.status != "success" {
        return Err(PromQLError::Backend {
            query: query.to_string(),
            error_type: envelope.error_type.unwrap_or_else(|| status.to_string()),
            message: envelope.error.unwrap_or_default(),
        });
    }

    let data = envelope.data.ok_or_else(|| PromQLError::Decode {
        query: query.to_string(),
        reason: "missing data field".to_string(),
    })?;

    let result = BackendResult::from_api_data(&data.result_type, data.result).map_err(|e| {
        PromQLError::Decode {
            query: query.to_string(),
            reason: e.to_string(),
        }
    })?;

    Ok(QueryResponse {
        result,
        warnings: envelope.warnings,
    })
}
