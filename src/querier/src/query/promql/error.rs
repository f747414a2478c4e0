//! PromQL-specific error types

use std::time::Duration;

/// Errors that can occur while executing a rendered PromQL query
///
/// Every variant raised for a request carries the query text so failures can
/// be traced back to the [`QuerySpec`](super::QuerySpec) that produced them.
#[derive(Debug, thiserror::Error)]
pub enum PromQLError {
    /// The HTTP client could not be constructed
    #[error("Failed to create Prometheus client: {0}")]
    ClientInit(String),

    /// The request did not complete within the configured timeout
    #[error("Query timed out after {timeout:?}, promQL: {query}")]
    Timeout { query: String, timeout: Duration },

    /// Network or protocol failure while talking to the backend
    #[error("Query transport error: {source}, promQL: {query}")]
    Transport {
        query: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status
    #[error("Query rejected by backend ({error_type}): {message}, promQL: {query}")]
    Backend {
        query: String,
        error_type: String,
        message: String,
    },

    /// The response body could not be decoded
    #[error("Failed to decode query response: {reason}, promQL: {query}")]
    Decode { query: String, reason: String },
}

impl PromQLError {
    /// The query text that triggered the error, if any
    pub fn query(&self) -> Option<&str> {
        match self {
            Self::ClientInit(_) => None,
            Self::Timeout { query, .. }
            | Self::Transport { query, .. }
            | Self::Backend { query, .. }
            | Self::Decode { query, .. } => Some(query),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_carries_query() {
        let err = PromQLError::Backend {
            query: "up{}".to_string(),
            error_type: "bad_data".to_string(),
            message: "parse error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Query rejected by backend (bad_data): parse error, promQL: up{}"
        );
        assert_eq!(err.query(), Some("up{}"));
    }

    #[test]
    fn test_client_init_has_no_query() {
        let err = PromQLError::ClientInit("invalid url".to_string());
        assert!(err.query().is_none());
    }
}
