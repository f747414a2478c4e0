//! PromQL query support
//!
//! Turns a structured [`QuerySpec`] into PromQL text, runs it against a
//! Prometheus-compatible HTTP API and flattens the answer into [`Universal`].
//!
//! ```text
//! QuerySpec → builder::render → QueryExecutor → BackendResult → result::normalize → Universal
//! ```
//!
//! # Modules
//!
//! - [`types`] - query description: matchers, range, aggregation, subquery, `or` chain
//! - [`builder`] - rendering and regex escaping
//! - [`client`] - [`QueryExecutor`] trait and the HTTP implementation
//! - [`result`] - backend result shapes and normalization
//! - [`service`] - [`MetricsQuerier`], the end-to-end entry point
//! - [`error`] - error types
//!
//! # Example
//!
//! ```ignore
//! use querier::query::promql::*;
//!
//! let spec = QuerySpec::new("http_requests_total")
//!     .with_matchers(LabelMatchers::new().must("job", "api"))
//!     .with_range(Some(RangeFunction::Rate), window::FIVE_MINUTES)
//!     .with_aggregation(AggregationOp::Sum, ["instance"]);
//!
//! assert_eq!(
//!     render(&spec),
//!     r#"sum by(instance,)(rate(http_requests_total{job="api",}[5m])) "#
//! );
//!
//! let client = shared_client(&config.prometheus)?;
//! let universal = MetricsQuerier::new(client).query(&spec, Utc::now()).await?;
//! ```

pub mod builder;
pub mod client;
pub mod error;
pub mod result;
pub mod service;
pub mod types;

pub use builder::{escape_regex, quote_meta, render, render_single};
pub use client::{PrometheusClient, QueryExecutor, QueryResponse, shared_client};
pub use error::PromQLError;
pub use result::{
    BackendResult, Labels, ResultsType, Sample, SamplePair, Series, Universal, UniversalValues,
    normalize,
};
pub use service::MetricsQuerier;
pub use types::{
    AggregationOp, LabelMatchers, MatcherOp, QuerySpec, RangeFunction, Subquery, window,
};
