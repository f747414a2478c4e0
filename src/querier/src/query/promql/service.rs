//! Query a [`QuerySpec`] end to end and normalize the answer

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::builder::render;
use super::client::{QueryExecutor, QueryResponse};
use super::error::PromQLError;
use super::result::{Universal, normalize};
use super::types::QuerySpec;

/// Renders specs, runs them through an executor and normalizes the result
pub struct MetricsQuerier<E: QueryExecutor> {
    executor: Arc<E>,
}

impl<E: QueryExecutor> Clone for MetricsQuerier<E> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<E: QueryExecutor> MetricsQuerier<E> {
    pub fn new(executor: Arc<E>) -> Self {
        Self { executor }
    }

    /// Evaluate `spec` at `time`
    pub async fn query(
        &self,
        spec: &QuerySpec,
        time: DateTime<Utc>,
    ) -> Result<Universal, PromQLError> {
        let promql = render(spec);
        log::debug!("promQL:{promql}");

        let response = self.executor.instant_query(&promql, time).await?;
        Ok(finish(response))
    }

    /// Evaluate `spec` over `[start, end]` every `step`
    pub async fn query_range(
        &self,
        spec: &QuerySpec,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Universal, PromQLError> {
        let promql = render(spec);
        log::debug!("promQL:{promql}");

        let response = self
            .executor
            .range_query(&promql, start, end, step)
            .await?;
        Ok(finish(response))
    }
}

fn finish(response: QueryResponse) -> Universal {
    if !response.warnings.is_empty() {
        log::warn!("Warnings: {:?}", response.warnings);
    }
    log::debug!("result type: {}", response.result.type_name());
    normalize(response.result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::promql::client::MockQueryExecutor;
    use crate::query::promql::result::{BackendResult, ResultsType, SamplePair, Series};
    use crate::query::promql::types::{LabelMatchers, RangeFunction};
    use chrono::TimeZone;

    fn spec() -> QuerySpec {
        QuerySpec::new("cpu")
            .with_matchers(LabelMatchers::new().must("job", "api"))
            .with_range(Some(RangeFunction::Rate), "5m")
    }

    #[tokio::test]
    async fn test_query_renders_and_normalizes() {
        let time = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut executor = MockQueryExecutor::new();
        executor
            .expect_instant_query()
            .withf(move |query, t| {
                query.to_string() == r#"rate(cpu{job="api",}[5m])"# && *t == time
            })
            .times(1)
            .returning(|_, _| {
                Ok(QueryResponse {
                    result: BackendResult::Other,
                    warnings: vec!["partial data".to_string()],
                })
            });

        let querier = MetricsQuerier::new(Arc::new(executor));
        let universal = querier.query(&spec(), time).await.unwrap();

        assert_eq!(universal.results_type, ResultsType::Others);
        assert_eq!(universal.results_len, 1);
    }

    #[tokio::test]
    async fn test_query_range_passes_window() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let end = Utc.timestamp_opt(1_700_000_600, 0).unwrap();
        let step = Duration::from_secs(60);

        let mut executor = MockQueryExecutor::new();
        executor
            .expect_range_query()
            .withf(move |_, s, e, st| *s == start && *e == end && *st == step)
            .times(1)
            .returning(|_, _, _, _| {
                Ok(QueryResponse {
                    result: BackendResult::Matrix(vec![Series {
                        metric: Default::default(),
                        values: vec![
                            SamplePair::new(1_700_000_000_000, 1.0),
                            SamplePair::new(1_700_000_060_000, 2.0),
                        ],
                    }]),
                    warnings: vec![],
                })
            });

        let querier = MetricsQuerier::new(Arc::new(executor));
        let universal = querier.query_range(&spec(), start, end, step).await.unwrap();

        assert_eq!(universal.results_type, ResultsType::Matrix);
        assert_eq!(universal.results[0].values_len, 2);
    }

    #[tokio::test]
    async fn test_query_propagates_executor_error() {
        let mut executor = MockQueryExecutor::new();
        executor.expect_instant_query().returning(|query, _| {
            Err(PromQLError::Backend {
                query: query.to_string(),
                error_type: "execution".to_string(),
                message: "query timed out in expression evaluation".to_string(),
            })
        });

        let querier = MetricsQuerier::new(Arc::new(executor));
        let err = querier.query(&spec(), Utc::now()).await.unwrap_err();
        assert_eq!(err.query(), Some(r#"rate(cpu{job="api",}[5m])"#));
    }
}
