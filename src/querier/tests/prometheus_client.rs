use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Form, Json, Router,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
    routing::post,
};
use chrono::{TimeZone, Utc};
use common::config::PrometheusConfig;
use querier::query::promql::{
    LabelMatchers, MetricsQuerier, PrometheusClient, PromQLError, QueryExecutor, QuerySpec,
    RangeFunction, ResultsType,
};
use serde_json::json;
use tokio::net::TcpListener;

/// Echo the received form parameters and auth header back as the series labels
async fn instant(
    headers: HeaderMap,
    Form(mut params): Form<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    if let Some(auth) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        params.insert("authorization".to_string(), auth.to_string());
    }
    Json(json!({
        "status": "success",
        "data": {
            "resultType": "vector",
            "result": [
                {"metric": params, "value": [1700000000.5, "42"]},
                {"metric": {"instance": "b"}, "value": [1700000000.5, "7"]},
                {"metric": {"instance": "c"}, "value": [1700000000.5, "NaN"]}
            ]
        },
        "warnings": ["results truncated"]
    }))
}

async fn range(Form(params): Form<HashMap<String, String>>) -> Json<serde_json::Value> {
    let series = |instance: &str| {
        json!({
            "metric": {"instance": instance, "step": params.get("step")},
            "values": [[1700000000, "1"], [1700000060, "2"], [1700000120, "3"]]
        })
    };
    Json(json!({
        "status": "success",
        "data": {"resultType": "matrix", "result": [series("a"), series("b")]}
    }))
}

async fn rejected() -> impl IntoResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "status": "error",
            "errorType": "bad_data",
            "error": "invalid parameter \"query\": 1:5: parse error"
        })),
    )
}

async fn slow() -> Json<serde_json::Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({"status": "success", "data": {"resultType": "scalar", "result": [0, "1"]}}))
}

async fn scalar() -> Json<serde_json::Value> {
    Json(json!({"status": "success", "data": {"resultType": "scalar", "result": [1700000000, "1"]}}))
}

async fn start_fake_prometheus(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr, path_prefix: &str) -> PrometheusClient {
    let config = PrometheusConfig {
        url: format!("http://{addr}{path_prefix}"),
        timeout: Duration::from_secs(5),
        bearer_token: Some("token".to_string()),
    };
    PrometheusClient::new(&config).unwrap()
}

fn spec() -> QuerySpec {
    QuerySpec::new("cpu")
        .with_matchers(LabelMatchers::new().must("job", "api"))
        .with_range(Some(RangeFunction::Rate), "5m")
}

#[tokio::test]
async fn test_instant_query_sends_rendered_query() {
    let addr = start_fake_prometheus(Router::new().route("/api/v1/query", post(instant))).await;
    let querier = MetricsQuerier::new(Arc::new(client_for(addr, "")));

    let time = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let universal = querier.query(&spec(), time).await.unwrap();

    assert_eq!(universal.results_type, ResultsType::Vector);
    assert_eq!(universal.results_len, 3);
    for entry in &universal.results {
        assert_eq!(entry.values_len, 1);
    }

    let echoed = &universal.results[0].lables;
    assert_eq!(
        echoed.get("query").map(String::as_str),
        Some(r#"rate(cpu{job="api",}[5m])"#)
    );
    assert_eq!(
        echoed.get("time").map(String::as_str),
        Some("2023-11-14T22:13:20.000Z")
    );
    assert_eq!(
        echoed.get("authorization").map(String::as_str),
        Some("Bearer token")
    );
    assert_eq!(universal.results[0].values.get(&1_700_000_000), Some(&42.0));
    assert!(universal.results[2].values[&1_700_000_000].is_nan());
}

#[tokio::test]
async fn test_range_query_normalizes_matrix() {
    let addr =
        start_fake_prometheus(Router::new().route("/prom/api/v1/query_range", post(range))).await;
    let querier = MetricsQuerier::new(Arc::new(client_for(addr, "/prom")));

    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let end = Utc.timestamp_opt(1_700_000_120, 0).unwrap();
    let universal = querier
        .query_range(&spec(), start, end, Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(universal.results_type, ResultsType::Matrix);
    assert_eq!(universal.results_len, 2);
    for entry in &universal.results {
        assert_eq!(entry.values_len, 3);
        assert_eq!(entry.lables.get("step").map(String::as_str), Some("60"));
    }
}

#[tokio::test]
async fn test_scalar_result_becomes_placeholder() {
    let addr = start_fake_prometheus(Router::new().route("/api/v1/query", post(scalar))).await;
    let client = client_for(addr, "");

    let response = client.instant_query("1", Utc::now()).await.unwrap();
    let universal = querier::query::promql::normalize(response.result);

    assert_eq!(universal.results_type, ResultsType::Others);
    assert_eq!(universal.results_len, 1);
    assert!(universal.results[0].values.is_empty());
}

#[tokio::test]
async fn test_backend_error_carries_query() {
    let addr = start_fake_prometheus(Router::new().route("/api/v1/query", post(rejected))).await;
    let client = client_for(addr, "");

    let err = client.instant_query("cpu{", Utc::now()).await.unwrap_err();
    match err {
        PromQLError::Backend {
            query, error_type, ..
        } => {
            assert_eq!(query, "cpu{");
            assert_eq!(error_type, "bad_data");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_surfaces_as_error() {
    let addr = start_fake_prometheus(Router::new().route("/api/v1/query", post(slow))).await;
    let client = client_for(addr, "").with_timeout(Duration::from_millis(200));

    let err = client.instant_query("up{}", Utc::now()).await.unwrap_err();
    match err {
        PromQLError::Timeout { query, timeout } => {
            assert_eq!(query, "up{}");
            assert_eq!(timeout, Duration::from_millis(200));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Bind and drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(addr, "");
    let err = client.instant_query("up{}", Utc::now()).await.unwrap_err();
    assert!(matches!(err, PromQLError::Transport { .. }));
    assert_eq!(err.query(), Some("up{}"));
}
