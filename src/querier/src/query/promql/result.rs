//! Backend query results and their normalized form
//!
//! The Prometheus HTTP API answers with one of several result shapes. They are
//! decoded into [`BackendResult`], a closed union of the shapes callers care
//! about, and then flattened by [`normalize`] into [`Universal`], which has the
//! same layout for instant and range queries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Label set identifying a series
pub type Labels = BTreeMap<String, String>;

/// A single `(timestamp, value)` sample
///
/// Decoded from the API's `[<unix seconds>, "<value>"]` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "(f64, String)")]
pub struct SamplePair {
    /// Timestamp in milliseconds since epoch
    pub timestamp: i64,
    pub value: f64,
}

impl SamplePair {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Timestamp in whole seconds since epoch
    pub fn unix_seconds(&self) -> i64 {
        self.timestamp / 1000
    }
}

impl TryFrom<(f64, String)> for SamplePair {
    type Error = String;

    fn try_from((seconds, value): (f64, String)) -> Result<Self, Self::Error> {
        Ok(Self {
            timestamp: (seconds * 1000.0).round() as i64,
            value: parse_sample_value(&value)?,
        })
    }
}

fn parse_sample_value(value: &str) -> Result<f64, String> {
    match value {
        "+Inf" | "Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        other => other
            .parse::<f64>()
            .map_err(|e| format!("invalid sample value '{other}': {e}")),
    }
}

/// A time series with all samples inside the queried window
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub metric: Labels,
    #[serde(default)]
    pub values: Vec<SamplePair>,
}

/// One sample per series at the evaluation instant
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sample {
    #[serde(default)]
    pub metric: Labels,
    pub value: SamplePair,
}

/// Result shapes returned by the backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendResult {
    Matrix(Vec<Series>),
    Vector(Vec<Sample>),
    /// Scalars, strings and any shape this crate does not model
    Other,
}

impl BackendResult {
    /// Decode the `data.result` payload for the given `data.resultType`
    pub fn from_api_data(
        result_type: &str,
        result: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        match result_type {
            "matrix" => Ok(Self::Matrix(serde_json::from_value(result)?)),
            "vector" => Ok(Self::Vector(serde_json::from_value(result)?)),
            _ => Ok(Self::Other),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Matrix(_) => "matrix",
            Self::Vector(_) => "vector",
            Self::Other => "others",
        }
    }
}

/// Shape tag of a [`Universal`] value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultsType {
    Matrix,
    Vector,
    Others,
}

/// Normalized query result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Universal {
    pub results_type: ResultsType,
    /// Always equal to `results.len()`
    pub results_len: usize,
    pub results: Vec<UniversalValues>,
}

/// Samples and labels of one series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniversalValues {
    /// Unix seconds to sample value
    pub values: BTreeMap<i64, f64>,
    /// Always equal to `values.len()`
    pub values_len: usize,
    pub lables: Labels,
}

impl UniversalValues {
    pub fn new(values: BTreeMap<i64, f64>, lables: Labels) -> Self {
        Self {
            values_len: values.len(),
            values,
            lables,
        }
    }
}

impl Universal {
    fn from_results(results_type: ResultsType, results: Vec<UniversalValues>) -> Self {
        Self {
            results_type,
            results_len: results.len(),
            results,
        }
    }
}

/// Flatten a backend result into the uniform [`Universal`] layout
///
/// Samples falling into the same second collapse into one entry, the later
/// sample winning. Unknown shapes produce a single empty placeholder entry.
pub fn normalize(raw: BackendResult) -> Universal {
    match raw {
        BackendResult::Matrix(series) => {
            let results = series
                .into_iter()
                .map(|s| {
                    let values = s
                        .values
                        .iter()
                        .map(|pair| (pair.unix_seconds(), pair.value))
                        .collect();
                    UniversalValues::new(values, s.metric)
                })
                .collect();
            Universal::from_results(ResultsType::Matrix, results)
        }
        BackendResult::Vector(samples) => {
            let results = samples
                .into_iter()
                .map(|s| {
                    let values = BTreeMap::from([(s.value.unix_seconds(), s.value.value)]);
                    UniversalValues::new(values, s.metric)
                })
                .collect();
            Universal::from_results(ResultsType::Vector, results)
        }
        BackendResult::Other => {
            Universal::from_results(ResultsType::Others, vec![UniversalValues::default()])
        }
    }
}
