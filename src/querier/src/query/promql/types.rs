//! Structured description of a PromQL query
//!
//! A [`QuerySpec`] is rendered into query text by [`super::builder::render`].
//! All types here are plain values: cloning is cheap enough for per-request use
//! and nothing holds external resources.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::builder::quote_meta;

/// Standard range windows used by dashboards and alert rules
pub mod window {
    pub const ONE_MINUTE: &str = "1m";
    pub const FIVE_MINUTES: &str = "5m";
    pub const ONE_HOUR: &str = "1h";
    pub const FIVE_HOURS: &str = "5h";
    pub const ONE_DAY: &str = "1d";
    pub const ONE_WEEK: &str = "7d";
    pub const ONE_MONTH: &str = "1M";
}

/// Range functions that can wrap a range selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeFunction {
    Increase,
    Rate,
}

impl fmt::Display for RangeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Increase => write!(f, "increase"),
            Self::Rate => write!(f, "rate"),
        }
    }
}

/// Aggregation operators supported by the builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationOp {
    Sum,
    Max,
    Min,
    Avg,
    TopK,
    BottomK,
}

impl fmt::Display for AggregationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sum => write!(f, "sum"),
            Self::Max => write!(f, "max"),
            Self::Min => write!(f, "min"),
            Self::Avg => write!(f, "avg"),
            Self::TopK => write!(f, "topk"),
            Self::BottomK => write!(f, "bottomk"),
        }
    }
}

/// Label matcher types matching Prometheus semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherOp {
    /// Exact string match (=)
    Equal,
    /// Not equal (!=)
    NotEqual,
    /// Regex match (=~)
    RegexMatch,
    /// Regex not match (!~)
    RegexNotMatch,
}

impl fmt::Display for MatcherOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::NotEqual => write!(f, "!="),
            Self::RegexMatch => write!(f, "=~"),
            Self::RegexNotMatch => write!(f, "!~"),
        }
    }
}

/// The five classes of label constraints a selector can carry
///
/// Each class maps a label name to its value. Maps are ordered by label name,
/// which keeps rendered selectors stable across runs. Entries with an empty
/// value are kept but never rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelMatchers {
    /// `name="value"`
    pub must: BTreeMap<String, String>,
    /// `name!="value"`
    pub must_not: BTreeMap<String, String>,
    /// `name=~"pattern"`
    pub must_regex: BTreeMap<String, String>,
    /// `name=~"^(?:alternation)$"`, a set-membership test
    pub must_regex_in: BTreeMap<String, String>,
    /// `name!~"pattern"`
    pub must_not_regex: BTreeMap<String, String>,
}

impl LabelMatchers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.must.insert(name.into(), value.into());
        self
    }

    pub fn must_not(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.must_not.insert(name.into(), value.into());
        self
    }

    pub fn must_regex(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.must_regex.insert(name.into(), pattern.into());
        self
    }

    /// Add a pre-joined alternation such as `a|b|c` to the regex-in class
    pub fn must_regex_in(mut self, name: impl Into<String>, alternation: impl Into<String>) -> Self {
        self.must_regex_in.insert(name.into(), alternation.into());
        self
    }

    pub fn must_not_regex(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.must_not_regex.insert(name.into(), pattern.into());
        self
    }

    /// Require the label to equal one of `values`
    ///
    /// Each literal is escaped with [`quote_meta`] before being joined with `|`,
    /// so values containing regex metacharacters match only themselves.
    pub fn must_match_any<I, S>(self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternation = values
            .into_iter()
            .map(|v| quote_meta(v.as_ref()))
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join("|");
        self.must_regex_in(name, alternation)
    }

    /// True if no entry would produce a clause
    pub fn is_empty(&self) -> bool {
        self.classes()
            .iter()
            .all(|(map, _, _)| map.values().all(|v| v.is_empty()))
    }

    /// The matcher classes in rendering order with their operator and
    /// whether the value is wrapped as an anchored alternation
    pub(crate) fn classes(&self) -> [(&BTreeMap<String, String>, MatcherOp, bool); 5] {
        [
            (&self.must, MatcherOp::Equal, false),
            (&self.must_not, MatcherOp::NotEqual, false),
            (&self.must_regex, MatcherOp::RegexMatch, false),
            (&self.must_regex_in, MatcherOp::RegexMatch, true),
            (&self.must_not_regex, MatcherOp::RegexNotMatch, false),
        ]
    }
}

/// Nested range query wrapped around the already-built expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subquery {
    pub function: RangeFunction,
    pub window: String,
    pub resolution: String,
}

/// Structured description of a query against a single metric
///
/// `alternates` are OR-ed onto the rendered expression in order; each
/// alternate may carry its own alternates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Metric name, required when loading a spec
    pub name: String,
    #[serde(default)]
    pub matchers: LabelMatchers,
    #[serde(default)]
    pub range_function: Option<RangeFunction>,
    /// Range window such as `5m`, rendered as `[5m]`
    #[serde(default)]
    pub range_window: Option<String>,
    #[serde(default)]
    pub offset: Option<String>,
    #[serde(default)]
    pub aggregation: Option<AggregationOp>,
    /// Labels for the `by(...)` clause, in order
    #[serde(default)]
    pub aggregate_by: Vec<String>,
    #[serde(default)]
    pub subquery: Option<Subquery>,
    #[serde(rename = "or", default)]
    pub alternates: Vec<QuerySpec>,
}

impl QuerySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_matchers(mut self, matchers: LabelMatchers) -> Self {
        self.matchers = matchers;
        self
    }

    /// Select a range window, optionally wrapped in a range function
    pub fn with_range(mut self, function: Option<RangeFunction>, window: impl Into<String>) -> Self {
        self.range_function = function;
        self.range_window = Some(window.into());
        self
    }

    pub fn with_offset(mut self, offset: impl Into<String>) -> Self {
        self.offset = Some(offset.into());
        self
    }

    pub fn with_aggregation<I, S>(mut self, op: AggregationOp, by: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aggregation = Some(op);
        self.aggregate_by = by.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_subquery(
        mut self,
        function: RangeFunction,
        window: impl Into<String>,
        resolution: impl Into<String>,
    ) -> Self {
        self.subquery = Some(Subquery {
            function,
            window: window.into(),
            resolution: resolution.into(),
        });
        self
    }

    /// Append an alternate joined with `or`
    pub fn or(mut self, alternate: QuerySpec) -> Self {
        self.alternates.push(alternate);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matcher_op_display() {
        assert_eq!(format!("{}", MatcherOp::Equal), "=");
        assert_eq!(format!("{}", MatcherOp::NotEqual), "!=");
        assert_eq!(format!("{}", MatcherOp::RegexMatch), "=~");
        assert_eq!(format!("{}", MatcherOp::RegexNotMatch), "!~");
    }

    #[test]
    fn test_aggregation_op_display() {
        assert_eq!(format!("{}", AggregationOp::Sum), "sum");
        assert_eq!(format!("{}", AggregationOp::TopK), "topk");
        assert_eq!(format!("{}", AggregationOp::BottomK), "bottomk");
    }

    #[test]
    fn test_range_function_display() {
        assert_eq!(RangeFunction::Increase.to_string(), "increase");
        assert_eq!(RangeFunction::Rate.to_string(), "rate");
    }

    #[test]
    fn test_must_match_any_escapes_and_joins() {
        let matchers = LabelMatchers::new().must_match_any("host", ["web-1", "db.local", ""]);
        assert_eq!(
            matchers.must_regex_in.get("host").map(String::as_str),
            Some(r"web\\-1|db\\.local")
        );
    }

    #[test]
    fn test_is_empty_ignores_blank_values() {
        assert!(LabelMatchers::new().is_empty());
        assert!(LabelMatchers::new().must("job", "").is_empty());
        assert!(!LabelMatchers::new().must_not("job", "api").is_empty());
    }

    #[test]
    fn test_spec_deserializes_from_toml() {
        let spec: QuerySpec = toml::from_str(
            r#"
            name = "http_requests_total"
            range_function = "rate"
            range_window = "5m"
            aggregation = "sum"
            aggregate_by = ["job"]

            [matchers.must]
            env = "prod"

            [[or]]
            name = "http_requests_legacy_total"
            "#,
        )
        .unwrap();

        assert_eq!(spec.name, "http_requests_total");
        assert_eq!(spec.range_function, Some(RangeFunction::Rate));
        assert_eq!(spec.aggregation, Some(AggregationOp::Sum));
        assert_eq!(spec.matchers.must.get("env").map(String::as_str), Some("prod"));
        assert_eq!(spec.alternates.len(), 1);
        assert_eq!(spec.alternates[0].name, "http_requests_legacy_total");
    }
}
