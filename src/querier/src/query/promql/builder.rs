//! Rendering of [`QuerySpec`] values into PromQL text
//!
//! The output is consumed verbatim by the backend, so the layout is fixed:
//! every label clause ends with a comma, the `by(...)` list keeps its trailing
//! comma and an aggregation is followed by a single space. For example
//!
//! ```text
//! sum by(job,)(rate(http_requests_total{env="prod",}[5m]))
//! ```
//!
//! Rendering never fails. A spec that makes no sense to the backend (a range
//! function without a window, say) still renders, and the backend rejects it.

use std::fmt::Write;

use super::types::{LabelMatchers, QuerySpec};

/// Escape regex metacharacters so `value` matches itself literally
pub fn escape_regex(value: &str) -> String {
    regex::escape(value)
}

/// Escape a literal for use inside a regex-class matcher value
///
/// Metacharacters are escaped first, then every backslash is doubled because
/// PromQL string literals consume one level of backslash escaping.
pub fn quote_meta(value: &str) -> String {
    escape_regex(value).replace('\\', r"\\")
}

/// Render a spec together with all of its `or` alternates
///
/// Alternates are visited depth-first in declaration order using an explicit
/// stack, so long chains do not grow the call stack.
pub fn render(spec: &QuerySpec) -> String {
    let mut query = render_single(spec);
    let mut pending: Vec<&QuerySpec> = spec.alternates.iter().rev().collect();

    while let Some(alternate) = pending.pop() {
        query.push_str(" or ");
        query.push_str(&render_single(alternate));
        pending.extend(alternate.alternates.iter().rev());
    }

    query
}

/// Render a spec without its `or` alternates
pub fn render_single(spec: &QuerySpec) -> String {
    let mut query = format!("{}{{{}}}", spec.name, render_label_clauses(&spec.matchers));

    if let Some(window) = &spec.range_window {
        let _ = write!(query, "[{window}]");
    }

    if let Some(offset) = &spec.offset {
        let _ = write!(query, " offset {offset}");
    }

    if let Some(function) = spec.range_function {
        query = format!("{function}({query})");
    }

    if let Some(sub) = &spec.subquery {
        query = format!(
            "{}({query})[{}:{}]",
            sub.function, sub.window, sub.resolution
        );
    }

    if let Some(op) = spec.aggregation {
        let by: String = spec
            .aggregate_by
            .iter()
            .map(|label| format!("{label},"))
            .collect();
        query = format!("{op} by({by})({query}) ");
    }

    query
}

/// Render the clauses between the selector braces, trailing comma included
fn render_label_clauses(matchers: &LabelMatchers) -> String {
    let mut clauses = String::new();

    for (entries, op, anchored) in matchers.classes() {
        for (name, value) in entries.iter().filter(|(_, v)| !v.is_empty()) {
            let _ = if anchored {
                write!(clauses, r#"{name}{op}"^(?:{value})$","#)
            } else {
                write!(clauses, r#"{name}{op}"{value}","#)
            };
        }
    }

    clauses
}
