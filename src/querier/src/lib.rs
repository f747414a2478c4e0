//! Structured PromQL query building and result normalization

pub mod query;
