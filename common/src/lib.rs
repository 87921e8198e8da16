//! A library with common utilities for analysing logistic benchmark data.

pub mod buckets;
pub mod cardinality;
pub mod chi_square;
pub mod describe;
pub mod mongo;
pub mod plot;
pub mod prometheus;
pub mod report;

pub const REQUEST_TIMEOUT_SECS: u64 = 30;
pub const REQUEST_MAX_RETRIES: u32 = 3;

/// Default Prometheus server the benchmark exports its metrics to.
pub const DEFAULT_PROMETHEUS_URL: &str = "http://localhost:9090";

/// Percentiles included in latency summaries.
pub const LATENCY_PERCENTILES: [f64; 6] = [0.25, 0.5, 0.75, 0.9, 0.99, 0.999];
