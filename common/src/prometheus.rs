//! Fetch histogram buckets from the Prometheus HTTP API.

use crate::REQUEST_TIMEOUT_SECS;
use crate::buckets::BucketSample;
use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use log::{debug, warn};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use std::collections::HashMap;
use std::{thread, time::Duration};

/// Response envelope of `/api/v1/query`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    status: String,
    data: Option<QueryData>,
    error_type: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    result_type: String,
    result: Vec<VectorSample>,
}

/// One series of an instant vector: its labels and `[timestamp, "value"]`.
#[derive(Debug, Deserialize)]
struct VectorSample {
    metric: HashMap<String, String>,
    value: Option<(f64, String)>,
}

/// Determine if an error is worth retrying.
fn is_retryable_error(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_request()
}

fn error_type_str(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection"
    } else if e.is_request() {
        "request/DNS"
    } else if e.is_body() {
        "body"
    } else if e.is_decode() {
        "decode"
    } else {
        "unknown"
    }
}

/// Send a request, retrying network errors and 5xx responses with exponential backoff.
fn retry_request<F>(request_fn: F, max_retries: u32) -> Result<Response>
where
    F: Fn() -> Result<Response, reqwest::Error>,
{
    let mut attempts = 0;

    loop {
        attempts += 1;

        match request_fn() {
            Ok(response) => {
                if response.status().is_server_error() && attempts < max_retries {
                    let sleep_secs = 2_u64.pow(attempts.saturating_sub(1));
                    let status = response.status();
                    let error_msg = response.text().unwrap_or_default();
                    warn!(
                        "Server error ({status} {error_msg}), retrying in {sleep_secs} seconds... (attempt {attempts}/{max_retries})"
                    );
                    thread::sleep(Duration::from_secs(sleep_secs));
                    continue;
                }
                if !response.status().is_success() {
                    let status = response.status();
                    let msg = response
                        .text()
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    bail!("Prometheus returned an error ({status}) after {attempts} attempts: {msg}");
                }
                return Ok(response);
            }
            Err(e) => {
                if is_retryable_error(&e) && attempts < max_retries {
                    let sleep_secs = 2_u64.pow(attempts.saturating_sub(1));
                    warn!(
                        "Network error ({}), retrying in {} seconds... (attempt {}/{}): {}",
                        error_type_str(&e),
                        sleep_secs,
                        attempts,
                        max_retries,
                        e
                    );
                    thread::sleep(Duration::from_secs(sleep_secs));
                    continue;
                }
                return Err(anyhow!(
                    "Network error ({}) after {attempts} attempts: {e}",
                    error_type_str(&e)
                ));
            }
        }
    }
}

/// Endpoint for instant queries on the given server.
pub fn instant_query_url(prometheus_url: &str) -> String {
    format!("{}/api/v1/query", prometheus_url.trim_end_matches('/'))
}

/// Wrap a selector so the query returns the latest value within the last year.
pub fn last_over_time(query: &str) -> String {
    format!("last_over_time({query}[1y])")
}

/// Parse a bucket bound, including Prometheus' spelling of infinity.
///
/// # Errors
/// Returns an error if the value is not a number.
pub fn parse_le(value: &str) -> Result<f64> {
    match value {
        "+Inf" | "Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        _ => value
            .parse::<f64>()
            .with_context(|| format!("Invalid bucket bound: {value}")),
    }
}

/// Extract bucket samples from a decoded query response.
fn buckets_from_response(response: QueryResponse) -> Result<Vec<BucketSample>> {
    if response.status != "success" {
        bail!(
            "Query failed ({}): {}",
            response.error_type.unwrap_or_default(),
            response.error.unwrap_or_default()
        );
    }
    let data = response
        .data
        .ok_or_else(|| anyhow!("Query succeeded but returned no data"))?;
    if data.result_type != "vector" {
        bail!("Expected an instant vector, got {}", data.result_type);
    }

    let mut samples = Vec::with_capacity(data.result.len());
    for series in data.result {
        let Some(le) = series.metric.get("le") else {
            warn!("Skipping series without an le label: {:?}", series.metric);
            continue;
        };
        let (_, value) = series
            .value
            .ok_or_else(|| anyhow!("Series {:?} has no value", series.metric))?;
        samples.push(BucketSample {
            le: parse_le(le)?,
            count: value
                .parse::<f64>()
                .with_context(|| format!("Invalid sample value: {value}"))?,
        });
    }
    Ok(samples)
}

/// Fetch the latest cumulative bucket counts for a histogram selector.
///
/// # Errors
/// Returns an error if the request fails after all retries, the server reports an error, or
/// the response cannot be decoded.
pub fn query_last_over_time(
    prometheus_url: &str,
    query: &str,
    max_retries: u32,
) -> Result<Vec<BucketSample>> {
    let url = instant_query_url(prometheus_url);
    let query = last_over_time(query);
    #[allow(clippy::cast_precision_loss)]
    let time = format!("{:.3}", Utc::now().timestamp_millis() as f64 / 1000.0);
    debug!("GET {url}?query={query}&time={time}");

    let client = Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .context("Failed to build HTTP client")?;

    let response = retry_request(
        || {
            client
                .get(&url)
                .query(&[("query", query.as_str()), ("time", time.as_str())])
                .send()
        },
        max_retries,
    )?;
    let decoded = response
        .json::<QueryResponse>()
        .context("Failed to deserialize Prometheus response")?;
    buckets_from_response(decoded)
}
