//! Produce the chart and description files of the analysis.

use crate::buckets::{Bucket, bins, clean_data, weighted_histogram};
use crate::cardinality::{customer_goodness_of_fit, product_goodness_of_fit};
use crate::chi_square::{GoodnessOfFit, format_table};
use crate::describe::{DEFAULT_PERCENTILES, Summary};
use crate::mongo::{self, CUSTOMERS, Mode, STOCK_ITEMS};
use crate::plot::{Labels, draw_histogram, draw_value_histogram};
use crate::prometheus::query_last_over_time;
use crate::LATENCY_PERCENTILES;
use anyhow::{Context, Result, bail};
use log::{error, info, warn};
use mongodb::sync::Database;
use rayon::prelude::*;
use simple_tqdm::ParTqdm;
use std::fs;
use std::path::{Path, PathBuf};

const FREQUENCY_LABEL: &str = "Absolute frequency";

/// Queries whose latency is charted individually.
pub const QUERIES: [&str; 4] = [
    "warehouse_revenue",
    "product_availability",
    "find_one_customer",
    "find_warehouses_for_order",
];

/// Collections whose reads and writes are charted individually.
pub const COLLECTIONS: [&str; 5] = ["customers", "orders", "stock_items", "products", "warehouses"];

const TRANSACTION_METRIC: &str = "transaction_duration_milliseconds_bucket";
const DATABASE_METRIC: &str = "database_duration_milliseconds_bucket";

/// Render the description file of a cardinality check.
pub fn format_description(
    summary: Option<&Summary>,
    collection: &str,
    count: u64,
    fit: &Result<GoodnessOfFit>,
) -> String {
    let mut out = match summary {
        Some(summary) => format!("{summary}\n"),
        None => "empty dataset\n".to_string(),
    };
    out.push_str(&format!("db.{collection}.count(): {count}\n"));
    match fit {
        Ok(fit) => {
            out.push_str(&format!("goodness of fit: {fit}\n"));
            out.push_str(&format_table(&fit.table));
        }
        Err(e) => out.push_str(&format!("goodness of fit: failed: {e:#}\n")),
    }
    out
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(values: &[u64]) -> Vec<f64> {
    values.iter().map(|v| *v as f64).collect()
}

/// Chart and test one cardinality of the dataset.
fn cardinality_section(
    target_dir: &Path,
    name: &str,
    x_label: &str,
    values: &[u64],
    collection: &str,
    count: u64,
    fit: impl FnOnce(&[u64], u64) -> Result<GoodnessOfFit>,
) -> Result<()> {
    let as_float = as_f64(values);
    draw_value_histogram(
        &target_dir.join(format!("{name}.svg")),
        &as_float,
        Labels {
            x: x_label,
            y: FREQUENCY_LABEL,
        },
    )?;

    let summary = Summary::from_values(&as_float, &DEFAULT_PERCENTILES);
    let fit = fit(values, count);
    match &fit {
        Ok(fit) => info!("{name} goodness of fit: {fit}"),
        Err(e) => warn!("{name} goodness of fit failed: {e:#}"),
    }

    let path = target_dir.join(format!("{name}_description.txt"));
    fs::write(
        &path,
        format_description(summary.as_ref(), collection, count, &fit),
    )
    .with_context(|| format!("Failed to write {}", path.display()))
}

/// Check products per stock item and orders per customer against their expected distributions.
///
/// # Errors
/// Returns an error if the database cannot be read or a file cannot be written.
pub fn cardinality_report(db: &Database, target_dir: &Path, mode: Mode) -> Result<()> {
    fs::create_dir_all(target_dir)
        .with_context(|| format!("Failed to create {}", target_dir.display()))?;

    let product_counts = mongo::product_occurrences(db, mode)?;
    let n_stock_items = mongo::count_documents(db, STOCK_ITEMS)?;
    info!(
        "{} referenced products over {n_stock_items} stock items",
        product_counts.len()
    );
    cardinality_section(
        target_dir,
        "product_occurrences",
        "Number of references to a product",
        &product_counts,
        STOCK_ITEMS,
        n_stock_items,
        product_goodness_of_fit,
    )?;

    let orders = mongo::customer_referenced_orders(db, mode)?;
    let n_customers = mongo::count_documents(db, CUSTOMERS)?;
    info!("{n_customers} customers");
    cardinality_section(
        target_dir,
        "customer_referenced_orders",
        "Number of referenced orders per customer",
        &orders,
        CUSTOMERS,
        n_customers,
        customer_goodness_of_fit,
    )
}

/// Write the summary and chart of cleaned histogram buckets.
///
/// The summary is written next to the image with a `.txt` extension.
///
/// # Errors
/// Returns an error if a file cannot be written.
pub fn render_histogram(buckets: &[Bucket], image_path: &Path) -> Result<()> {
    let weighted: Vec<(f64, f64)> = buckets.iter().map(|b| (b.le, b.count)).collect();
    let description = match Summary::from_weighted(&weighted, &LATENCY_PERCENTILES) {
        Some(summary) => format!("{summary}\n"),
        None => "empty dataset\n".to_string(),
    };
    let text_path = image_path.with_extension("txt");
    fs::write(&text_path, description)
        .with_context(|| format!("Failed to write {}", text_path.display()))?;

    let edges = bins(buckets);
    let heights = weighted_histogram(buckets, &edges);
    draw_histogram(
        image_path,
        &edges,
        &heights,
        Labels {
            x: "Duration in ms",
            y: FREQUENCY_LABEL,
        },
        true,
    )
}

/// Fetch one latency histogram and render it.
///
/// # Errors
/// Returns an error if Prometheus cannot be queried or a file cannot be written.
pub fn histogram_report(
    prometheus_url: &str,
    query: &str,
    image_path: &Path,
    max_retries: u32,
) -> Result<()> {
    let samples = query_last_over_time(prometheus_url, query, max_retries)?;
    let buckets = clean_data(&samples);
    if buckets.is_empty() {
        info!("No buckets returned for {query}");
    }
    render_histogram(&buckets, image_path)
}

/// A latency chart to produce: which histogram to query and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyJob {
    pub query: String,
    pub file_name: String,
}

fn job(metric: &str, selector: &str, version: &str, file_name: String) -> LatencyJob {
    LatencyJob {
        query: format!("{metric}{{{selector},otel_scope_version=~\"{version}\"}}"),
        file_name,
    }
}

/// Every latency chart of a benchmark version.
pub fn latency_jobs(version: &str) -> Vec<LatencyJob> {
    let mut jobs = Vec::new();
    for query in QUERIES {
        let selector = format!("operation=\"{query}\",phase=\"TRANSACTION\"");
        jobs.push(job(
            TRANSACTION_METRIC,
            &selector,
            version,
            format!("transaction_{query}.svg"),
        ));
        jobs.push(job(
            DATABASE_METRIC,
            &selector,
            version,
            format!("database_{query}.svg"),
        ));
    }

    for collection in COLLECTIONS {
        let write = format!("collection=\"{collection}\",operation=\"WRITE\",phase=\"TRANSACTION\"");
        let read = format!("collection=\"{collection}\",operation=\"READ\",phase=\"TRANSACTION\"");
        jobs.push(job(
            TRANSACTION_METRIC,
            &write,
            version,
            format!("transaction_{collection}_write.svg"),
        ));
        jobs.push(job(
            DATABASE_METRIC,
            &write,
            version,
            format!("database_{collection}_write.svg"),
        ));
        jobs.push(job(
            DATABASE_METRIC,
            &read,
            version,
            format!("database_{collection}_read.svg"),
        ));
    }

    let oltp = "operation!=\"warehouse_revenue\",phase=\"TRANSACTION\"";
    jobs.push(job(DATABASE_METRIC, oltp, version, "database_oltp.svg".to_string()));
    jobs.push(job(
        TRANSACTION_METRIC,
        oltp,
        version,
        "transaction_oltp.svg".to_string(),
    ));

    let load = "phase=\"LOAD\"";
    jobs.push(job(DATABASE_METRIC, load, version, "database_load.svg".to_string()));
    jobs.push(job(
        TRANSACTION_METRIC,
        load,
        version,
        "transaction_load.svg".to_string(),
    ));

    jobs
}

/// Produce every latency chart of a benchmark version.
/// A failing chart does not stop the others.
///
/// # Errors
/// Returns an error if the target directory cannot be created or any chart failed.
pub fn latency_report(
    prometheus_url: &str,
    target_dir: &Path,
    version: &str,
    max_retries: u32,
    quiet: bool,
) -> Result<()> {
    fs::create_dir_all(target_dir)
        .with_context(|| format!("Failed to create {}", target_dir.display()))?;

    let jobs = latency_jobs(version);
    let tqdm_config = simple_tqdm::Config::new()
        .with_unit("charts".to_string())
        .with_disable(quiet);

    let failures: Vec<(PathBuf, anyhow::Error)> = jobs
        .par_iter()
        .tqdm_config(tqdm_config)
        .filter_map(|job| {
            let path = target_dir.join(&job.file_name);
            histogram_report(prometheus_url, &job.query, &path, max_retries)
                .err()
                .map(|e| (path, e))
        })
        .collect();

    for (path, e) in &failures {
        error!("Failed to produce {}: {e:#}", path.display());
    }
    if !failures.is_empty() {
        bail!("{} of {} charts failed", failures.len(), jobs.len());
    }
    info!("Wrote {} charts to {}", jobs.len(), target_dir.display());
    Ok(())
}
