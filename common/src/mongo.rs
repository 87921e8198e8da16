//! Read the cardinalities of the logistic benchmark dataset from MongoDB.

use anyhow::{Context, Result, anyhow, bail};
use clap::ValueEnum;
use log::{debug, info};
use mongodb::bson::{Bson, Document, doc};
use mongodb::sync::{Client, Database};
use std::fmt;

pub const STOCK_ITEMS: &str = "stock_items";
pub const CUSTOMERS: &str = "customers";

/// How the benchmark stored relationships between documents.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Documents hold the ids of related documents.
    Referencing,
    /// Related documents are embedded as subdocuments.
    Embedding,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Mode::Referencing => write!(f, "referencing"),
            Mode::Embedding => write!(f, "embedding"),
        }
    }
}

/// Group stock items by the product they belong to and count them.
pub fn product_count_pipeline(mode: Mode) -> Vec<Document> {
    let key = match mode {
        Mode::Referencing => "$product_id",
        Mode::Embedding => "$product._id",
    };
    vec![doc! {
        "$group": {
            "_id": key,
            "count": { "$sum": 1 },
        }
    }]
}

/// Project every customer onto the number of orders it holds.
pub fn customer_orders_pipeline(mode: Mode) -> Vec<Document> {
    let orders = match mode {
        Mode::Referencing => "$order_ids",
        Mode::Embedding => "$orders",
    };
    vec![doc! {
        "$project": {
            "_id": 0,
            "referenced_objects": { "$size": orders },
        }
    }]
}

/// The benchmark names its database after the run id, so pick the last all-digit name.
pub fn pick_benchmark_database(names: &[String]) -> Option<&str> {
    names
        .iter()
        .rfind(|name| !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()))
        .map(String::as_str)
}

/// Connect to the database holding the benchmark dataset.
///
/// # Errors
/// Returns an error if the databases cannot be listed or none of them is a benchmark database.
pub fn find_benchmark_database(client: &Client) -> Result<Database> {
    let names = client
        .list_database_names()
        .run()
        .context("Failed to list databases")?;
    for name in &names {
        info!("Found database {name}");
    }
    let name = pick_benchmark_database(&names)
        .ok_or_else(|| anyhow!("No benchmark database found among {names:?}"))?;
    info!("Using database {name}");
    Ok(client.database(name))
}

/// Read a non-negative integer field of an aggregation result.
fn get_count(document: &Document, key: &str) -> Result<u64> {
    match document.get(key) {
        Some(Bson::Int32(i)) => u64::try_from(*i).context("Negative count"),
        Some(Bson::Int64(i)) => u64::try_from(*i).context("Negative count"),
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(Bson::Double(d)) if *d >= 0.0 && d.fract() == 0.0 => Ok(*d as u64),
        Some(other) => bail!("Unexpected value for {key}: {other}"),
        None => bail!("Missing {key} in {document}"),
    }
}

fn aggregate_counts(
    db: &Database,
    collection: &str,
    pipeline: Vec<Document>,
    key: &str,
) -> Result<Vec<u64>> {
    debug!("Aggregating {collection}: {pipeline:?}");
    let cursor = db
        .collection::<Document>(collection)
        .aggregate(pipeline)
        .run()
        .with_context(|| format!("Failed to aggregate {collection}"))?;
    let mut counts = Vec::new();
    for document in cursor {
        let document = document.with_context(|| format!("Failed to read from {collection}"))?;
        counts.push(get_count(&document, key)?);
    }
    Ok(counts)
}

/// Number of stock items per referenced product.
///
/// # Errors
/// Returns an error if the aggregation fails or returns malformed documents.
pub fn product_occurrences(db: &Database, mode: Mode) -> Result<Vec<u64>> {
    aggregate_counts(db, STOCK_ITEMS, product_count_pipeline(mode), "count")
}

/// Number of orders per customer.
///
/// # Errors
/// Returns an error if the aggregation fails or returns malformed documents.
pub fn customer_referenced_orders(db: &Database, mode: Mode) -> Result<Vec<u64>> {
    aggregate_counts(
        db,
        CUSTOMERS,
        customer_orders_pipeline(mode),
        "referenced_objects",
    )
}

/// Count all documents in a collection.
///
/// # Errors
/// Returns an error if the count fails.
pub fn count_documents(db: &Database, collection: &str) -> Result<u64> {
    db.collection::<Document>(collection)
        .count_documents(doc! {})
        .run()
        .with_context(|| format!("Failed to count {collection}"))
}
