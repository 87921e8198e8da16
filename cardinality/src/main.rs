//! Check the cardinalities of a logistic benchmark dataset against their expected distributions.

#![warn(clippy::all, clippy::pedantic)]

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use logistic_common::mongo::{self, Mode};
use logistic_common::report::cardinality_report;
use mongodb::sync::Client;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The MongoDB connection string
    #[arg(env = "LOGISTIC_MONGODB_URI")]
    uri: String,

    /// The directory to write charts and descriptions to
    #[arg(env = "LOGISTIC_TARGET_DIR")]
    target_dir: PathBuf,

    /// How the benchmark stored relationships between documents
    #[arg(value_enum, env = "LOGISTIC_MODE")]
    mode: Mode,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!("Checking cardinalities in {} mode", cli.mode);

    let client = Client::with_uri_str(&cli.uri).context("Failed to connect to MongoDB")?;
    let db = mongo::find_benchmark_database(&client)?;
    cardinality_report(&db, &cli.target_dir, cli.mode)?;

    info!("Reports written to {}", cli.target_dir.display());
    Ok(())
}
