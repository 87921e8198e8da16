//! Chart a single latency histogram from Prometheus.

#![warn(clippy::all, clippy::pedantic)]

use anyhow::Result;
use clap::Parser;
use log::info;
use logistic_common::report::histogram_report;
use logistic_common::{DEFAULT_PROMETHEUS_URL, REQUEST_MAX_RETRIES};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The histogram selector, e.g. `database_duration_milliseconds_bucket{phase="LOAD"}`
    query: String,

    /// Where to write the chart; the summary is written next to it as `.txt`
    image_path: PathBuf,

    /// The base URL of the Prometheus server
    #[arg(long, default_value = DEFAULT_PROMETHEUS_URL, env = "LOGISTIC_PROMETHEUS_URL")]
    prometheus_url: String,

    /// How often to try the request before giving up
    #[arg(long, default_value_t = REQUEST_MAX_RETRIES, env = "LOGISTIC_MAX_RETRIES")]
    max_retries: u32,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    histogram_report(
        &cli.prometheus_url,
        &cli.query,
        &cli.image_path,
        cli.max_retries,
    )?;

    info!("Chart written to {}", cli.image_path.display());
    Ok(())
}
