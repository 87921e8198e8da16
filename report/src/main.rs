//! Chart every latency histogram of a logistic benchmark run.

#![warn(clippy::all, clippy::pedantic)]

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use logistic_common::report::latency_report;
use logistic_common::{DEFAULT_PROMETHEUS_URL, REQUEST_MAX_RETRIES};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The directory to write charts and summaries to
    #[arg(env = "LOGISTIC_TARGET_DIR")]
    target_dir: PathBuf,

    /// The benchmark version to report on, matched as a regex against `otel_scope_version`
    #[arg(env = "LOGISTIC_VERSION")]
    version: String,

    /// The base URL of the Prometheus server
    #[arg(long, default_value = DEFAULT_PROMETHEUS_URL, env = "LOGISTIC_PROMETHEUS_URL")]
    prometheus_url: String,

    /// How often to try each request before giving up
    #[arg(long, default_value_t = REQUEST_MAX_RETRIES, env = "LOGISTIC_MAX_RETRIES")]
    max_retries: u32,

    /// Fetch and render with this many threads
    #[arg(short, long, default_value_t = 4, env = "LOGISTIC_THREADS")]
    threads: usize,

    /// Hide the progress bar
    #[arg(short, long, env = "LOGISTIC_QUIET")]
    quiet: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!(
        "Charting version {} from {} with {} threads",
        cli.version, cli.prometheus_url, cli.threads
    );

    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads)
        .build_global()
        .context("Failed to build thread pool")?;

    latency_report(
        &cli.prometheus_url,
        &cli.target_dir,
        &cli.version,
        cli.max_retries,
        cli.quiet,
    )
}
