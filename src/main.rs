//! # Sitefeed
//!
//! Mirrors web pages that have no feed of their own into RSS documents.
//! Each configured page gets a post template, a set of CSS selectors saying
//! where the newest post's title, date, link, description and author live.
//! Every run extracts at most one post per page and merges it into a bounded
//! history, newest first.
//!
//! ## Usage
//!
//! ```sh
//! sitefeed --config config.json --feeds-dir ./feeds
//! ```
//!
//! ## Architecture
//!
//! 1. **Setup**: make sure the feeds directory and the status feed exist
//! 2. **Configuration**: parse feed definitions, reporting any that are unusable
//! 3. **Processing**: per feed, check the schedule, fetch, extract, dedupe, merge
//! 4. **Reporting**: everything that went wrong becomes one status feed post
//!
//! Failures never change the exit status; they surface in the status feed
//! and on the console.

use chrono::Local;
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod extract;
mod feed;
mod models;
mod runner;
mod schedule;
mod status;
mod utils;

use cli::Cli;
use config::Config;
use extract::HttpPageSource;
use feed::FsFeedStore;
use status::ErrorLog;

#[tokio::main]
async fn main() {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("sitefeed starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.feeds_dir, "Parsed CLI arguments");

    let store = FsFeedStore::new(args.feeds_dir.clone());
    if let Err(e) = runner::setup(&store).await {
        error!(
            path = %args.feeds_dir.display(),
            error = %e,
            "Feeds directory is unusable (fix perms or choose a different path)"
        );
        return;
    }

    let mut log = ErrorLog::new();
    let config = Config::load(&args.config, &mut log).await;

    match HttpPageSource::new() {
        Ok(source) => {
            let now = Local::now().fixed_offset();
            runner::run(&config, &source, &store, &now, &mut log).await;
        }
        Err(e) => log.record_failure(Some("Unable to build HTTP client"), &e),
    }

    let now = Local::now().fixed_offset();
    if let Err(e) = runner::report_errors(&log, &store, config.status_keep, &now).await {
        error!(error = %e, "Failed to write status feed");
        error!(report = %log.render(), "Unreported run errors");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        errors = log.len(),
        "Execution complete"
    );
}
