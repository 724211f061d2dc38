//! The run orchestrator.
//!
//! Feeds are processed one at a time in configuration order. Each feed is
//! its own failure domain: anything that goes wrong is recorded in the
//! [`ErrorLog`] and the loop moves on. At the end of the run the log is
//! turned into a single post on the status feed.

use crate::config::{Config, FeedDefinition};
use crate::error::SitefeedError;
use crate::extract::{Extractor, PageSource};
use crate::feed::{Channel, FsFeedStore, is_new, merge};
use crate::status::ErrorLog;
use crate::utils::{ensure_writable_dir, italic};
use chrono::{DateTime, FixedOffset};
use tracing::{debug, info, instrument};

/// Document name of the status feed.
pub const STATUS_FILE: &str = "sitefeed-status";
pub const STATUS_TITLE: &str = "Sitefeed Status";
const STATUS_DESCRIPTION: &str = "Problems encountered while generating feeds";

/// What happened to one feed during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Not scheduled for this run.
    Skipped,
    /// The title could not be found; nothing was extracted.
    NoPost,
    /// The extracted post was already present.
    Duplicate,
    Added,
    /// Processing failed and was recorded.
    Failed,
}

/// Prepare the feeds directory and the status document.
///
/// Failure here is fatal to the run.
pub async fn setup(store: &FsFeedStore) -> Result<Channel, SitefeedError> {
    ensure_writable_dir(store.root()).await?;
    load_status(store).await
}

async fn load_status(store: &FsFeedStore) -> Result<Channel, SitefeedError> {
    store
        .load_or_init(
            STATUS_FILE,
            STATUS_TITLE,
            STATUS_DESCRIPTION,
            &store.document_uri(STATUS_FILE),
        )
        .await
}

/// Process every configured feed, returning one outcome per feed in order.
#[instrument(level = "info", skip_all, fields(feeds = config.feeds.len()))]
pub async fn run<S: PageSource>(
    config: &Config,
    source: &S,
    store: &FsFeedStore,
    now: &DateTime<FixedOffset>,
    log: &mut ErrorLog,
) -> Vec<FeedOutcome> {
    let mut outcomes = Vec::with_capacity(config.feeds.len());
    for feed in &config.feeds {
        let outcome = match process_feed(feed, config.debug, source, store, now, log).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let prefix = format!("Error processing feed {}", italic(&feed.title));
                log.record_failure(Some(&prefix), &e);
                FeedOutcome::Failed
            }
        };
        debug!(feed = %feed.title, ?outcome, "Feed done");
        outcomes.push(outcome);
    }

    let count = |wanted: FeedOutcome| outcomes.iter().filter(|o| **o == wanted).count();
    info!(
        added = count(FeedOutcome::Added),
        duplicate = count(FeedOutcome::Duplicate),
        skipped = count(FeedOutcome::Skipped),
        no_post = count(FeedOutcome::NoPost),
        failed = count(FeedOutcome::Failed),
        "Processed feeds"
    );
    outcomes
}

#[instrument(level = "info", skip_all, fields(feed = %feed.title, file = %feed.file))]
async fn process_feed<S: PageSource>(
    feed: &FeedDefinition,
    debug: bool,
    source: &S,
    store: &FsFeedStore,
    now: &DateTime<FixedOffset>,
    log: &mut ErrorLog,
) -> Result<FeedOutcome, SitefeedError> {
    let mut channel = store
        .load_or_init(&feed.file, &feed.title, &feed.description, &feed.url)
        .await?;

    if !feed.schedule.should_query(now, channel.time_stamp()) {
        debug!("Not scheduled for this run");
        return Ok(FeedOutcome::Skipped);
    }

    let post = {
        let page = source.fetch(&feed.url).await?;
        Extractor::new(&page, feed, debug).extract(now, log)?
    };
    let Some(post) = post else {
        return Ok(FeedOutcome::NoPost);
    };

    let mut dirty = false;
    let outcome = if is_new(
        channel.items(),
        &post.title,
        &post.link,
        feed.verify_uniqueness,
        &feed.title,
        log,
    ) {
        merge(&mut channel, &post, feed.keep)?;
        dirty = true;
        info!(title = %post.title, "Added post");
        FeedOutcome::Added
    } else {
        FeedOutcome::Duplicate
    };

    if feed.schedule.interval.is_some() {
        channel.set_time_stamp(now)?;
        dirty = true;
    }
    if dirty {
        store.save(&feed.file, &channel).await?;
    }
    Ok(outcome)
}

/// Publish the run's error log to the status feed.
///
/// Returns `Ok(false)` when there was nothing to report.
#[instrument(level = "info", skip_all, fields(entries = log.len()))]
pub async fn report_errors(
    log: &ErrorLog,
    store: &FsFeedStore,
    status_keep: usize,
    now: &DateTime<FixedOffset>,
) -> Result<bool, SitefeedError> {
    let Some(post) = log.status_post(now, &store.document_uri(STATUS_FILE)) else {
        return Ok(false);
    };
    let mut channel = load_status(store).await?;
    merge(&mut channel, &post, status_keep)?;
    store.save(STATUS_FILE, &channel).await?;
    info!("Wrote status report");
    Ok(true)
}
