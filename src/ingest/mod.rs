// src/ingest/mod.rs
pub mod fetcher;
pub mod parser;
pub mod scheduler;
pub mod timefmt;
pub mod types;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

use crate::error::Result;
use crate::ingest::types::{FeedRecord, FeedSource, FeedStore, InsertOutcome, NewPost};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("gator_posts_inserted_total", "Posts newly stored.");
        describe_counter!(
            "gator_posts_duplicate_total",
            "Items whose URL was already stored."
        );
        describe_counter!(
            "gator_items_skipped_total",
            "Items dropped because their publish date did not parse."
        );
        describe_counter!(
            "gator_ingest_errors_total",
            "Ingestion steps aborted, labelled by error kind."
        );
        describe_counter!(
            "gator_fetch_non_success_total",
            "Fetches answered with a non-2xx status."
        );
        describe_counter!("gator_ticks_total", "Scheduler ticks run.");
        describe_histogram!("gator_fetch_ms", "Feed fetch time in milliseconds.");
        describe_gauge!(
            "gator_last_tick_ts",
            "Unix ts when the scheduler last ran a tick."
        );
    });
}

/// Summary of one ingestion step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub feed_name: String,
    pub channel_title: String,
    pub items: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

/// Fetch, parse and store one feed.
///
/// The feed is marked fetched before any network I/O, so a feed that keeps
/// failing is still rotated to the back of the queue. Items with an
/// unparsable date are skipped; duplicate URLs count as already ingested.
/// Any other insert failure stops the remaining items, leaving the ones
/// already stored in place.
pub async fn ingest_feed(
    store: &dyn FeedStore,
    source: &dyn FeedSource,
    feed: &FeedRecord,
) -> Result<IngestReport> {
    ensure_metrics_described();

    store.mark_feed_fetched(feed.id).await.inspect_err(|e| {
        tracing::warn!(feed = %feed.name, error = %e, "couldn't mark feed fetched");
    })?;

    let raw = source.fetch(&feed.url).await.inspect_err(|e| {
        tracing::warn!(feed = %feed.name, source = source.name(), error = %e, "couldn't collect feed");
    })?;

    let parsed = parser::parse_feed(&raw).inspect_err(|e| {
        tracing::warn!(feed = %feed.name, error = %e, "couldn't parse feed");
    })?;

    tracing::info!(
        feed = %feed.name,
        channel = %parsed.title,
        items = parsed.items.len(),
        "feed collected"
    );

    let mut report = IngestReport {
        feed_name: feed.name.clone(),
        channel_title: parsed.title,
        items: parsed.items.len(),
        ..IngestReport::default()
    };

    for item in parsed.items {
        let published_at = match timefmt::parse_published(&item.pub_date) {
            Ok(ts) => ts,
            Err(e) => {
                tracing::debug!(feed = %feed.name, link = %item.link, error = %e, "skipping item");
                report.skipped += 1;
                continue;
            }
        };

        let post = NewPost {
            title: item.title,
            url: item.link,
            description: item.description,
            published_at: Some(published_at),
            feed_id: feed.id,
        };

        match store.insert_post(post).await {
            Ok(InsertOutcome::Inserted) => report.inserted += 1,
            Ok(InsertOutcome::Duplicate) => report.duplicates += 1,
            Err(e) => {
                tracing::error!(
                    feed = %feed.name,
                    inserted = report.inserted,
                    error = %e,
                    "couldn't store post, abandoning remaining items"
                );
                record_counts(&report);
                return Err(e);
            }
        }
    }

    record_counts(&report);
    Ok(report)
}

fn record_counts(report: &IngestReport) {
    counter!("gator_posts_inserted_total").increment(report.inserted as u64);
    counter!("gator_posts_duplicate_total").increment(report.duplicates as u64);
    counter!("gator_items_skipped_total").increment(report.skipped as u64);
}

pub(crate) fn record_error(kind: &'static str) {
    counter!("gator_ingest_errors_total", "kind" => kind).increment(1);
}

pub(crate) fn record_tick() {
    let now = chrono::Utc::now().timestamp().max(0);
    counter!("gator_ticks_total").increment(1);
    gauge!("gator_last_tick_ts").set(now as f64);
}
