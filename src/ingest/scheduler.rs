// src/ingest/scheduler.rs
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use regex::Regex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::error::{GatorError, Result};
use crate::ingest::types::{FeedSource, FeedStore};
use crate::ingest::{ingest_feed, record_error, record_tick, IngestReport};

/// Messages understood by a running loop.
pub enum SchedulerMessage {
    Shutdown,
}

/// What a single tick did.
#[derive(Debug)]
pub enum TickOutcome {
    Ingested(IngestReport),
    NoFeeds,
    Failed(GatorError),
}

/// Pull-one-feed-per-tick aggregation loop.
///
/// Every tick selects the feed followed by `user_id` that was fetched least
/// recently and runs one ingestion step against it. Ticks never overlap: a
/// slow fetch pushes the next tick back instead of queueing another one.
pub struct AggregationLoop {
    store: Arc<dyn FeedStore>,
    source: Arc<dyn FeedSource>,
    user_id: Uuid,
    interval: Duration,
}

impl AggregationLoop {
    pub fn new(
        store: Arc<dyn FeedStore>,
        source: Arc<dyn FeedSource>,
        user_id: Uuid,
        interval: Duration,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(GatorError::InvalidInput(
                "poll interval must be positive".into(),
            ));
        }
        Ok(Self {
            store,
            source,
            user_id,
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run exactly one selection + ingestion. Failures are logged and
    /// returned as a [`TickOutcome`]; nothing here stops the loop.
    pub async fn tick(&self) -> TickOutcome {
        record_tick();

        let feed = match self.store.select_next_feed_to_fetch(self.user_id).await {
            Ok(Some(feed)) => feed,
            Ok(None) => {
                tracing::warn!(user = %self.user_id, "no feeds to fetch");
                return TickOutcome::NoFeeds;
            }
            Err(e) => {
                tracing::error!(error = %e, "couldn't get next feed to fetch");
                record_error(e.kind());
                return TickOutcome::Failed(e);
            }
        };

        match ingest_feed(self.store.as_ref(), self.source.as_ref(), &feed).await {
            Ok(report) => {
                tracing::info!(
                    target: "ingest",
                    feed = %report.feed_name,
                    inserted = report.inserted,
                    duplicates = report.duplicates,
                    skipped = report.skipped,
                    "ingest tick"
                );
                TickOutcome::Ingested(report)
            }
            Err(e) => {
                record_error(e.kind());
                TickOutcome::Failed(e)
            }
        }
    }

    /// Tick on the interval until a shutdown message arrives (or every
    /// sender is dropped). The first tick fires immediately. Returns the
    /// number of ticks run.
    pub async fn run(self, mut receiver: mpsc::Receiver<SchedulerMessage>) -> u64 {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval = ?self.interval, "collecting feeds");

        let mut ticks = 0u64;
        loop {
            tokio::select! {
                biased;
                msg = receiver.recv() => {
                    match msg {
                        Some(SchedulerMessage::Shutdown) | None => {
                            tracing::info!(ticks, "aggregation loop stopped");
                            break;
                        }
                    }
                }
                _ = timer.tick() => {
                    self.tick().await;
                    ticks += 1;
                }
            }
        }
        ticks
    }

    /// Spawn [`run`](Self::run) on the runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let (sender, receiver) = mpsc::channel(8);
        let task = tokio::spawn(self.run(receiver));
        SchedulerHandle { sender, task }
    }
}

/// Handle to a spawned loop.
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerMessage>,
    task: JoinHandle<u64>,
}

impl SchedulerHandle {
    /// Ask the loop to stop and wait for it. A tick in progress finishes
    /// first. Returns the number of ticks run.
    pub async fn shutdown(self) -> u64 {
        let _ = self.sender.send(SchedulerMessage::Shutdown).await;
        match self.task.await {
            Ok(ticks) => ticks,
            Err(e) => {
                tracing::error!(error = %e, "aggregation loop task failed");
                0
            }
        }
    }
}

/// Entry point for the `agg` command.
///
/// A bad interval is reported before the loop starts. After that this only
/// returns once `shutdown` resolves.
pub async fn run_aggregation_loop<F>(
    store: Arc<dyn FeedStore>,
    source: Arc<dyn FeedSource>,
    poll_interval: &str,
    user_id: Uuid,
    shutdown: F,
) -> Result<u64>
where
    F: Future<Output = ()>,
{
    let interval = parse_interval(poll_interval)?;
    let handle = AggregationLoop::new(store, source, user_id, interval)?.spawn();
    shutdown.await;
    Ok(handle.shutdown().await)
}

/// Parse a duration such as `30s`, `1m`, `1h30m` or `1.5s`.
///
/// Units: `ns`, `us` (`µs`), `ms`, `s`, `m`, `h`. The result must be
/// positive.
pub fn parse_interval(s: &str) -> Result<Duration> {
    static RE_PART: OnceCell<Regex> = OnceCell::new();
    let re = RE_PART.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d*)?|\.\d+)(ns|us|µs|μs|ms|h|m|s)").expect("valid interval regex")
    });

    let invalid = || GatorError::InvalidInput(format!("invalid duration: {s:?}"));
    let s_trim = s.trim();
    if s_trim.is_empty() {
        return Err(invalid());
    }

    let mut pos = 0usize;
    let mut secs = 0f64;
    for cap in re.captures_iter(s_trim) {
        let whole = cap.get(0).ok_or_else(invalid)?;
        if whole.start() != pos {
            return Err(invalid());
        }
        pos = whole.end();

        let value: f64 = cap[1].parse().map_err(|_| invalid())?;
        let scale = match &cap[2] {
            "ns" => 1e-9,
            "us" | "µs" | "μs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(invalid()),
        };
        secs += value * scale;
    }
    if pos != s_trim.len() {
        return Err(invalid());
    }

    let d = Duration::try_from_secs_f64(secs).map_err(|_| invalid())?;
    if d.is_zero() {
        return Err(GatorError::InvalidInput(format!(
            "duration must be positive: {s:?}"
        )));
    }
    Ok(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_go_style_durations() {
        assert_eq!(parse_interval("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_interval("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_interval("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_interval("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_interval("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_interval(" 2m10s ").unwrap(), Duration::from_secs(130));
    }

    #[test]
    fn rejects_garbage_and_zero() {
        for s in ["", "10", "abc", "1x", "5s junk", "-5s", "0s", "1m 2s"] {
            let err = parse_interval(s).unwrap_err();
            assert!(matches!(err, GatorError::InvalidInput(_)), "{s:?}");
        }
    }
}
