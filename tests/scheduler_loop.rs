// tests/scheduler_loop.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use common::{rss, ScriptedSource};
use gator::error::GatorError;
use gator::ingest::types::FeedStore;
use gator::storage::MemoryStore;
use gator::{run_aggregation_loop, AggregationLoop, TickOutcome};
use uuid::Uuid;

fn harness() -> (Arc<MemoryStore>, Arc<ScriptedSource>, Uuid) {
    (
        Arc::new(MemoryStore::new()),
        Arc::new(ScriptedSource::new()),
        Uuid::new_v4(),
    )
}

fn agg_loop(store: &Arc<MemoryStore>, source: &Arc<ScriptedSource>, user: Uuid) -> AggregationLoop {
    AggregationLoop::new(store.clone(), source.clone(), user, Duration::from_secs(60)).unwrap()
}

#[tokio::test]
async fn selects_never_fetched_then_oldest() {
    let (store, _source, user) = harness();
    let a = store.add_feed("a", "https://a.test/rss", user);
    let b = store.add_feed("b", "https://b.test/rss", user);
    let c = store.add_feed("c", "https://c.test/rss", user);
    store.set_last_fetched(a.id, Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()));
    store.set_last_fetched(b.id, Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));

    let next = store.select_next_feed_to_fetch(user).await.unwrap().unwrap();
    assert_eq!(next.id, c.id);

    store.set_last_fetched(c.id, Some(Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap()));
    let next = store.select_next_feed_to_fetch(user).await.unwrap().unwrap();
    assert_eq!(next.id, b.id);
}

#[tokio::test]
async fn feeds_of_other_users_are_not_selected() {
    let (store, _source, user) = harness();
    store.add_feed("theirs", "https://other.test/rss", Uuid::new_v4());

    assert!(store.select_next_feed_to_fetch(user).await.unwrap().is_none());
}

#[tokio::test]
async fn no_feeds_tick_is_harmless() {
    let (store, source, user) = harness();
    let agg = agg_loop(&store, &source, user);

    assert!(matches!(agg.tick().await, TickOutcome::NoFeeds));
    assert!(matches!(agg.tick().await, TickOutcome::NoFeeds));
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn selection_failure_does_not_poison_the_next_tick() {
    let (store, source, user) = harness();
    store.add_feed("a", "https://a.test/rss", user);
    source.serve("https://a.test/rss", rss(&[("https://a.test/1", "2024-03-01T10:00:00Z")]));
    let agg = agg_loop(&store, &source, user);

    store.fail_select(true);
    match agg.tick().await {
        TickOutcome::Failed(e) => assert!(matches!(e, GatorError::StorageUnavailable(_))),
        other => panic!("expected failure, got {other:?}"),
    }

    store.fail_select(false);
    match agg.tick().await {
        TickOutcome::Ingested(report) => assert_eq!(report.inserted, 1),
        other => panic!("expected ingest, got {other:?}"),
    }
}

#[tokio::test]
async fn failing_feed_rotates_to_the_back() {
    let (store, source, user) = harness();
    let broken = store.add_feed("broken", "https://broken.test/rss", user);
    let ok = store.add_feed("ok", "https://ok.test/rss", user);
    source.fail("https://broken.test/rss");
    source.serve("https://ok.test/rss", rss(&[("https://ok.test/1", "2024-03-01T10:00:00Z")]));
    let agg = agg_loop(&store, &source, user);

    assert!(matches!(agg.tick().await, TickOutcome::Failed(GatorError::Network { .. })));
    assert!(store.feed(broken.id).unwrap().last_fetched_at.is_some());

    assert!(matches!(agg.tick().await, TickOutcome::Ingested(_)));
    assert!(store.feed(ok.id).unwrap().last_fetched_at.is_some());

    assert_eq!(
        source.calls(),
        vec![
            "https://broken.test/rss".to_string(),
            "https://ok.test/rss".to_string()
        ]
    );
}

#[tokio::test]
async fn every_feed_is_visited_once_per_round() {
    let (store, source, user) = harness();
    let urls: Vec<String> = (0..4).map(|i| format!("https://f{i}.test/rss")).collect();
    for (i, url) in urls.iter().enumerate() {
        store.add_feed(&format!("f{i}"), url, user);
        source.serve(url, rss(&[]));
    }
    let agg = agg_loop(&store, &source, user);

    for _ in 0..urls.len() {
        assert!(matches!(agg.tick().await, TickOutcome::Ingested(_)));
    }
    let mut calls = source.calls();
    calls.sort();
    let mut expected = urls;
    expected.sort();
    assert_eq!(calls, expected);
}

#[tokio::test(start_paused = true)]
async fn spawned_loop_ticks_immediately_then_per_interval() {
    let (store, source, user) = harness();
    store.add_feed("a", "https://a.test/rss", user);
    source.serve("https://a.test/rss", rss(&[]));

    let handle = agg_loop(&store, &source, user).spawn();
    tokio::time::sleep(Duration::from_secs(125)).await;
    let ticks = handle.shutdown().await;

    // t = 0, 60, 120
    assert_eq!(ticks, 3);
    assert_eq!(source.calls().len(), 3);
}

#[tokio::test]
async fn invalid_interval_fails_before_any_tick() {
    let (store, source, user) = harness();
    store.add_feed("a", "https://a.test/rss", user);

    let err = run_aggregation_loop(store.clone(), source.clone(), "soon", user, async {})
        .await
        .unwrap_err();
    assert!(matches!(err, GatorError::InvalidInput(_)), "{err:?}");
    assert!(source.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn aggregation_loop_stops_on_shutdown_signal() {
    let (store, source, user) = harness();
    store.add_feed("a", "https://a.test/rss", user);
    source.serve("https://a.test/rss", rss(&[("https://a.test/1", "2024-03-01T10:00:00Z")]));

    let shutdown = tokio::time::sleep(Duration::from_secs(90));
    let ticks = run_aggregation_loop(store.clone(), source.clone(), "1m", user, shutdown)
        .await
        .unwrap();

    assert_eq!(ticks, 2);
    assert_eq!(store.posts().len(), 1);
}

#[test]
fn zero_interval_is_rejected() {
    let (store, source, user) = harness();
    let err = AggregationLoop::new(store, source, user, Duration::ZERO).err().unwrap();
    assert!(matches!(err, GatorError::InvalidInput(_)));
}
