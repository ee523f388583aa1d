// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use axum::{body::Body, routing::get, Router};
use chrono::{TimeDelta, Utc};
use common::mocks::{CountingStore, FailingStore, RecordingHandler, SlowStore};
use http::{header, Request, StatusCode};
use pulse::{
    BackupHandler, Batch, Beat, Category, Config, Hit, Pulse, PulseError, StoreError, BUFFER_SIZE,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn silent() -> Config {
    Config {
        error_handler: Some(Arc::new(|_: Option<&StoreError>, _: Batch| {})),
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_beats_past_threshold() {
    let store = Arc::new(CountingStore::default());
    let pulse = Pulse::new(silent(), store.clone()).await.unwrap();
    let now = Utc::now();
    let total = BUFFER_SIZE + 1;

    let producers: Vec<_> = (0..total)
        .map(|i| {
            let pulse = pulse.clone();
            let at = now - TimeDelta::milliseconds(i64::try_from(i).unwrap());
            std::thread::spawn(move || pulse.push_beat(Beat::new(at, "INFO", format!("beat {i}"))))
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    assert!(pulse.pending(Category::Beats) <= 1);

    let beats = pulse
        .beats(now - TimeDelta::hours(24), now + TimeDelta::seconds(1))
        .await
        .unwrap();

    assert_eq!(beats.len(), total);
    assert!(beats.windows(2).all(|pair| pair[0].at() >= pair[1].at()));
    assert_eq!(pulse.pending(Category::Beats), 0);
    assert_eq!(pulse.flushes_in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_concurrent_push_is_stored_once() {
    let store = Arc::new(CountingStore::default());
    let pulse = Pulse::new(silent(), store.clone()).await.unwrap();
    let now = Utc::now();

    let producers: Vec<_> = (0..8)
        .map(|t| {
            let pulse = pulse.clone();
            tokio::spawn(async move {
                for i in 0..125 {
                    pulse.push_hit(Hit::new(now, "GET", format!("/producer/{t}/{i}")));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }

    let hits = pulse
        .hits(now - TimeDelta::minutes(1), now + TimeDelta::minutes(1))
        .await
        .unwrap();

    assert_eq!(hits.len(), 1000);
    let mut paths: Vec<&str> = hits.iter().map(Hit::path).collect();
    paths.sort_unstable();
    paths.dedup();
    assert_eq!(paths.len(), 1000);
    // three threshold flushes and the final flush from the query
    assert_eq!(store.inserts(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_query_waits_for_slow_threshold_flushes() {
    let store = Arc::new(SlowStore::new(Duration::from_millis(300)));
    let pulse = Pulse::new(silent(), store.clone()).await.unwrap();
    let now = Utc::now();

    let producers: Vec<_> = (0..6)
        .map(|t| {
            let pulse = pulse.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    pulse.push_beat(Beat::new(now, "INFO", format!("producer {t} line {i}")));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    // two threshold flushes were handed to the store, the rest is buffered
    assert_eq!(pulse.pending(Category::Beats), 600 - 2 * (BUFFER_SIZE + 1));

    let beats = pulse
        .beats(now - TimeDelta::minutes(1), now + TimeDelta::minutes(1))
        .await
        .unwrap();

    assert_eq!(beats.len(), 600);
    assert_eq!(store.store.inserts(), 3);
    assert_eq!(pulse.flushes_in_flight(), 0);
}

#[tokio::test]
async fn test_expired_window_skips_store() {
    let store = Arc::new(CountingStore::default());
    let config = Config {
        expire: Duration::from_secs(48 * 3600),
        ..silent()
    };
    let pulse = Pulse::new(config, store.clone()).await.unwrap();
    pulse.push_beat(Beat::new(Utc::now(), "INFO", "still buffered"));

    let now = Utc::now();
    let result = pulse
        .beats(now - TimeDelta::hours(72), now - TimeDelta::hours(49))
        .await;

    assert!(matches!(result, Err(PulseError::Expired)));
    assert_eq!(store.queries(), 0);
    assert_eq!(store.inserts(), 0);
    assert_eq!(pulse.pending(Category::Beats), 1);
}

#[tokio::test]
async fn test_failed_batch_reaches_handler_once() {
    let handler = RecordingHandler::new();
    let config = Config {
        error_handler: Some(handler.clone()),
        ..Default::default()
    };
    let pulse = Pulse::new(config, Arc::new(FailingStore)).await.unwrap();
    let hits: Vec<Hit> = ["/a", "/b", "/c"]
        .into_iter()
        .map(|path| Hit::new(Utc::now(), "GET", path))
        .collect();
    for hit in &hits {
        pulse.push_hit(hit.clone());
    }

    pulse.flush().await;

    let calls = handler.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0.as_deref(), Some("connection refused"));
    assert_eq!(calls[0].1, Batch::Hits(hits));
}

#[tokio::test]
async fn test_query_failure_is_store_unavailable() {
    let pulse = Pulse::new(silent(), Arc::new(FailingStore)).await.unwrap();
    let now = Utc::now();

    let result = pulse.hits(now - TimeDelta::hours(1), now).await;

    match result {
        Err(PulseError::StoreUnavailable(err)) => assert_eq!(err.message(), "connection refused"),
        other => panic!("expected StoreUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_round_trip_keeps_every_field() {
    let pulse = Pulse::new(silent(), Arc::new(CountingStore::default()))
        .await
        .unwrap();
    let at = Utc::now() - TimeDelta::minutes(5);
    let hit = Hit::new(at, "PUT", "/users/42")
        .with_status(204)
        .with_duration(Duration::from_micros(1_250))
        .with_remote_addr("192.168.1.20:40000")
        .with_referer("https://example.com/")
        .with_user_agent("Mozilla/5.0");
    let beat = Beat::new(at, "WARN", "cache miss ratio high");
    pulse.push_hit(hit.clone());
    pulse.push_beat(beat.clone());

    let from = at - TimeDelta::seconds(1);
    let to = at + TimeDelta::seconds(1);
    let hits = pulse.hits(from, to).await.unwrap();
    let beats = pulse.beats(from, to).await.unwrap();

    assert_eq!(hits.len(), 1);
    let id = hits[0].id().unwrap();
    assert_eq!(hits[0], hit.with_id(id));

    assert_eq!(beats.len(), 1);
    let id = beats[0].id().unwrap();
    assert_eq!(beats[0], beat.with_id(id));
}

#[tokio::test]
async fn test_reversed_window_is_the_same_window() {
    let pulse = Pulse::new(silent(), Arc::new(CountingStore::default()))
        .await
        .unwrap();
    let now = Utc::now();
    for minutes in 1..=5 {
        pulse.push_beat(Beat::new(
            now - TimeDelta::minutes(minutes),
            "",
            format!("{minutes}"),
        ));
    }

    let earlier = now - TimeDelta::minutes(4);
    let forward = pulse.beats(earlier, now).await.unwrap();
    let backward = pulse.beats(now, earlier).await.unwrap();

    assert_eq!(forward.len(), 4);
    assert_eq!(forward, backward);
}

#[tokio::test]
async fn test_backup_files_when_store_is_down() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        backup_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let pulse = Pulse::new(config, Arc::new(FailingStore)).await.unwrap();

    pulse.writer().push_line(b"Log message\n");
    pulse.push_hit(Hit::new(Utc::now(), "GET", "/health"));
    pulse.flush().await;

    let beats = std::fs::read_to_string(BackupHandler::path(dir.path(), Category::Beats)).unwrap();
    let hits = std::fs::read_to_string(BackupHandler::path(dir.path(), Category::Hits)).unwrap();

    assert!(beats.lines().any(|line| line.ends_with("Log message")));
    // one failed flush per category, each leaving an ERROR beat
    assert_eq!(
        beats
            .lines()
            .filter(|line| line.ends_with(" ERROR connection refused"))
            .count(),
        2
    );
    assert_eq!(hits.lines().count(), 1);
    assert!(hits.contains(" GET /health 200 "));
}

#[tokio::test]
async fn test_router_requests_become_hits() {
    let pulse = Pulse::new(silent(), Arc::new(CountingStore::default()))
        .await
        .unwrap();
    let app = Router::new()
        .route("/ping", get(|| async { "pong" }))
        .route(
            "/missing",
            get(|| async { (StatusCode::NOT_FOUND, "nothing here") }),
        )
        .layer(pulse.layer());

    for uri in ["/ping", "/missing"] {
        let request = Request::get(uri)
            .header(header::USER_AGENT, "integration-test")
            .body(Body::empty())
            .unwrap();
        app.clone().oneshot(request).await.unwrap();
    }

    let now = Utc::now();
    let hits = pulse
        .hits(now - TimeDelta::minutes(1), now + TimeDelta::seconds(1))
        .await
        .unwrap();

    assert_eq!(hits.len(), 2);
    let mut seen: Vec<(&str, u16)> = hits.iter().map(|hit| (hit.path(), hit.status())).collect();
    seen.sort_unstable();
    assert_eq!(seen, vec![("/missing", 404), ("/ping", 200)]);
    assert!(hits.iter().all(|hit| hit.user_agent() == "integration-test"));
}
