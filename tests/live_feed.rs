//! Live Feed Client Tests - Reconnect Schedule and Lifecycle
//!
//! Drives `LiveFeedClient` against a scripted fake channel factory on a
//! paused tokio clock, so every backoff delay is asserted exactly.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mockall::mock;
use mockall::predicate::eq;
use mockall::Sequence;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

use rtcc_feed::adapters::metrics::FeedMetrics;
use rtcc_feed::domain::message::{DecodeError, FeedMessage};
use rtcc_feed::domain::reconnect::{FeedState, RetryPolicy};
use rtcc_feed::ports::channel::TransportError;
use rtcc_feed::ports::diagnostics::DiagnosticSink;
use rtcc_feed::usecases::LiveFeedClient;

use common::{Event, FakeFactory, Open, RecordingSink, Then, INIT_FRAME, UNIT_FRAME, URL};

mock! {
    pub Sink {}

    impl DiagnosticSink for Sink {
        fn message_dropped(&self, raw: &str, error: &DecodeError);
        fn reconnect_scheduled(&self, attempt: u32, delay: Duration);
        fn retries_exhausted(&self, attempts: u32);
    }
}

fn client(factory: &FakeFactory, sink: &RecordingSink, max: u32, base_ms: u64) -> LiveFeedClient {
    LiveFeedClient::new(URL, Arc::new(factory.clone()))
        .with_policy(RetryPolicy::new(max, Duration::from_millis(base_ms)))
        .with_sink(Arc::new(sink.clone()))
}

async fn wait_final(client: &LiveFeedClient) {
    let mut rx = client.watch_state();
    rx.wait_for(|s| s.is_final()).await.unwrap();
}

async fn wait_open(client: &LiveFeedClient) {
    let mut rx = client.watch_state();
    rx.wait_for(|s| s.is_open()).await.unwrap();
}

// ── Backoff schedule ────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_open_then_repeated_closes_with_budget_of_two() {
    let factory = FakeFactory::new([Open::accept_then_close()]);
    let sink = RecordingSink::default();
    let mut feed = client(&factory, &sink, 2, 1000);

    let start = Instant::now();
    feed.connect(|_| {}, None);
    wait_final(&feed).await;

    // open, close → +1000 (attempt 1), close → +2000 (attempt 2), close → final
    assert_eq!(factory.open_offsets_ms(start), vec![0, 1000, 3000]);
    assert_eq!(
        sink.reconnects(),
        vec![
            (1, Duration::from_millis(1000)),
            (2, Duration::from_millis(2000)),
        ]
    );
    assert_eq!(sink.exhaustions(), 1);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(factory.open_count(), 3);
    assert_eq!(feed.state(), FeedState::Closed { retry_pending: false });
}

#[tokio::test(start_paused = true)]
async fn test_kth_retry_waits_k_times_base_delay() {
    let factory = FakeFactory::default();
    let sink = RecordingSink::default();
    let mut feed = client(&factory, &sink, 5, 100);

    let start = Instant::now();
    feed.connect(|_| {}, None);
    wait_final(&feed).await;

    // Cumulative: 0, +100, +200, +300, +400, +500
    assert_eq!(factory.open_offsets_ms(start), vec![0, 100, 300, 600, 1000, 1500]);
    let attempts: Vec<u32> = sink.reconnects().iter().map(|(a, _)| *a).collect();
    assert_eq!(attempts, vec![1, 2, 3, 4, 5]);
    assert_eq!(sink.events().last(), Some(&Event::Exhausted { attempts: 5 }));
    assert_eq!(sink.exhaustions(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_reported_exactly_once() {
    let factory = FakeFactory::default();
    let mut sink = MockSink::new();
    let mut seq = Sequence::new();

    sink.expect_reconnect_scheduled()
        .with(eq(1), eq(Duration::from_millis(50)))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    sink.expect_reconnect_scheduled()
        .with(eq(2), eq(Duration::from_millis(100)))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    sink.expect_retries_exhausted()
        .with(eq(2))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    sink.expect_message_dropped().never();

    let mut feed = LiveFeedClient::new(URL, Arc::new(factory.clone()))
        .with_policy(RetryPolicy::new(2, Duration::from_millis(50)))
        .with_sink(Arc::new(sink));

    feed.connect(|_| {}, None);
    wait_final(&feed).await;
    sleep(Duration::from_secs(10)).await;

    assert_eq!(factory.open_count(), 3);
    // Dropping the client drops the mock, which verifies the expectations.
    drop(feed);
}

#[tokio::test(start_paused = true)]
async fn test_successful_open_resets_attempt_counter() {
    let factory = FakeFactory::new([
        Open::Refuse,
        Open::Refuse,
        Open::accept_then_close(),
    ]);
    let sink = RecordingSink::default();
    let mut feed = client(&factory, &sink, 5, 10);

    feed.connect(|_| {}, None);
    wait_final(&feed).await;

    let attempts: Vec<u32> = sink.reconnects().iter().map(|(a, _)| *a).collect();
    assert_eq!(attempts, vec![1, 2, 1, 2, 3, 4, 5]);
    // 2 failures + 1 success + 5 post-success retries
    assert_eq!(factory.open_count(), 8);
    assert_eq!(sink.exhaustions(), 1);
}

/// Quirk: a refused open and a dropped session cost the same retry
/// budget, and a transport error alone never triggers a reconnect; the
/// close that follows it does.
#[tokio::test(start_paused = true)]
async fn test_open_failures_and_drops_share_retry_budget() {
    let factory = FakeFactory::new([
        Open::Accept { frames: vec![], then: Then::Fail },
        Open::Refuse,
        Open::accept_then_close(),
    ]);
    let sink = RecordingSink::default();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let errors_in = Arc::clone(&errors);
    let mut feed = client(&factory, &sink, 2, 100);

    feed.connect(
        |_| {},
        Some(Box::new(move |e: &TransportError| errors_in.lock().unwrap().push(e.clone()))),
    );
    wait_final(&feed).await;

    // drop (Read), refused, success, refused, refused
    let errors = errors.lock().unwrap().clone();
    assert_eq!(errors.len(), 4);
    assert!(matches!(errors[0], TransportError::Read(_)));
    assert!(errors[1..].iter().all(|e| matches!(e, TransportError::Connect { .. })));

    // The drop and the refusal both spent budget; only the open refunded it.
    let attempts: Vec<u32> = sink.reconnects().iter().map(|(a, _)| *a).collect();
    assert_eq!(attempts, vec![1, 2, 1, 2]);
    assert_eq!(factory.open_count(), 5);
    assert_eq!(sink.exhaustions(), 1);
}

// ── Disconnect ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect() {
    let factory = FakeFactory::new([Open::Refuse]);
    let sink = RecordingSink::default();
    let mut feed = client(&factory, &sink, 5, 1000);
    let mut state_rx = feed.watch_state();

    feed.connect(|_| {}, None);
    state_rx
        .wait_for(|s| *s == FeedState::Closed { retry_pending: true })
        .await
        .unwrap();

    feed.disconnect();
    sleep(Duration::from_secs(30)).await;

    assert_eq!(factory.open_count(), 1);
    assert_eq!(feed.state(), FeedState::Closed { retry_pending: false });
    assert_eq!(sink.exhaustions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_is_idempotent_and_closes_channel() {
    let factory = FakeFactory::new([Open::hold()]);
    let sink = RecordingSink::default();
    let mut feed = client(&factory, &sink, 5, 1000);

    feed.connect(|_| {}, None);
    wait_open(&feed).await;

    feed.disconnect();
    feed.disconnect();
    sleep(Duration::from_secs(5)).await;

    assert_eq!(factory.closed_count(), 1);
    assert_eq!(factory.open_count(), 1);
    assert!(feed.state().is_final());
    assert!(sink.reconnects().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_drop_disconnects() {
    let factory = FakeFactory::new([Open::hold()]);
    let sink = RecordingSink::default();
    let mut feed = client(&factory, &sink, 5, 1000);

    feed.connect(|_| {}, None);
    wait_open(&feed).await;
    drop(feed);
    sleep(Duration::from_secs(5)).await;

    assert_eq!(factory.closed_count(), 1);
    assert_eq!(factory.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_exhaustion_starts_fresh() {
    let factory = FakeFactory::new([Open::Refuse, Open::hold()]);
    let sink = RecordingSink::default();
    let mut feed = client(&factory, &sink, 0, 1000);

    feed.connect(|_| {}, None);
    wait_final(&feed).await;
    assert_eq!(factory.open_count(), 1);

    feed.connect(|_| {}, None);
    wait_open(&feed).await;
    assert_eq!(factory.open_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_connect_replaces_running_session() {
    let factory = FakeFactory::new([Open::hold(), Open::hold()]);
    let sink = RecordingSink::default();
    let mut feed = client(&factory, &sink, 5, 1000);

    feed.connect(|_| {}, None);
    wait_open(&feed).await;

    feed.connect(|_| {}, None);
    wait_open(&feed).await;
    sleep(Duration::from_millis(10)).await;

    assert_eq!(factory.open_count(), 2);
    assert_eq!(factory.closed_count(), 1);
    assert!(feed.state().is_open());
    assert!(!sink.events().contains(&Event::Disconnected));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_reported_to_sink_once() {
    let factory = FakeFactory::new([Open::hold()]);
    let sink = RecordingSink::default();
    let mut feed = client(&factory, &sink, 5, 1000);

    feed.connect(|_| {}, None);
    wait_open(&feed).await;
    feed.disconnect();
    feed.disconnect();
    sleep(Duration::from_secs(1)).await;

    let disconnects = sink
        .events()
        .into_iter()
        .filter(|e| *e == Event::Disconnected)
        .count();
    assert_eq!(disconnects, 1);
}

#[tokio::test(start_paused = true)]
async fn test_connected_gauge_cleared_on_disconnect() {
    let factory = FakeFactory::new([Open::hold()]);
    let metrics = Arc::new(FeedMetrics::new().unwrap());
    let mut feed = LiveFeedClient::new(URL, Arc::new(factory.clone()))
        .with_sink(Arc::clone(&metrics) as Arc<dyn DiagnosticSink>);

    feed.connect(|_| {}, None);
    wait_open(&feed).await;
    assert_eq!(metrics.connected.get(), 1);

    feed.disconnect();
    sleep(Duration::from_secs(1)).await;

    assert!(feed.state().is_final());
    assert_eq!(metrics.connected.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_connected_gauge_cleared_on_drop() {
    let factory = FakeFactory::new([Open::hold()]);
    let metrics = Arc::new(FeedMetrics::new().unwrap());
    let mut feed = LiveFeedClient::new(URL, Arc::new(factory.clone()))
        .with_sink(Arc::clone(&metrics) as Arc<dyn DiagnosticSink>);

    feed.connect(|_| {}, None);
    wait_open(&feed).await;
    drop(feed);
    sleep(Duration::from_secs(1)).await;

    assert_eq!(metrics.connected.get(), 0);
}

// ── Messages ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_malformed_frames_dropped_without_state_change() {
    let factory = FakeFactory::new([Open::Accept {
        frames: vec![
            "not json".to_string(),
            r#"{"type":"weather_report"}"#.to_string(),
            r#"{"type":"incident_created"}"#.to_string(),
            INIT_FRAME.to_string(),
        ],
        then: Then::Hold,
    }]);
    let sink = RecordingSink::default();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut feed = client(&factory, &sink, 5, 1000);

    feed.connect(
        move |msg| {
            let _ = tx.send(msg);
        },
        None,
    );

    let first = rx.recv().await.unwrap();
    assert!(matches!(first, FeedMessage::Init { .. }));
    assert!(rx.try_recv().is_err());

    assert_eq!(sink.dropped(), 3);
    assert_eq!(
        sink.events().iter().filter(|e| **e == Event::Dropped { syntax: true }).count(),
        1
    );
    assert!(feed.state().is_open());
    assert!(sink.reconnects().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_messages_delivered_in_order() {
    let factory = FakeFactory::new([Open::hold()]);
    let sink = RecordingSink::default();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut feed = client(&factory, &sink, 5, 1000);

    feed.connect(
        move |msg: FeedMessage| {
            let _ = tx.send(msg.kind());
        },
        None,
    );
    wait_open(&feed).await;

    factory.push(INIT_FRAME);
    factory.push(UNIT_FRAME);

    assert_eq!(rx.recv().await, Some("init"));
    assert_eq!(rx.recv().await, Some("unit_updated"));
    assert!(sink.events().contains(&Event::Delivered("unit_updated")));
}

#[tokio::test(start_paused = true)]
async fn test_server_drop_mid_session_reconnects() {
    let factory = FakeFactory::new([Open::hold(), Open::hold()]);
    let sink = RecordingSink::default();
    let mut feed = client(&factory, &sink, 5, 1000);
    let start = Instant::now();

    feed.connect(|_| {}, None);
    wait_open(&feed).await;

    sleep(Duration::from_millis(250)).await;
    factory.drop_live();

    let mut state_rx = feed.watch_state();
    state_rx.wait_for(|s| !s.is_open()).await.unwrap();
    wait_open(&feed).await;

    assert_eq!(factory.open_offsets_ms(start), vec![0, 1250]);
    assert_eq!(sink.reconnects(), vec![(1, Duration::from_millis(1000))]);
}

// ── Send ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_send_only_while_open() {
    let factory = FakeFactory::new([Open::Refuse, Open::hold()]);
    let sink = RecordingSink::default();
    let mut feed = client(&factory, &sink, 5, 1000);
    let mut state_rx = feed.watch_state();

    // Idle
    feed.send(&serde_json::json!({"type": "subscribe", "n": 0}));

    feed.connect(|_| {}, None);
    state_rx
        .wait_for(|s| *s == FeedState::Closed { retry_pending: true })
        .await
        .unwrap();

    // Closed (retry pending)
    feed.send(&serde_json::json!({"type": "subscribe", "n": 1}));

    wait_open(&feed).await;
    feed.send(&serde_json::json!({"type": "subscribe", "n": 2}));
    sleep(Duration::from_millis(10)).await;

    let sent = factory.sent();
    assert_eq!(sent.len(), 1);
    let value: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
    assert_eq!(value, serde_json::json!({"type": "subscribe", "n": 2}));
}

#[tokio::test(start_paused = true)]
async fn test_send_while_connecting_is_noop() {
    let factory = FakeFactory::new([Open::Stall]);
    let sink = RecordingSink::default();
    let mut feed = client(&factory, &sink, 5, 1000);

    feed.connect(|_| {}, None);
    sleep(Duration::from_millis(10)).await;
    assert_eq!(feed.state(), FeedState::Connecting);

    feed.send(&serde_json::json!({"type": "ping"}));
    sleep(Duration::from_millis(10)).await;

    assert!(factory.sent().is_empty());
    assert_eq!(feed.state(), FeedState::Connecting);
}
