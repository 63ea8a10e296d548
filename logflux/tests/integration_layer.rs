//! Integration tests for the `tracing` layer.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use logflux::{
    Config, FieldValue, Hook, HookError, HookLayer, Level, LogRecord, LogfluxError, MemorySink,
};
use tracing_subscriber::prelude::*;

fn wait_for(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

fn layered_hook(config: Config) -> (Arc<Hook>, MemorySink) {
    let sink = MemorySink::new();
    let hook = Arc::new(Hook::new(config, sink.clone()).unwrap());
    (hook, sink)
}

#[test]
fn test_events_become_points() {
    let (hook, sink) = layered_hook(
        Config::default()
            .with_tags(["host"])
            .with_batch_size(3)
            .with_batch_interval(Duration::from_secs(60)),
    );
    let subscriber = tracing_subscriber::registry().with(HookLayer::new(Arc::clone(&hook)));

    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(measurement = "click", user_id = 1i64, "user clicked");
        tracing::warn!(host = "web1", latency = 1.5, cached = false, "slow request");
        tracing::error!(attempts = 3u64, reason = ?vec!["a", "b"], "gave up");
    });

    assert!(wait_for(Duration::from_secs(2), || sink.point_count() == 3));
    let batches = sink.batches();
    let points = batches[0].points();

    assert_eq!(points[0].measurement(), "click");
    assert_eq!(points[0].tags()["level"], "info");
    assert_eq!(points[0].fields()["user_id"], FieldValue::Integer(1));
    assert_eq!(points[0].fields()["message"], FieldValue::from("user clicked"));
    assert!(!points[0].fields().contains_key("measurement"));

    assert_eq!(points[1].measurement(), "logrus");
    assert_eq!(points[1].tags()["level"], "warning");
    assert_eq!(points[1].tags()["host"], "web1");
    assert_eq!(points[1].fields()["latency"], FieldValue::Float(1.5));
    assert_eq!(points[1].fields()["cached"], FieldValue::Boolean(false));
    assert!(!points[1].fields().contains_key("host"));

    assert_eq!(points[2].tags()["level"], "error");
    assert_eq!(points[2].fields()["attempts"], FieldValue::UInteger(3));
    assert_eq!(
        points[2].fields()["reason"],
        FieldValue::from(r#"["a", "b"]"#)
    );
}

#[test]
fn test_trace_events_are_not_forwarded() {
    let (hook, sink) = layered_hook(
        Config::default()
            .with_batch_size(1)
            .with_batch_interval(Duration::from_secs(60)),
    );
    let subscriber = tracing_subscriber::registry().with(HookLayer::new(Arc::clone(&hook)));

    tracing::subscriber::with_default(subscriber, || {
        tracing::trace!("too chatty");
        tracing::debug!("kept");
    });

    assert!(wait_for(Duration::from_secs(2), || sink.point_count() == 1));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(sink.point_count(), 1);
    assert_eq!(
        sink.batches()[0].points()[0].fields()["message"],
        FieldValue::from("kept")
    );
}

#[test]
fn test_rejected_events_do_not_panic() {
    let (hook, sink) = layered_hook(
        Config::default()
            .with_batch_size(1)
            .with_batch_interval(Duration::from_secs(60)),
    );
    let subscriber = tracing_subscriber::registry().with(HookLayer::new(Arc::clone(&hook)));

    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(ratio = f64::NAN, "bad value");
        tracing::info!(ratio = 0.5, "good value");
    });

    assert!(wait_for(Duration::from_secs(2), || sink.point_count() == 1));
    assert_eq!(
        sink.batches()[0].points()[0].fields()["ratio"],
        FieldValue::Float(0.5)
    );
}

#[test]
fn test_close_flushes_while_layer_holds_hook() {
    let (hook, sink) = layered_hook(
        Config::default()
            .with_batch_size(100)
            .with_batch_interval(Duration::from_secs(60)),
    );
    let layer = HookLayer::new(Arc::clone(&hook));
    let subscriber = tracing_subscriber::registry().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        for i in 0..5i64 {
            tracing::info!(seq = i, "queued");
        }

        // The subscriber still owns a clone of the hook here.
        assert_eq!(Arc::strong_count(&hook), 2);
        hook.close().unwrap();
        assert_eq!(sink.point_count(), 5);

        tracing::info!("after close");
    });

    assert_eq!(sink.batch_count(), 1);
    assert_eq!(sink.point_count(), 5);
    assert!(matches!(
        hook.submit(LogRecord::new(Level::Info, "late")),
        Err(LogfluxError::Hook(HookError::Closed))
    ));
}
