//! Architectural Contract Test: Collaborator Isolation
//!
//! Constraints verified:
//! - Every cycle notifies once, with at most 5 result details
//! - Notifier failures never reach the caller
//! - Metrics carry the mode and outcome tags
//! - Progress subscribers see every stage in order, then the stream ends
//!
//! If this test fails, observability can break synchronisation.

mod common;

use common::*;
use std::sync::Arc;
use tokio_stream::StreamExt;
use zonesync_core::engine::{CycleOutcome, SyncEngine};
use zonesync_core::progress::{ProgressStatus, SyncProgress};
use zonesync_core::traits::NotificationKind;

fn seven_hosts() -> MockSource {
    MockSource::new(
        (1..=7)
            .map(|i| cf(&i.to_string(), "A", &format!("h{i}.example.com"), "192.0.2.1", 300))
            .collect(),
    )
}

#[tokio::test]
async fn completion_notification_is_truncated_to_five_details() {
    let notifier = RecordingNotifier::default();
    let engine = SyncEngine::new(Box::new(seven_hosts()), Box::new(MockTarget::new(Vec::new())), &minimal_config())
        .expect("engine construction succeeds")
        .with_notifier(Arc::new(notifier.clone()));

    engine.run_cycle().await.expect("cycle completes");

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::SyncComplete);
    assert!(sent[0].success);
    assert_eq!(sent[0].records_processed, Some(7));
    assert_eq!(sent[0].details.len(), 5);
    assert_eq!(sent[0].details[0].record_name, "h1.example.com");

    let json = serde_json::to_value(&sent[0]).unwrap();
    assert_eq!(json["type"], "sync_complete");
    assert_eq!(json["recordsProcessed"], 7);
}

#[tokio::test]
async fn notifier_failure_is_swallowed() {
    let notifier = FailingNotifier::default();
    let target = MockTarget::new(Vec::new());
    let engine = SyncEngine::new(Box::new(seven_hosts()), Box::new(target.clone()), &minimal_config())
        .expect("engine construction succeeds")
        .with_notifier(Arc::new(notifier.clone()));

    let outcome = engine.run_cycle().await.expect("notifier errors never fail the cycle");
    assert!(matches!(outcome, CycleOutcome::Completed(_)));
    assert_eq!(notifier.attempts(), 1);
    assert_eq!(target.applied().len(), 7);
}

#[tokio::test]
async fn metrics_are_tagged_with_mode_and_outcome() {
    let metrics = RecordingMetrics::default();
    let engine = SyncEngine::new(Box::new(seven_hosts()), Box::new(MockTarget::new(Vec::new())), &minimal_config())
        .expect("engine construction succeeds")
        .with_metrics(Arc::new(metrics.clone()));

    engine.run_cycle().await.expect("cycle completes");

    let names: Vec<String> = metrics.recorded().into_iter().map(|m| m.name).collect();
    assert_eq!(names, vec!["sync_duration_ms", "sync_success", "sync_records_processed"]);

    let processed = metrics.named("sync_records_processed").unwrap();
    assert_eq!(processed.value, 7.0);
    assert_eq!(processed.tags.get("mode").map(String::as_str), Some("incremental"));
    assert_eq!(processed.tags.get("success").map(String::as_str), Some("true"));
    assert!(!processed.tags.contains_key("error_code"));
    assert_eq!(metrics.named("sync_success").unwrap().value, 1.0);
}

#[tokio::test]
async fn progress_subscriber_sees_each_stage_then_ends() {
    let engine = SyncEngine::new(Box::new(seven_hosts()), Box::new(MockTarget::new(Vec::new())), &minimal_config())
        .expect("engine construction succeeds");
    let progress = engine.progress();
    let stream = progress.subscribe();

    engine.run_cycle().await.expect("cycle completes");

    let seen: Vec<SyncProgress> = stream.collect().await;
    let stages: Vec<ProgressStatus> = seen.iter().map(|p| p.status).fold(Vec::new(), |mut acc, s| {
        if acc.last() != Some(&s) {
            acc.push(s);
        }
        acc
    });
    assert_eq!(
        stages,
        vec![
            ProgressStatus::Idle,
            ProgressStatus::Initializing,
            ProgressStatus::Fetching,
            ProgressStatus::Planning,
            ProgressStatus::Applying,
            ProgressStatus::Completed,
        ]
    );

    let percentages: Vec<u8> = seen.iter().map(|p| p.percentage).collect();
    assert!(percentages.windows(2).all(|w| w[0] <= w[1]), "{percentages:?}");
    assert_eq!(seen.last().unwrap().percentage, 100);
    assert_eq!(progress.subscriber_count(), 0);
}
