// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Orchestrator triggers, exclusivity, and failure reporting.

use std::time::Duration;

use fieldsync_core::RemoteError;
use fieldsync_sync::{GateState, PassOutcome};
use fieldsync_test_utils::TestHarness;
use tokio_util::sync::CancellationToken;

async fn harness_with(gate: GateState) -> TestHarness {
    TestHarness::builder()
        .gate(gate)
        .interval(Duration::from_secs(30))
        .build()
        .await
        .unwrap()
}

async fn queue_completion(h: &TestHarness, id: &str) {
    h.add_delivery(id).await.unwrap();
    h.complete_delivery(id).await.unwrap();
}

async fn mutation_count(h: &TestHarness) -> usize {
    h.transport.mutations().await.len()
}

#[tokio::test(start_paused = true)]
async fn trigger_while_running_is_a_no_op() {
    let h = TestHarness::new().await.unwrap();
    queue_completion(&h, "del_1").await;
    h.transport.set_latency(Duration::from_secs(2)).await;

    assert!(h.orchestrator.trigger_sync_now());
    assert!(h.orchestrator.is_syncing());
    assert!(h.orchestrator.status().is_syncing);
    assert!(!h.orchestrator.trigger_sync_now());
    assert_eq!(h.orchestrator.sync_now().await, PassOutcome::Skipped);

    let mut rx = h.orchestrator.subscribe_status();
    rx.wait_for(|s| !s.is_syncing && s.last_report.is_some())
        .await
        .unwrap();

    assert_eq!(h.transport.peak_concurrency(), 1);
    assert_eq!(mutation_count(&h).await, 1);
    assert!(!h.orchestrator.is_syncing());
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_run_a_single_pass() {
    let h = TestHarness::new().await.unwrap();
    queue_completion(&h, "del_1").await;
    h.transport.set_latency(Duration::from_secs(1)).await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move { orchestrator.sync_now().await })
        })
        .collect();

    let mut completed = 0;
    for handle in handles {
        if let PassOutcome::Completed(_) = handle.await.unwrap() {
            completed += 1;
        }
    }
    assert_eq!(completed, 1);
    assert_eq!(h.transport.peak_concurrency(), 1);
}

#[tokio::test(start_paused = true)]
async fn going_online_while_authenticated_triggers_a_pass() {
    let h = harness_with(GateState::new(false, true)).await;
    queue_completion(&h, "del_1").await;
    let cancel = CancellationToken::new();
    let runner = tokio::spawn({
        let orchestrator = h.orchestrator.clone();
        let cancel = cancel.clone();
        async move { orchestrator.run(cancel).await }
    });

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(mutation_count(&h).await, 0, "no sync while offline");

    h.gate.set_connected(true);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(mutation_count(&h).await, 1);

    cancel.cancel();
    runner.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn timer_runs_only_while_eligible() {
    let h = harness_with(GateState::new(true, true)).await;
    queue_completion(&h, "del_1").await;
    let cancel = CancellationToken::new();
    let runner = tokio::spawn({
        let orchestrator = h.orchestrator.clone();
        let cancel = cancel.clone();
        async move { orchestrator.run(cancel).await }
    });

    // Already eligible at startup: immediate pass.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(mutation_count(&h).await, 1);

    queue_completion(&h, "del_2").await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(mutation_count(&h).await, 2, "periodic pass");

    h.gate.set_connected(false);
    queue_completion(&h, "del_3").await;
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(mutation_count(&h).await, 2, "timer stopped while offline");

    h.gate.set_connected(true);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(mutation_count(&h).await, 3, "pass on reconnect");

    cancel.cancel();
    runner.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn in_flight_pass_finishes_after_going_offline() {
    let h = harness_with(GateState::new(false, true)).await;
    queue_completion(&h, "del_1").await;
    h.transport.set_latency(Duration::from_secs(5)).await;
    let cancel = CancellationToken::new();
    let runner = tokio::spawn({
        let orchestrator = h.orchestrator.clone();
        let cancel = cancel.clone();
        async move { orchestrator.run(cancel).await }
    });

    h.gate.set_connected(true);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.orchestrator.is_syncing());
    h.gate.set_connected(false);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!h.orchestrator.is_syncing());
    assert!(h.store.list_data_queue_items().await.unwrap().is_empty());

    cancel.cancel();
    runner.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn rejected_credentials_pause_sync_until_reauthentication() {
    let h = harness_with(GateState::new(true, true)).await;
    queue_completion(&h, "del_1").await;
    h.transport
        .script_mutations([Err(RemoteError::Unauthorized)])
        .await;
    let cancel = CancellationToken::new();
    let runner = tokio::spawn({
        let orchestrator = h.orchestrator.clone();
        let cancel = cancel.clone();
        async move { orchestrator.run(cancel).await }
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!h.gate.current().is_authenticated);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(mutation_count(&h).await, 1);

    h.gate.set_authenticated(true);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(mutation_count(&h).await, 2);
    assert!(h.store.list_data_queue_items().await.unwrap().is_empty());
    assert!(h.orchestrator.status().last_sync_error.is_none());

    // The periodic timer is back as well.
    queue_completion(&h, "del_2").await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(mutation_count(&h).await, 3);

    cancel.cancel();
    runner.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn engines_sharing_a_database_never_overlap() {
    let h = TestHarness::builder().sqlite().build().await.unwrap();
    queue_completion(&h, "del_1").await;
    h.transport.set_latency(Duration::from_millis(300)).await;
    let other = h.second_engine().await.unwrap();

    let (first, second) = tokio::join!(h.orchestrator.sync_now(), other.sync_now());
    let outcomes = [first, second];
    let completed = outcomes
        .iter()
        .filter(|o| matches!(o, PassOutcome::Completed(_)))
        .count();
    let skipped = outcomes
        .iter()
        .filter(|o| **o == PassOutcome::Skipped)
        .count();
    assert_eq!((completed, skipped), (1, 1), "got {outcomes:?}");
    assert_eq!(mutation_count(&h).await, 1);
    assert_eq!(h.transport.peak_concurrency(), 1);

    // The lease is released once the pass ends.
    assert!(matches!(other.sync_now().await, PassOutcome::Completed(_)));
    assert!(matches!(
        h.orchestrator.sync_now().await,
        PassOutcome::Completed(_)
    ));
}

#[tokio::test]
async fn unexpected_error_fails_the_pass_and_clears_the_flag() {
    let h = TestHarness::new().await.unwrap();
    queue_completion(&h, "del_1").await;
    h.memory.set_fail_reads(true);

    let outcome = h.orchestrator.sync_now().await;
    assert!(matches!(outcome, PassOutcome::Failed(ref msg) if msg.contains("injected")));
    let status = h.orchestrator.status();
    assert!(!status.is_syncing);
    assert!(status.last_sync_at.is_none());
    assert!(status.last_sync_error.is_some());
    assert!(!h.orchestrator.is_syncing());

    h.memory.set_fail_reads(false);
    assert!(matches!(
        h.orchestrator.sync_now().await,
        PassOutcome::Completed(_)
    ));
    let status = h.orchestrator.status();
    assert!(status.last_sync_at.is_some());
    assert!(status.last_sync_error.is_none());
}
