use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use synth_payments::{
    BankMutator, BankPool, Config, EmissionMode, FailurePolicy, Orchestrator, RunError, Stats,
    Status,
};

use crate::support::{FailingSink, RecordingProvisioner, RecordingSink};

mod support;

/// A small configuration with zero delays and a single two-status workflow.
fn scenario_config() -> Config {
    Config {
        payments: 5,
        workers: 2,
        sources: 2,
        destinations: 2,
        delays_ms: HashMap::new(),
        workflows: vec![("Initiated, Completed".to_string(), 1)],
        bank_update_interval: Duration::from_secs(3600),
        seed: Some(42),
        ..Config::default()
    }
}

fn orchestrator(
    config: Config,
    stats: Arc<Stats>,
    sink: Arc<RecordingSink>,
) -> (Orchestrator, Arc<RecordingProvisioner>) {
    let provisioner = Arc::new(RecordingProvisioner::default());
    let orchestrator =
        Orchestrator::new(config, stats, sink, provisioner.clone()).unwrap();
    (orchestrator, provisioner)
}

/// Given 2+2 banks, one `[Initiated, Completed]` workflow and 5 payments
/// When the run completes
/// Then each payment got exactly 2 status emissions and the snapshot shows
/// Initiated=5, Completed=5 and every other status at zero.
#[tokio::test(start_paused = true)]
async fn end_to_end_scenario() {
    let stats = Arc::new(Stats::with_all_statuses());
    let sink = Arc::new(RecordingSink::default());
    let (orchestrator, _) = orchestrator(scenario_config(), Arc::clone(&stats), Arc::clone(&sink));

    let summary = orchestrator.run().await.unwrap();

    assert_eq!(summary.payments, 5);
    assert_eq!(summary.events_emitted, 10);
    assert_eq!(summary.events_failed, 0);
    assert_eq!(sink.flushes(), 1);

    let payments = sink.payments();
    assert_eq!(payments.len(), 10);

    let mut by_id: HashMap<String, Vec<Status>> = HashMap::new();
    for payment in &payments {
        assert!(["bank-0", "bank-1"].contains(&payment.source.as_str()));
        assert!(["bank-2", "bank-3"].contains(&payment.destination.as_str()));
        by_id.entry(payment.id.clone()).or_default().push(payment.status);
    }

    assert_eq!(by_id.len(), 5, "each payment is emitted under one id");
    for statuses in by_id.values() {
        let unique: HashSet<_> = statuses.iter().collect();
        assert_eq!(
            unique,
            HashSet::from([&Status::Initiated, &Status::Completed]),
            "each payment emits Initiated and Completed exactly once"
        );
    }

    let snapshot = &summary.stats;
    assert_eq!(snapshot.statuses["Initiated"], 5);
    assert_eq!(snapshot.statuses["Completed"], 5);
    for status in Status::ALL {
        if status != Status::Initiated && status != Status::Completed {
            assert_eq!(snapshot.statuses[status.name()], 0);
        }
    }
    assert_eq!(snapshot.workflows["Initiated,Completed"], 5);
}

/// Given a single worker and a three-status workflow with staggered delays
/// When three payments are processed
/// Then all emissions of one payment precede any emission of the next
/// (the fan-in barrier), while the statuses within one payment arrive in
/// delay order rather than lifecycle order (concurrent emission).
#[tokio::test(start_paused = true)]
async fn barrier_holds_while_statuses_emit_out_of_order() {
    let config = Config {
        payments: 3,
        workers: 1,
        workflows: vec![("Initiated, Validated, Completed".to_string(), 1)],
        delays_ms: HashMap::from([
            ("initiated".to_string(), 100),
            ("validated".to_string(), 50),
            ("completed".to_string(), 10),
        ]),
        ..scenario_config()
    };

    let stats = Arc::new(Stats::with_all_statuses());
    let sink = Arc::new(RecordingSink::default());
    let (orchestrator, _) = orchestrator(config, stats, Arc::clone(&sink));

    orchestrator.run().await.unwrap();

    let payments = sink.payments();
    assert_eq!(payments.len(), 9);

    let mut seen_ids = Vec::new();
    for chunk in payments.chunks(3) {
        let ids: HashSet<_> = chunk.iter().map(|p| p.id.clone()).collect();
        assert_eq!(
            ids.len(),
            1,
            "a worker must not start the next payment before the barrier"
        );
        let id = ids.into_iter().next().unwrap();
        assert!(!seen_ids.contains(&id), "payments are processed once");
        seen_ids.push(id);

        // Shortest delay publishes first: lifecycle order is not preserved.
        assert_eq!(chunk[0].status, Status::Completed);
        assert_eq!(chunk[1].status, Status::Validated);
        assert_eq!(chunk[2].status, Status::Initiated);
    }
}

/// Given sequential emission mode with the same staggered delays
/// Then statuses arrive in lifecycle order.
#[tokio::test(start_paused = true)]
async fn sequential_mode_emits_in_lifecycle_order() {
    let config = Config {
        payments: 2,
        workers: 1,
        emission: EmissionMode::Sequential,
        workflows: vec![("Initiated, Validated, Completed".to_string(), 1)],
        delays_ms: HashMap::from([
            ("initiated".to_string(), 100),
            ("validated".to_string(), 50),
            ("completed".to_string(), 10),
        ]),
        ..scenario_config()
    };

    let stats = Arc::new(Stats::with_all_statuses());
    let sink = Arc::new(RecordingSink::default());
    let (orchestrator, _) = orchestrator(config, stats, Arc::clone(&sink));

    orchestrator.run().await.unwrap();

    let payments = sink.payments();
    assert_eq!(payments.len(), 6);
    for chunk in payments.chunks(3) {
        assert_eq!(chunk[0].status, Status::Initiated);
        assert_eq!(chunk[1].status, Status::Validated);
        assert_eq!(chunk[2].status, Status::Completed);
    }
}

/// Given a sink that fails every publish to `payment-completed`
/// When the failure policy is Abort
/// Then the run drains fully, reports the failure count, and the
/// successfully published events are still accounted.
#[tokio::test(start_paused = true)]
async fn abort_policy_fails_the_run_after_drain() {
    let stats = Arc::new(Stats::with_all_statuses());
    let sink = Arc::new(FailingSink::new("payment-completed"));
    let orchestrator = Orchestrator::new(
        scenario_config(),
        Arc::clone(&stats),
        sink.clone(),
        Arc::new(RecordingProvisioner::default()),
    )
    .unwrap();

    let err = orchestrator.run().await.unwrap_err();

    match err {
        RunError::EmissionsFailed { failed, .. } => assert_eq!(failed, 5),
        other => panic!("expected EmissionsFailed, got {other}"),
    }

    // Every Initiated emission was delivered before the run was failed.
    assert_eq!(sink.delivered().len(), 5);
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.statuses["Initiated"], 5);
    assert_eq!(snapshot.statuses["Completed"], 0);
}

/// Given the same failing sink but a Continue policy
/// Then the run completes with the failures counted in the summary.
#[tokio::test(start_paused = true)]
async fn continue_policy_counts_failures_in_the_summary() {
    let config = Config {
        failure_policy: FailurePolicy::Continue,
        ..scenario_config()
    };

    let stats = Arc::new(Stats::with_all_statuses());
    let sink = Arc::new(FailingSink::new("payment-completed"));
    let orchestrator = Orchestrator::new(
        config,
        Arc::clone(&stats),
        sink.clone(),
        Arc::new(RecordingProvisioner::default()),
    )
    .unwrap();

    let summary = orchestrator.run().await.unwrap();

    assert_eq!(summary.events_emitted, 5);
    assert_eq!(summary.events_failed, 5);
    assert_eq!(summary.stats.statuses["Initiated"], 5);
    assert_eq!(summary.stats.statuses["Completed"], 0);
}

/// Given a drain timeout shorter than the configured status delay
/// Then the run aborts with a DrainTimeout error.
#[tokio::test(start_paused = true)]
async fn drain_timeout_aborts_a_stuck_run() {
    let config = Config {
        payments: 1,
        workers: 1,
        workflows: vec![("Initiated".to_string(), 1)],
        delays_ms: HashMap::from([("initiated".to_string(), 1_000_000)]),
        drain_timeout: Some(Duration::from_secs(1)),
        ..scenario_config()
    };

    let stats = Arc::new(Stats::with_all_statuses());
    let sink = Arc::new(RecordingSink::default());
    let (orchestrator, _) = orchestrator(config, stats, sink);

    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, RunError::DrainTimeout(_)));
}

/// Every channel the engine publishes to is ensured at startup.
#[tokio::test(start_paused = true)]
async fn startup_provisions_every_channel() {
    let config = Config {
        payments: 0,
        workers: 1,
        ..scenario_config()
    };

    let stats = Arc::new(Stats::with_all_statuses());
    let sink = Arc::new(RecordingSink::default());
    let (orchestrator, provisioner) = orchestrator(config, stats, sink);

    orchestrator.run().await.unwrap();

    let ensured = provisioner.ensured();
    let names: HashSet<String> = ensured.iter().map(|spec| spec.name.clone()).collect();

    let mut expected: HashSet<String> =
        Status::ALL.iter().map(|status| status.channel()).collect();
    expected.insert("banks".to_string());

    assert_eq!(names, expected);
    assert!(ensured.iter().all(|spec| spec.replication == 3));
}

/// Given `t` ticks with no overlapping stop signal
/// Then exactly `t` bank updates are published and counted, and each bank's
/// version increases strictly by one per mutation.
#[tokio::test(start_paused = true)]
async fn bank_mutator_versions_increase_per_tick() {
    let stats = Arc::new(Stats::new());
    let sink = Arc::new(RecordingSink::default());

    let pool = BankPool::build(2, 2, Some(42)).unwrap();
    let handle = BankMutator::new(
        pool,
        Duration::from_millis(100),
        sink.clone(),
        Arc::clone(&stats),
        Some(42),
    )
    .spawn();

    tokio::time::sleep(Duration::from_millis(1050)).await;
    let updates = handle.stop().await.unwrap();

    assert_eq!(updates, 10);
    assert_eq!(stats.snapshot().bank_total(), 10);

    let banks = sink.banks();
    assert_eq!(banks.len(), 10);

    let mut versions: HashMap<String, Vec<u64>> = HashMap::new();
    for bank in banks {
        versions.entry(bank.id.clone()).or_default().push(bank.version);
    }
    for (id, versions) in versions {
        let expected: Vec<u64> = (1..=versions.len() as u64).collect();
        assert_eq!(versions, expected, "versions of {id} must increase by 1");
    }
}

/// Aggregator exactness under many concurrent tasks: `k` tasks adding `n`
/// increments each land exactly `k * n`.
#[tokio::test]
async fn concurrent_increments_from_many_tasks() {
    let stats = Arc::new(Stats::with_all_statuses());
    let k = 16;
    let n = 500;

    let tasks = (0..k).map(|_| {
        let stats = Arc::clone(&stats);
        tokio::spawn(async move {
            for _ in 0..n {
                stats.inc_status("Accounted");
            }
        })
    });

    join_all(tasks).await;

    assert_eq!(stats.snapshot().statuses["Accounted"], k * n);
}
