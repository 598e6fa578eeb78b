mod common;

use async_trait::async_trait;
use common::{addresses, settings, Harness, ScriptedProbe};
use email_verify_core::channel::memory::memory_pair;
use email_verify_core::orchestrator::{Backends, Verifier};
use email_verify_core::storage::{MemorySink, MemorySource};
use email_verify_core::verification::{ProbeFailure, ProbeResult, VerificationCapability};
use email_verify_core::{AppError, JobSnapshot, JobState, ResultRow};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn index_of(address: &str) -> usize {
    address
        .trim_start_matches("user")
        .split('@')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap()
}

fn rows_by_email(harness: &Harness) -> HashMap<String, ResultRow> {
    harness
        .sink
        .commits()
        .into_iter()
        .flat_map(|c| c.rows)
        .map(|r| (r.email.clone(), r))
        .collect()
}

#[tokio::test]
async fn twenty_three_addresses_in_batches_of_ten() {
    let harness = Harness::new(ScriptedProbe::always_ok());
    let verifier = harness.verifier(1, addresses(23), settings(23, 10, 1, &[]));
    let (channel, mut peer) = memory_pair();
    verifier.attach_channel(channel.handle());

    verifier.run().await.unwrap();

    let events = peer.drain();
    let batch_starts: Vec<_> = events
        .iter()
        .filter(|e| e.event_name == "batch-start")
        .map(|e| e.payload.as_str())
        .collect();
    assert_eq!(batch_starts, vec!["0", "1", "2"]);

    let details: Vec<JobSnapshot> = events
        .iter()
        .filter(|e| e.event_name == "get-verifier-details-res")
        .map(|e| serde_json::from_str(&e.payload).unwrap())
        .collect();
    assert_eq!(details.len(), 2);
    assert_eq!(details[0].state, JobState::Running);
    assert_eq!(details[1].state, JobState::Done);
    assert_eq!(details[1].completed_batches.len(), 3);

    let counts: Vec<_> = harness.sink.commits().iter().map(|c| c.rows.len()).collect();
    assert_eq!(counts, vec![10, 10, 3]);
    assert_eq!(events.iter().filter(|e| e.event_name == "update-db-done").count(), 3);
    assert_eq!(events.iter().filter(|e| e.event_name == "batch-delay").count(), 2);
    assert_eq!(verifier.state(), JobState::Done);
}

#[tokio::test]
async fn every_item_is_counted_exactly_once_per_batch() {
    // 0: ok, 1: no such host, 2: transient once, 3: always transient, 4: unclassified
    let probe = ScriptedProbe::new(|address, attempt| match index_of(address) % 5 {
        0 => Ok(Some(ProbeResult::deliverable(false))),
        1 => Err(ProbeFailure::new("lookup example.com: no such host")),
        2 if attempt == 0 => Err(ProbeFailure::new("dial tcp: i/o timeout")),
        2 => Ok(Some(ProbeResult::deliverable(true))),
        3 => Err(ProbeFailure::new("smtp has timed out")),
        _ => Err(ProbeFailure::new("catastrophic damage")),
    });
    let harness = Harness::new(probe);
    let verifier = harness.verifier(2, addresses(37), settings(37, 10, 2, &[]));

    verifier.run().await.unwrap();

    let snapshot = verifier.snapshot();
    let sizes = [10, 10, 10, 7];
    for (n, units) in &snapshot.completed_batches {
        let settled: usize = units.iter().map(|u| u.success + u.failed).sum();
        assert_eq!(settled, sizes[*n], "batch {}", n);
        for u in units {
            assert!(u.progress <= u.total);
            assert_eq!(u.progress, u.total);
        }
    }

    let rows = rows_by_email(&harness);
    assert_eq!(rows.len(), 37);
    for (email, row) in &rows {
        match index_of(email) % 5 {
            0 | 2 => assert!(row.error_msg.is_none() && row.is_deliverable, "{}", email),
            1 => {
                assert!(!row.is_host_exists);
                assert!(row.error_msg.as_deref().unwrap().contains("no such host"));
            }
            3 => assert_eq!(row.error_msg.as_deref(), Some("smtp has timed out")),
            _ => assert_eq!(row.error_msg.as_deref(), Some("catastrophic damage")),
        }
    }

    // Host-not-found and unclassified failures are never retried.
    assert_eq!(harness.probe.attempts_for("user1@example.com"), 1);
    assert_eq!(harness.probe.attempts_for("user4@example.com"), 1);
    assert_eq!(harness.probe.attempts_for("user2@example.com"), 2);
    assert_eq!(harness.probe.attempts_for("user3@example.com"), 3);
}

#[tokio::test]
async fn always_transient_items_end_with_an_error_after_the_last_round() {
    let probe = ScriptedProbe::new(|_, _| Err(ProbeFailure::new("451 temporarily unavailable")));
    let harness = Harness::new(probe);
    let verifier = harness.verifier(3, addresses(4), settings(4, 4, 2, &[]));
    let (channel, mut peer) = memory_pair();
    verifier.attach_channel(channel.handle());

    verifier.run().await.unwrap();

    for address in addresses(4) {
        assert_eq!(harness.probe.attempts_for(&address), 3);
    }
    let rows = rows_by_email(&harness);
    assert!(rows
        .values()
        .all(|r| r.error_msg.as_deref() == Some("451 temporarily unavailable")));
    assert!(rows.values().all(|r| r.is_valid_syntax));

    let units = &verifier.snapshot().completed_batches[&0];
    assert_eq!(units.len(), 3);
    assert_eq!((units[0].retry, units[0].failed), (4, 0));
    assert_eq!((units[1].retry, units[1].failed), (4, 0));
    assert_eq!((units[2].retry, units[2].failed), (0, 4));

    let events = peer.drain();
    let names: Vec<_> = events.iter().map(|e| e.event_name.as_str()).collect();
    assert_eq!(names.iter().filter(|n| **n == "retry-begin").count(), 2);
    assert_eq!(names.iter().filter(|n| **n == "retry-delay").count(), 2);
    assert_eq!(names.iter().filter(|n| **n == "after-all-retries").count(), 1);
}

#[tokio::test]
async fn retries_stop_early_once_nothing_is_flagged() {
    let probe = ScriptedProbe::new(|_, attempt| {
        if attempt == 0 {
            Err(ProbeFailure::new("i/o timeout"))
        } else {
            Ok(Some(ProbeResult::deliverable(false)))
        }
    });
    let harness = Harness::new(probe);
    let verifier = harness.verifier(4, addresses(6), settings(6, 6, 5, &[]));

    verifier.run().await.unwrap();

    let units = &verifier.snapshot().completed_batches[&0];
    assert_eq!(units.len(), 2);
    assert_eq!(units[1].total, 6);
    assert_eq!(units[1].success, 6);
    assert_eq!(harness.probe.calls().len(), 12);
}

#[tokio::test]
async fn zero_retry_rounds_record_transient_failures_immediately() {
    let probe = ScriptedProbe::new(|_, _| Err(ProbeFailure::new("i/o timeout")));
    let harness = Harness::new(probe);
    let verifier = harness.verifier(5, addresses(3), settings(3, 10, 0, &[]));

    verifier.run().await.unwrap();

    let units = &verifier.snapshot().completed_batches[&0];
    assert_eq!(units.len(), 1);
    assert_eq!((units[0].failed, units[0].retry), (3, 0));
    let rows = rows_by_email(&harness);
    assert!(rows
        .values()
        .all(|r| r.error_msg.as_deref() == Some("i/o timeout") && r.is_valid_syntax));
}

#[tokio::test]
async fn transient_failures_mark_syntax_valid_on_every_attempt() {
    // user0 recovers on retry, user1 never does, user2 fails unclassified.
    let probe = ScriptedProbe::new(|address, attempt| match address {
        "user0@example.com" if attempt > 0 => Ok(Some(ProbeResult::deliverable(false))),
        "user2@example.com" => Err(ProbeFailure::new("mailbox quota exceeded")),
        _ => Err(ProbeFailure::new("i/o timeout")),
    });
    let harness = Harness::new(probe);
    let verifier = harness.verifier(15, addresses(3), settings(3, 3, 1, &[]));

    verifier.run().await.unwrap();

    let rows = rows_by_email(&harness);
    let recovered = &rows["user0@example.com"];
    assert!(recovered.is_valid_syntax && recovered.error_msg.is_none());
    let exhausted = &rows["user1@example.com"];
    assert!(exhausted.is_valid_syntax);
    assert_eq!(exhausted.error_msg.as_deref(), Some("i/o timeout"));
    let unclassified = &rows["user2@example.com"];
    assert!(!unclassified.is_valid_syntax);
    assert_eq!(harness.probe.attempts_for("user2@example.com"), 1);
}

#[tokio::test]
async fn proxy_advances_per_batch_and_is_stable_across_retries() {
    let probe = ScriptedProbe::new(|_, attempt| {
        if attempt == 0 {
            Err(ProbeFailure::new("has timed out"))
        } else {
            Ok(Some(ProbeResult::deliverable(false)))
        }
    });
    let harness = Harness::new(probe);
    let verifier = harness.verifier(6, addresses(10), settings(10, 2, 1, &["p0", "p1", "p2"]));
    assert_eq!(verifier.snapshot().cur_proxy_idx, 0);

    verifier.run().await.unwrap();

    for (address, proxy) in harness.probe.calls() {
        let batch = index_of(&address) / 2;
        assert_eq!(proxy, Some(format!("p{}", batch % 3)), "{}", address);
    }
    // Five batches: the rotator advanced between them, four times.
    assert_eq!(verifier.snapshot().cur_proxy_idx, 4 % 3);
}

#[tokio::test]
async fn run_on_a_finished_job_is_rejected_without_side_effects() {
    let harness = Harness::new(ScriptedProbe::always_ok());
    let verifier = harness.verifier(7, addresses(5), settings(5, 2, 1, &[]));
    verifier.run().await.unwrap();
    let commits = harness.sink.commits().len();
    let calls = harness.probe.calls().len();

    let (channel, mut peer) = memory_pair();
    verifier.attach_channel(channel.handle());
    let err = verifier.run().await.unwrap_err();

    assert!(matches!(
        err,
        AppError::InvalidState {
            job_id: 7,
            state: JobState::Done
        }
    ));
    assert_eq!(harness.sink.commits().len(), commits);
    assert_eq!(harness.probe.calls().len(), calls);
    assert!(peer.drain().is_empty());
}

#[tokio::test]
async fn persistence_failure_aborts_the_run_and_leaves_it_running() {
    let harness = Harness::with_sink(ScriptedProbe::always_ok(), MemorySink::failing_on(1));
    let verifier = harness.verifier(8, addresses(6), settings(6, 2, 0, &[]));

    let err = verifier.run().await.unwrap_err();

    assert!(matches!(err, AppError::Persistence { job_id: 8, batch: 1, .. }));
    assert_eq!(verifier.state(), JobState::Running);
    let committed: Vec<_> = harness.sink.commits().iter().map(|c| c.batch).collect();
    assert_eq!(committed, vec![0]);
    assert_eq!(harness.probe.attempts_for("user4@example.com"), 0);
    assert!(verifier.snapshot().completed_batches.contains_key(&0));
    assert!(!verifier.snapshot().completed_batches.contains_key(&1));
}

#[tokio::test]
async fn blank_lines_are_skipped_but_keep_their_slot() {
    let harness = Harness::new(ScriptedProbe::always_ok());
    let list = vec![
        "a@example.com".to_string(),
        "".to_string(),
        "   ".to_string(),
        "b@example.com".to_string(),
    ];
    let verifier = harness.verifier(9, list, settings(4, 4, 1, &[]));

    verifier.run().await.unwrap();

    assert_eq!(harness.probe.calls().len(), 2);
    let commits = harness.sink.commits();
    assert_eq!(commits[0].rows.len(), 4);
    assert_eq!(commits[0].rows[1].error_msg.as_deref(), Some("empty address"));
    assert_eq!(commits[0].rows[3].email, "b@example.com");

    let unit = verifier.snapshot().completed_batches[&0][0];
    assert_eq!(unit.success + unit.failed, 2);
    assert_eq!(unit.total, 4);
}

#[tokio::test]
async fn rows_land_in_their_own_slot_regardless_of_completion_order() {
    struct Staggered;

    #[async_trait]
    impl VerificationCapability for Staggered {
        async fn verify(
            &self,
            address: &str,
            _proxy: Option<&str>,
        ) -> Result<Option<ProbeResult>, ProbeFailure> {
            let n = index_of(address) as u64;
            tokio::time::sleep(Duration::from_millis(20 - n * 2)).await;
            Ok(Some(ProbeResult::deliverable(false)))
        }
    }

    let source = Arc::new(MemorySource::new());
    source.insert(10, addresses(8));
    let sink = Arc::new(MemorySink::new());
    let backends = Backends::new(Arc::new(Staggered), source, sink.clone());
    let verifier = Verifier::create(10, settings(8, 8, 0, &[]), backends).unwrap();

    verifier.run().await.unwrap();

    let rows = &sink.commits()[0].rows;
    let emails: Vec<_> = rows.iter().map(|r| r.email.clone()).collect();
    assert_eq!(emails, addresses(8));
    assert!(rows.iter().all(|r| r.job_id == 10));
}

#[tokio::test]
async fn max_concurrency_bounds_in_flight_probes() {
    #[derive(Default)]
    struct Gauge {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl VerificationCapability for Gauge {
        async fn verify(
            &self,
            _address: &str,
            _proxy: Option<&str>,
        ) -> Result<Option<ProbeResult>, ProbeFailure> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Some(ProbeResult::deliverable(false)))
        }
    }

    let gauge = Arc::new(Gauge::default());
    let source = Arc::new(MemorySource::new());
    source.insert(11, addresses(20));
    let backends = Backends::new(gauge.clone(), source, Arc::new(MemorySink::new()))
        .with_max_concurrency(Some(3));
    let verifier = Verifier::create(11, settings(20, 20, 0, &[]), backends).unwrap();

    verifier.run().await.unwrap();

    let peak = gauge.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak was {}", peak);
    assert!(peak >= 2, "peak was {}", peak);
}
