//! Integration tests: the fulfillment lifecycle end to end.
//!
//! Covers the contract of the ledger operations (threshold crossing,
//! terminal-state rejection, cancellation), the per-request linearization
//! under concurrent pledges, event-log replay equivalence, and durable
//! snapshot recovery.

use hemolink_core::{BloodType, DonorId, LedgerError, NewRequest, RequestStatus, UrgencyLevel};
use hemolink_ledger::{
    EventJournal, InMemoryStore, JsonlStore, RequestFilter, RequestLedger,
    replay_events_from_path,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(prefix: &str) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!(
        "hemolink-lifecycle-{prefix}-{}-{unique}.jsonl",
        std::process::id()
    ))
}

fn o_neg(required: u32) -> NewRequest {
    NewRequest::new("Asha Rao", "City General", "+1-555-0100", BloodType::ONeg, required)
}

#[tokio::test]
async fn pledges_accumulate_until_the_threshold_closes_the_request() {
    let ledger = RequestLedger::new(InMemoryStore::new());
    let request = ledger.create(o_neg(2)).await.expect("create");

    let first = ledger
        .submit_pledge(request.id, DonorId::new("donor-a"), 1)
        .await
        .expect("first pledge");
    assert_eq!(first.status, RequestStatus::Pending);
    assert_eq!(first.total_units, 1);

    let second = ledger
        .submit_pledge(request.id, DonorId::new("donor-b"), 1)
        .await
        .expect("second pledge");
    assert_eq!(second.status, RequestStatus::Fulfilled);
    assert_eq!(second.total_units, 2);

    let err = ledger
        .submit_pledge(request.id, DonorId::new("donor-c"), 1)
        .await
        .expect_err("pledge after closure must be rejected");
    assert!(matches!(
        err,
        LedgerError::Closed {
            status: RequestStatus::Fulfilled,
            ..
        }
    ));

    let snapshot = ledger.get(request.id).expect("snapshot");
    assert_eq!(snapshot.total_units(), 2);
    assert_eq!(snapshot.pledges.len(), 2);
}

#[tokio::test]
async fn overshoot_is_recorded_in_full_and_fulfills() {
    let ledger = RequestLedger::new(InMemoryStore::new());
    let request = ledger.create(o_neg(2)).await.expect("create");

    let receipt = ledger
        .submit_pledge(request.id, DonorId::new("donor-a"), 10)
        .await
        .expect("overshoot pledge");
    assert_eq!(receipt.status, RequestStatus::Fulfilled);
    assert_eq!(receipt.total_units, 10);

    let snapshot = ledger.get(request.id).expect("snapshot");
    assert_eq!(snapshot.pledges[0].units, 10, "pledge must not be trimmed");
}

#[tokio::test]
async fn cancel_is_terminal_and_blocks_every_later_mutation() {
    let ledger = RequestLedger::new(InMemoryStore::new());
    let request = ledger.create(o_neg(3)).await.expect("create");

    let cancelled = ledger.cancel(request.id).await.expect("cancel");
    assert_eq!(cancelled.status, RequestStatus::Cancelled);

    let err = ledger
        .submit_pledge(request.id, DonorId::new("donor-a"), 5)
        .await
        .expect_err("pledge after cancel must be rejected");
    assert!(matches!(
        err,
        LedgerError::Closed {
            status: RequestStatus::Cancelled,
            ..
        }
    ));
    assert_eq!(ledger.get(request.id).expect("snapshot").total_units(), 0);

    let err = ledger
        .cancel(request.id)
        .await
        .expect_err("second cancel must be rejected");
    assert!(matches!(err, LedgerError::Closed { .. }));
}

#[tokio::test]
async fn cancel_of_a_fulfilled_request_is_rejected() {
    let ledger = RequestLedger::new(InMemoryStore::new());
    let request = ledger.create(o_neg(1)).await.expect("create");
    ledger
        .submit_pledge(request.id, DonorId::new("donor-a"), 1)
        .await
        .expect("fulfilling pledge");

    let err = ledger
        .cancel(request.id)
        .await
        .expect_err("cancel after fulfillment must be rejected");
    assert!(matches!(
        err,
        LedgerError::Closed {
            status: RequestStatus::Fulfilled,
            ..
        }
    ));
}

#[tokio::test]
async fn retarget_reruns_the_threshold_check_against_existing_pledges() {
    let ledger = RequestLedger::new(InMemoryStore::new());
    let request = ledger.create(o_neg(5)).await.expect("create");
    ledger
        .submit_pledge(request.id, DonorId::new("donor-a"), 3)
        .await
        .expect("pledge");

    // Raising the target keeps the request open.
    let raised = ledger.retarget(request.id, 7).await.expect("retarget up");
    assert_eq!(raised.status, RequestStatus::Pending);
    assert_eq!(raised.required_units, 7);

    // Lowering it below the accumulated total fulfills immediately.
    let lowered = ledger.retarget(request.id, 2).await.expect("retarget down");
    assert_eq!(lowered.status, RequestStatus::Fulfilled);

    let err = ledger
        .retarget(request.id, 9)
        .await
        .expect_err("retarget after closure must be rejected");
    assert!(matches!(err, LedgerError::Closed { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_pledges_against_one_request_are_linearized() {
    let ledger = Arc::new(RequestLedger::new(InMemoryStore::new()));
    let request = ledger.create(o_neg(5)).await.expect("create");

    let a = tokio::spawn({
        let ledger = Arc::clone(&ledger);
        let id = request.id;
        async move { ledger.submit_pledge(id, DonorId::new("donor-a"), 3).await }
    });
    let b = tokio::spawn({
        let ledger = Arc::clone(&ledger);
        let id = request.id;
        async move { ledger.submit_pledge(id, DonorId::new("donor-b"), 3).await }
    });

    let first = a.await.expect("task a").expect("pledge a accepted");
    let second = b.await.expect("task b").expect("pledge b accepted");

    // Exactly one linearized order: one pledge saw total 3 and left the
    // request pending, the other saw total 6 and fulfilled it.
    let mut receipts = [first, second];
    receipts.sort_by_key(|r| r.total_units);
    assert_eq!(receipts[0].status, RequestStatus::Pending);
    assert_eq!(receipts[0].total_units, 3);
    assert_eq!(receipts[1].status, RequestStatus::Fulfilled);
    assert_eq!(receipts[1].total_units, 6);

    let snapshot = ledger.get(request.id).expect("snapshot");
    assert_eq!(snapshot.status, RequestStatus::Fulfilled);
    assert_eq!(snapshot.total_units(), 6);
    assert_eq!(snapshot.pledges.len(), 2, "no pledge may be dropped");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn latecomers_after_the_threshold_are_rejected_exactly() {
    let ledger = Arc::new(RequestLedger::new(InMemoryStore::new()));
    let request = ledger.create(o_neg(5)).await.expect("create");

    let mut handles = Vec::new();
    for i in 0..10 {
        let ledger = Arc::clone(&ledger);
        let id = request.id;
        handles.push(tokio::spawn(async move {
            ledger
                .submit_pledge(id, DonorId::new(format!("donor-{i}")), 1)
                .await
        }));
    }

    let mut accepted = 0;
    let mut closed = 0;
    for handle in handles {
        match handle.await.expect("task must not panic") {
            Ok(_) => accepted += 1,
            Err(LedgerError::Closed { .. }) => closed += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // One-unit pledges against a target of 5: the fifth accepted pledge
    // closes the request and every later submission fails Closed.
    assert_eq!(accepted, 5);
    assert_eq!(closed, 5);

    let snapshot = ledger.get(request.id).expect("snapshot");
    assert_eq!(snapshot.status, RequestStatus::Fulfilled);
    assert_eq!(snapshot.total_units(), 5);
    assert_eq!(snapshot.pledges.len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_requests_do_not_contend() {
    let ledger = Arc::new(RequestLedger::new(InMemoryStore::new()));
    let first = ledger.create(o_neg(2)).await.expect("create first");
    let second = ledger.create(o_neg(2)).await.expect("create second");

    let mut handles = Vec::new();
    for id in [first.id, second.id] {
        for i in 0..2 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger
                    .submit_pledge(id, DonorId::new(format!("donor-{id}-{i}")), 1)
                    .await
            }));
        }
    }
    for handle in handles {
        handle
            .await
            .expect("task must not panic")
            .expect("every pledge fits its target");
    }

    for id in [first.id, second.id] {
        let snapshot = ledger.get(id).expect("snapshot");
        assert_eq!(snapshot.status, RequestStatus::Fulfilled);
        assert_eq!(snapshot.total_units(), 2);
    }
}

#[tokio::test]
async fn list_filters_and_orders_most_recent_first() {
    let ledger = RequestLedger::new(InMemoryStore::new());
    let older = ledger.create(o_neg(2)).await.expect("create older");
    let newer = ledger
        .create(
            NewRequest::new("Ben Okafor", "Mercy West", "+1-555-0111", BloodType::APos, 4)
                .urgency(UrgencyLevel::Critical),
        )
        .await
        .expect("create newer");
    ledger.cancel(older.id).await.expect("cancel older");

    let all = ledger.list(RequestFilter::default());
    let ids: Vec<_> = all.iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], newer.id, "most recent request must come first");

    let pending = ledger.list(RequestFilter::status(RequestStatus::Pending));
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, newer.id);

    let o_neg_only = ledger.list(RequestFilter::blood_type(BloodType::ONeg));
    assert_eq!(o_neg_only.len(), 1);
    assert_eq!(o_neg_only[0].id, older.id);
}

#[tokio::test]
async fn stats_track_the_dashboard_counts() {
    let ledger = RequestLedger::new(InMemoryStore::new());
    let open = ledger.create(o_neg(5)).await.expect("create open");
    ledger
        .submit_pledge(open.id, DonorId::new("donor-a"), 2)
        .await
        .expect("pledge");
    let done = ledger.create(o_neg(1)).await.expect("create done");
    ledger
        .submit_pledge(done.id, DonorId::new("donor-b"), 1)
        .await
        .expect("fulfilling pledge");
    let dropped = ledger.create(o_neg(4)).await.expect("create dropped");
    ledger.cancel(dropped.id).await.expect("cancel");

    let stats = ledger.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.fulfilled, 1);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.units_outstanding, 3);
}

#[tokio::test]
async fn journal_replay_rebuilds_the_published_state() {
    let journal_path = temp_path("journal");
    let ledger =
        RequestLedger::new(InMemoryStore::new()).with_journal(EventJournal::new(&journal_path));

    let request = ledger.create(o_neg(3)).await.expect("create");
    ledger
        .submit_pledge(request.id, DonorId::new("donor-a"), 1)
        .await
        .expect("first pledge");
    ledger
        .submit_pledge(request.id, DonorId::new("donor-b"), 2)
        .await
        .expect("second pledge");
    let other = ledger.create(o_neg(2)).await.expect("create other");
    ledger.cancel(other.id).await.expect("cancel other");

    let replayed = replay_events_from_path(&journal_path).expect("replay");
    assert_eq!(replayed.len(), 2);
    assert_eq!(
        replayed.get(&request.id).expect("fulfilled request"),
        &ledger.get(request.id).expect("live snapshot"),
    );
    assert_eq!(
        replayed.get(&other.id).expect("cancelled request"),
        &ledger.get(other.id).expect("live snapshot"),
    );

    let _ = std::fs::remove_file(journal_path);
}

#[tokio::test]
async fn jsonl_backed_ledger_survives_a_restart() {
    let snapshot_path = temp_path("snapshot");
    let request_id = {
        let ledger = RequestLedger::new(JsonlStore::new(&snapshot_path));
        let request = ledger.create(o_neg(4)).await.expect("create");
        ledger
            .submit_pledge(request.id, DonorId::new("donor-a"), 3)
            .await
            .expect("pledge");
        request.id
    };

    let revived = RequestLedger::hydrate(JsonlStore::new(&snapshot_path))
        .await
        .expect("hydrate");
    let snapshot = revived.get(request_id).expect("request must survive");
    assert_eq!(snapshot.status, RequestStatus::Pending);
    assert_eq!(snapshot.total_units(), 3);

    // The revived ledger keeps enforcing the lifecycle where it left off.
    let receipt = revived
        .submit_pledge(request_id, DonorId::new("donor-b"), 1)
        .await
        .expect("pledge after restart");
    assert_eq!(receipt.status, RequestStatus::Fulfilled);

    let _ = std::fs::remove_file(snapshot_path);
}
