//! End-to-end tests driving the assembled core through offline/online
//! cycles with nullable collaborators.

use drift_crypto::{keypair_from_seed, Ed25519Signer};
use drift_ledger::AccountHoldings;
use drift_nullables::{NullClock, NullLedger};
use drift_store::MemoryStore;
use drift_types::{
    AccountId, NewOfflineTransaction, Priority, SnapshotPatch, TxPayload, TxStatus,
};
use drift_wallet_core::{CoreConfig, CoreError, WalletCore, WalletEvent};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    core: Arc<WalletCore>,
    ledger: Arc<NullLedger>,
    clock: Arc<NullClock>,
    store: Arc<MemoryStore>,
}

fn harness() -> Harness {
    harness_with(CoreConfig::default())
}

fn harness_with(config: CoreConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(NullLedger::new());
    let clock = Arc::new(NullClock::at_secs(1_700_000_000));
    let signer = Arc::new(Ed25519Signer::new(keypair_from_seed(&[7u8; 32])));
    let core = WalletCore::new(config, store.clone(), ledger.clone(), signer, clock.clone())
        .expect("default config is valid");
    Harness {
        core: Arc::new(core),
        ledger,
        clock,
        store,
    }
}

fn transfer(from: &str, to: &str, amount: f64, priority: Priority) -> NewOfflineTransaction {
    NewOfflineTransaction {
        payload: TxPayload::Transfer {
            from: AccountId::new(from),
            to: AccountId::new(to),
            amount,
        },
        priority,
        max_retries: None,
    }
}

fn submitted_payloads(ledger: &NullLedger) -> Vec<TxPayload> {
    ledger
        .submissions()
        .iter()
        .map(|s| serde_json::from_slice(&s.payload).unwrap())
        .collect()
}

// Offline purchase: buffered while offline, executed on reconnect.
#[tokio::test]
async fn offline_transactions_drain_on_reconnect() {
    let h = harness();
    h.core.connectivity().set_offline();

    h.core
        .queue
        .enqueue(transfer("alice", "bob", 5.0, Priority::Medium))
        .unwrap();
    let report = h.core.queue.sync_pending().await.unwrap();
    assert!(!report.ran);
    assert_eq!(h.ledger.submission_count(), 0);

    h.core.connectivity().set_online();
    let report = h.core.queue.sync_pending().await.unwrap();
    assert!(report.ran);
    assert_eq!(report.executed, 1);
    assert_eq!(h.ledger.submission_count(), 1);
    assert_eq!(h.core.queue.pending_count(), 0);
}

#[tokio::test]
async fn drain_respects_priority_then_fifo() {
    let h = harness();
    h.core.connectivity().set_offline();

    h.core.queue.enqueue(transfer("a", "x", 1.0, Priority::Low)).unwrap();
    h.core.queue.enqueue(transfer("a", "x", 2.0, Priority::Medium)).unwrap();
    h.core.queue.enqueue(transfer("a", "x", 3.0, Priority::High)).unwrap();
    h.core.queue.enqueue(transfer("a", "x", 4.0, Priority::High)).unwrap();
    h.core.queue.enqueue(transfer("a", "x", 5.0, Priority::Low)).unwrap();

    h.core.connectivity().set_online();
    h.core.queue.sync_pending().await.unwrap();

    let amounts: Vec<f64> = submitted_payloads(&h.ledger)
        .iter()
        .map(|p| match p {
            TxPayload::Transfer { amount, .. } => *amount,
            other => panic!("unexpected payload {other:?}"),
        })
        .collect();
    assert_eq!(amounts, vec![3.0, 4.0, 2.0, 1.0, 5.0]);
}

#[tokio::test]
async fn queue_capacity_is_enforced() {
    let mut config = CoreConfig::default();
    config.max_queue_size = 2;
    let h = harness_with(config);
    h.core.connectivity().set_offline();

    h.core.queue.enqueue(transfer("a", "b", 1.0, Priority::Low)).unwrap();
    h.core.queue.enqueue(transfer("a", "b", 1.0, Priority::Low)).unwrap();
    assert!(matches!(
        h.core.queue.enqueue(transfer("a", "b", 1.0, Priority::Low)),
        Err(CoreError::QueueFull { max: 2 })
    ));
}

#[tokio::test]
async fn transient_failures_retry_until_success() {
    let h = harness();
    h.core.queue.enqueue(transfer("a", "b", 1.0, Priority::Medium)).unwrap();
    h.ledger.fail_next_submissions(2);

    // two drains burn retries, the third succeeds
    assert_eq!(h.core.queue.sync_pending().await.unwrap().executed, 0);
    assert_eq!(h.core.queue.sync_pending().await.unwrap().executed, 0);
    let report = h.core.queue.sync_pending().await.unwrap();
    assert_eq!(report.executed, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn retry_budget_exhaustion_fails_the_transaction() {
    let h = harness();
    let mut new = transfer("a", "b", 1.0, Priority::Medium);
    new.max_retries = Some(2);
    let tx = h.core.queue.enqueue(new).unwrap();
    h.ledger.fail_next_submissions(10);

    let mut events = h.core.events().subscribe();
    h.core.queue.sync_pending().await.unwrap();
    let report = h.core.queue.sync_pending().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(h.ledger.submission_count(), 0);
    // failed transactions do not linger in the queue
    assert!(h.core.queue.list_queue().iter().all(|t| t.id != tx.id));

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        if matches!(&event, WalletEvent::TransactionFailed { id, .. } if *id == tx.id) {
            saw_failure = true;
        }
    }
    assert!(saw_failure);
}

#[tokio::test]
async fn permanent_rejection_fails_without_retries() {
    let h = harness();
    h.core.queue.enqueue(transfer("a", "b", 1.0, Priority::Medium)).unwrap();
    h.ledger.reject_submissions(true);

    let report = h.core.queue.sync_pending().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(h.core.queue.list_queue().len(), 0);
}

#[tokio::test]
async fn overdrawing_transactions_are_conflicted_not_submitted() {
    let h = harness();
    h.core.cache.set("balance:alice", &50.0, 300).unwrap();
    h.core.connectivity().set_offline();

    h.core.queue.enqueue(transfer("alice", "bob", 30.0, Priority::Medium)).unwrap();
    h.core.queue.enqueue(transfer("alice", "carol", 30.0, Priority::Medium)).unwrap();

    h.core.connectivity().set_online();
    let report = h.core.queue.sync_pending().await.unwrap();
    assert_eq!(report.executed, 1);
    assert_eq!(h.ledger.submission_count(), 1);

    let conflicted: Vec<_> = h
        .core
        .queue
        .list_queue()
        .into_iter()
        .filter(|tx| tx.status == TxStatus::Conflict)
        .collect();
    assert_eq!(conflicted.len(), 1);
}

// A debit from an account with no cached balance is not an overdraft;
// it drains normally and the ledger decides.
#[tokio::test]
async fn uncached_balances_do_not_conflict_a_drain() {
    let h = harness();
    h.core.queue.enqueue(transfer("alice", "bob", 5.0, Priority::Medium)).unwrap();

    let report = h.core.queue.sync_pending().await.unwrap();
    assert_eq!(report.executed, 1);
    assert_eq!(h.ledger.submission_count(), 1);
    assert!(h
        .core
        .queue
        .list_queue()
        .iter()
        .all(|tx| tx.status != TxStatus::Conflict));
}

#[tokio::test]
async fn concurrent_drains_never_double_submit() {
    let h = harness();
    for i in 0..10 {
        h.core
            .queue
            .enqueue(transfer("a", "b", i as f64 + 1.0, Priority::Medium))
            .unwrap();
    }

    let q1 = h.core.queue.clone();
    let q2 = h.core.queue.clone();
    let (r1, r2) = tokio::join!(q1.sync_pending(), q2.sync_pending());
    r1.unwrap();
    r2.unwrap();

    assert_eq!(h.ledger.submission_count(), 10);
    assert_eq!(h.core.queue.pending_count(), 0);
}

#[tokio::test]
async fn executed_transactions_age_out_of_the_queue() {
    let h = harness();
    h.core.queue.enqueue(transfer("a", "b", 1.0, Priority::Medium)).unwrap();
    h.core.queue.sync_pending().await.unwrap();
    assert_eq!(h.core.queue.list_queue().len(), 1);
    assert_eq!(h.core.queue.list_executed().len(), 1);
    assert!(h.core.queue.list_pending().is_empty());

    h.clock.advance(Duration::from_secs(31));
    h.core.queue.sync_pending().await.unwrap();
    assert_eq!(h.core.queue.list_queue().len(), 0);
    assert!(h.core.queue.list_executed().is_empty());
}

#[tokio::test]
async fn queue_survives_a_restart() -> anyhow::Result<()> {
    let h = harness();
    h.core.connectivity().set_offline();
    h.core.queue.enqueue(transfer("a", "b", 9.0, Priority::High))?;

    // a second core over the same store picks the queue up
    let signer = Arc::new(Ed25519Signer::new(keypair_from_seed(&[7u8; 32])));
    let revived = WalletCore::new(
        CoreConfig::default(),
        h.store.clone(),
        h.ledger.clone(),
        signer,
        h.clock.clone(),
    )?;
    assert_eq!(revived.queue.pending_count(), 1);

    revived.queue.sync_pending().await?;
    assert_eq!(h.ledger.submission_count(), 1);
    Ok(())
}

// Short-TTL cache entry disappears after its TTL.
#[tokio::test]
async fn cache_entry_expires_mid_flow() {
    let h = harness();
    h.core.cache.set("session-token", &"abc", 1).unwrap();
    assert_eq!(h.core.cache.get::<String>("session-token").unwrap(), "abc");

    h.clock.advance(Duration::from_millis(1100));
    assert_eq!(h.core.cache.get::<String>("session-token"), None);
}

// Divergent snapshots: network wins, conflict is reported.
#[tokio::test]
async fn reconciliation_is_network_authoritative() {
    let h = harness();
    let public_key = keypair_from_seed(&[7u8; 32]).public;
    h.core
        .reconciler
        .update_local_state(SnapshotPatch::balance(80.0));
    h.ledger.set_holdings(
        &public_key,
        AccountHoldings {
            balance: 100.0,
            ..Default::default()
        },
    );

    let mut events = h.core.events().subscribe();
    h.core.reconciler.sync_with_network().await.unwrap();

    let mut descriptions = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let WalletEvent::ConflictDetected { description } = event {
            descriptions.push(description);
        }
    }
    assert_eq!(
        descriptions,
        vec!["Balance mismatch: local 80, network 100".to_string()]
    );
    assert_eq!(h.core.reconciler.get_local_state().unwrap().balance, 100.0);
    assert_eq!(h.core.reconciler.is_synced(), Some(true));
}

#[tokio::test]
async fn reconciliation_is_idempotent() {
    let h = harness();
    let public_key = keypair_from_seed(&[7u8; 32]).public;
    h.core
        .reconciler
        .update_local_state(SnapshotPatch::balance(80.0));
    h.ledger.set_holdings(
        &public_key,
        AccountHoldings {
            balance: 100.0,
            ..Default::default()
        },
    );
    h.core.reconciler.sync_with_network().await.unwrap();

    // a second pass finds nothing to resolve
    let mut events = h.core.events().subscribe();
    h.core.reconciler.sync_with_network().await.unwrap();
    while let Ok(event) = events.try_recv() {
        assert!(
            !matches!(event, WalletEvent::ConflictDetected { .. }),
            "unexpected conflict on a synced state"
        );
    }
}

#[tokio::test]
async fn is_synced_is_unknown_without_both_snapshots() {
    let h = harness();
    assert_eq!(h.core.reconciler.is_synced(), None);
    h.core
        .reconciler
        .update_local_state(SnapshotPatch::balance(1.0));
    assert_eq!(h.core.reconciler.is_synced(), None);
}

#[tokio::test]
async fn executed_transfer_advances_local_state() {
    let h = harness();
    h.core
        .reconciler
        .update_local_state(SnapshotPatch::balance(100.0));
    h.core.queue.enqueue(transfer("a", "b", 25.0, Priority::Medium)).unwrap();
    h.core.queue.sync_pending().await.unwrap();

    assert_eq!(h.core.reconciler.get_local_state().unwrap().balance, 75.0);
}

// Full offline cycle: buffer, reconnect, drain via the background
// listener, reconcile.
#[tokio::test(start_paused = true)]
async fn reconnect_listener_drains_automatically() {
    let h = harness();
    h.core.connectivity().set_offline();
    h.core.queue.enqueue(transfer("a", "b", 2.0, Priority::High)).unwrap();

    let handles = h.core.spawn_background_tasks();
    let mut events = h.core.events().subscribe();

    h.core.connectivity().set_online();
    loop {
        match tokio::time::timeout(Duration::from_secs(30), events.recv()).await {
            Ok(Ok(WalletEvent::SyncCompleted { executed, .. })) if executed > 0 => break,
            Ok(Ok(_)) => continue,
            other => panic!("drain did not complete: {other:?}"),
        }
    }
    assert_eq!(h.ledger.submission_count(), 1);

    h.core.shutdown();
    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn session_flow_with_recovery_setup() -> anyhow::Result<()> {
    use drift_types::{ContactId, DeviceId, DeviceMetadata};

    let h = harness();
    let public_key = keypair_from_seed(&[7u8; 32]).public;
    let session = h
        .core
        .sessions
        .create_session(
            public_key,
            DeviceMetadata {
                device_id: DeviceId::new("device-1"),
                user_agent: "drift/1.0".into(),
                platform: "ios".into(),
                trusted_execution: true,
            },
        )
        .await?;
    assert!(h.core.sessions.validate_session(&session.id).await);

    // lose the device, recover the key through contacts
    let contacts: Vec<ContactId> = ["ana", "ben", "cho", "dia"]
        .iter()
        .map(|name| ContactId::new(*name))
        .collect();
    let secret = keypair_from_seed(&[7u8; 32]).private.0.to_vec();
    h.core.recovery.setup_recovery(&secret, &contacts).await?;

    let recovery = h.core.recovery.initiate_recovery("user-1").await?;
    for contact in contacts.iter().take(3) {
        let share = h
            .core
            .recovery
            .get_share_for_contact(contact)
            .await
            .expect("share exists for every configured contact");
        h.core
            .recovery
            .add_share_to_session(&recovery.id, share)
            .await?;
    }
    let recovered = h.core.recovery.recover_key(&recovery.id).await?;
    assert_eq!(recovered, secret);
    Ok(())
}
