//! Nullable ledger: record submissions without a network.

use async_trait::async_trait;
use drift_ledger::{AccountHoldings, LedgerClient, LedgerError, SignedSubmission, SubmitReceipt};
use drift_types::PublicKey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

/// A test ledger that records submissions instead of sending them.
///
/// Failures can be injected: a count of upcoming transient failures, or
/// a permanent-rejection switch. Holdings are scripted per account.
pub struct NullLedger {
    submissions: Mutex<Vec<SignedSubmission>>,
    holdings: Mutex<HashMap<String, AccountHoldings>>,
    transient_failures: AtomicU32,
    reject_all: AtomicBool,
    sequence: AtomicU64,
}

impl NullLedger {
    pub fn new() -> Self {
        Self {
            submissions: Mutex::new(Vec::new()),
            holdings: Mutex::new(HashMap::new()),
            transient_failures: AtomicU32::new(0),
            reject_all: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
        }
    }

    /// Script the holdings reported for an account.
    pub fn set_holdings(&self, public_key: &PublicKey, holdings: AccountHoldings) {
        self.holdings
            .lock()
            .unwrap()
            .insert(public_key.to_hex(), holdings);
    }

    /// Fail the next `count` submissions with a transient transport error.
    pub fn fail_next_submissions(&self, count: u32) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Reject every submission permanently (non-retryable).
    pub fn reject_submissions(&self, reject: bool) {
        self.reject_all.store(reject, Ordering::SeqCst);
    }

    /// All recorded submissions (for assertions).
    pub fn submissions(&self) -> Vec<SignedSubmission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    /// Clear all recorded state.
    pub fn reset(&self) {
        self.submissions.lock().unwrap().clear();
        self.holdings.lock().unwrap().clear();
        self.transient_failures.store(0, Ordering::SeqCst);
        self.reject_all.store(false, Ordering::SeqCst);
    }
}

impl Default for NullLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for NullLedger {
    async fn submit(&self, submission: &SignedSubmission) -> Result<SubmitReceipt, LedgerError> {
        if self.reject_all.load(Ordering::SeqCst) {
            return Err(LedgerError::Rejected("scripted rejection".into()));
        }

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(LedgerError::Transport("injected failure".into()));
        }

        self.submissions.lock().unwrap().push(submission.clone());
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        Ok(SubmitReceipt {
            tx_hash: format!("null-tx-{seq}"),
            block_height: Some(seq),
        })
    }

    async fn fetch_holdings(&self, public_key: &PublicKey) -> Result<AccountHoldings, LedgerError> {
        Ok(self
            .holdings
            .lock()
            .unwrap()
            .get(&public_key.to_hex())
            .cloned()
            .unwrap_or_default())
    }
}
