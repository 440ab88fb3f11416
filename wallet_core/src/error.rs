//! Wallet core error taxonomy.
//!
//! Validation and lifecycle errors are surfaced synchronously to the
//! caller. Transient ledger failures never appear here directly; they
//! feed the queue's retry policy and end up as transaction status.
//! Conflicts are data, not errors.

use drift_crypto::{EncryptionError, ShamirError, SignError};
use drift_ledger::LedgerError;
use drift_store::StoreError;
use drift_types::ContactId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // -- validation: rejected synchronously, never retried --
    #[error("queue is full (max {max} transactions)")]
    QueueFull { max: usize },

    #[error("cache TTL must be positive, got {0}")]
    InvalidTtl(i64),

    #[error("not enough contacts: need at least {needed}, got {got}")]
    NotEnoughContacts { needed: usize, got: usize },

    #[error("too many contacts: at most {max}, got {got}")]
    TooManyContacts { max: usize, got: usize },

    #[error("contact {0} already submitted a share to this session")]
    DuplicateShare(ContactId),

    #[error("invalid threshold configuration: threshold {threshold}, max shares {max_shares}")]
    ThresholdViolation { threshold: usize, max_shares: usize },

    // -- lifecycle: caller must re-initiate the corresponding flow --
    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("session {0} has expired")]
    SessionExpired(String),

    #[error("recovery session {0} not found")]
    RecoverySessionNotFound(String),

    #[error("recovery session {0} has expired")]
    RecoverySessionExpired(String),

    #[error("an active recovery session already exists for user {0}")]
    RecoverySessionAlreadyExists(String),

    #[error("recovery session {0} has not collected enough shares")]
    RecoverySessionNotCompleted(String),

    #[error("recovery has not been set up")]
    RecoveryNotConfigured,

    #[error("{0} wallet snapshot is not available")]
    SnapshotMissing(&'static str),

    // -- propagated collaborator failures --
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("signing error: {0}")]
    Signing(#[from] SignError),

    #[error("secret sharing error: {0}")]
    Shamir(#[from] ShamirError),

    #[error("share encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("configuration error: {0}")]
    Config(String),
}
