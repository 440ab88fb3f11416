//! Ledger client abstraction.
//!
//! The wallet core never talks blockchain protocol; it submits signed
//! payloads and reads back account holdings through [`LedgerClient`].
//! The HTTP JSON-RPC implementation lives in [`rpc`]; tests use the
//! recording client from `drift-nullables`.

pub mod error;
pub mod rpc;

pub use error::LedgerError;
pub use rpc::RpcLedgerClient;

use async_trait::async_trait;
use drift_types::{Mint, NftId, PublicKey, Signature};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A signed transaction ready for submission.
#[derive(Clone, Debug)]
pub struct SignedSubmission {
    pub public_key: PublicKey,
    /// Serialized transaction payload (opaque to the ledger seam).
    pub payload: Vec<u8>,
    pub signature: Signature,
}

/// Result of a successful submission.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SubmitReceipt {
    pub tx_hash: String,
    #[serde(default)]
    pub block_height: Option<u64>,
}

/// Account holdings as reported by the ledger.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AccountHoldings {
    pub balance: f64,
    #[serde(default)]
    pub token_balances: BTreeMap<Mint, f64>,
    #[serde(default)]
    pub nfts: BTreeSet<NftId>,
    #[serde(default)]
    pub staked_amount: f64,
    #[serde(default)]
    pub block_height: Option<u64>,
}

/// Client capable of submitting signed transactions and reporting
/// balance/holdings for a public key.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn submit(&self, submission: &SignedSubmission) -> Result<SubmitReceipt, LedgerError>;
    async fn fetch_holdings(&self, public_key: &PublicKey) -> Result<AccountHoldings, LedgerError>;
}
