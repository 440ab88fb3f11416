//! HTTP JSON-RPC ledger client.
//!
//! Wraps `reqwest::Client` with the node's base URL and the action
//! envelope the node expects: `{"action": "...", ...params}` in,
//! `{"result": ...}` or `{"error": "..."}` out.

use crate::{AccountHoldings, LedgerClient, LedgerError, SignedSubmission, SubmitReceipt};
use async_trait::async_trait;
use drift_types::PublicKey;
use std::time::Duration;

#[derive(Clone)]
pub struct RpcLedgerClient {
    http: reqwest::Client,
    node_url: String,
}

impl RpcLedgerClient {
    /// Create a client targeting the given base URL (e.g. `http://127.0.0.1:8899`).
    pub fn new(node_url: impl Into<String>) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LedgerError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            node_url: node_url.into(),
        })
    }

    pub fn node_url(&self) -> &str {
        &self.node_url
    }

    /// Send a JSON-RPC request and return the `result` field.
    async fn rpc_call(
        &self,
        action: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, LedgerError> {
        let mut body = params;
        body.as_object_mut()
            .ok_or_else(|| LedgerError::InvalidResponse("params must be a JSON object".into()))?
            .insert("action".to_string(), serde_json::json!(action));

        let response = self
            .http
            .post(&self.node_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LedgerError::Timeout
                } else {
                    LedgerError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(LedgerError::Node(format!(
                "node returned HTTP {}",
                response.status()
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;

        if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
            return Err(LedgerError::Node(err.to_string()));
        }

        Ok(json.get("result").cloned().unwrap_or(json))
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn submit(&self, submission: &SignedSubmission) -> Result<SubmitReceipt, LedgerError> {
        let result = self
            .rpc_call(
                "submit",
                serde_json::json!({
                    "account": submission.public_key.to_hex(),
                    "payload": hex::encode(&submission.payload),
                    "signature": submission.signature.to_hex(),
                }),
            )
            .await?;

        let receipt: SubmitReceipt = serde_json::from_value(result)
            .map_err(|e| LedgerError::InvalidResponse(format!("invalid submit response: {e}")))?;

        if receipt.tx_hash.is_empty() {
            return Err(LedgerError::Rejected("node returned no tx hash".into()));
        }
        Ok(receipt)
    }

    async fn fetch_holdings(&self, public_key: &PublicKey) -> Result<AccountHoldings, LedgerError> {
        let result = self
            .rpc_call(
                "account_holdings",
                serde_json::json!({ "account": public_key.to_hex() }),
            )
            .await?;

        serde_json::from_value(result)
            .map_err(|e| LedgerError::InvalidResponse(format!("invalid holdings response: {e}")))
    }
}
