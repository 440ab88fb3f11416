//! Ledger error type with the transient/permanent distinction the
//! queue's retry policy depends on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("node error: {0}")]
    Node(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("transaction rejected: {0}")]
    Rejected(String),
}

impl LedgerError {
    /// Whether retrying the same call later could succeed.
    ///
    /// Transport failures, timeouts, and node-side errors are retried up
    /// to the transaction's budget; a rejection or a malformed response
    /// will not get better on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::Transport(_) | LedgerError::Timeout | LedgerError::Node(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(LedgerError::Timeout.is_transient());
        assert!(LedgerError::Transport("reset".into()).is_transient());
        assert!(LedgerError::Node("busy".into()).is_transient());
        assert!(!LedgerError::Rejected("bad signature".into()).is_transient());
        assert!(!LedgerError::InvalidResponse("not json".into()).is_transient());
    }
}
