//! Core configuration with TOML file support.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for the wallet core.
///
/// Can be loaded from a TOML file via [`CoreConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoreConfig {
    // -- transaction queue --
    /// Maximum number of transactions the queue will hold.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Default retry budget for transactions that don't specify one.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,

    /// How long executed transactions stay visible before removal.
    #[serde(default = "default_executed_retention_secs")]
    pub executed_retention_secs: u64,

    /// Periodic drain interval while online.
    #[serde(default = "default_drain_interval_secs")]
    pub drain_interval_secs: u64,

    // -- cache --
    /// Periodic expired-entry sweep interval.
    #[serde(default = "default_cache_sweep_interval_secs")]
    pub cache_sweep_interval_secs: u64,

    /// TTL used for balance/stake cache entries written by the queue.
    #[serde(default = "default_balance_cache_ttl_secs")]
    pub balance_cache_ttl_secs: i64,

    // -- sessions --
    /// Full sliding-expiry extension granted by an online refresh.
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    /// Short extension granted while offline.
    #[serde(default = "default_offline_refresh_extension_secs")]
    pub offline_refresh_extension_secs: u64,

    /// Sessions younger than this always require MFA.
    #[serde(default = "default_mfa_freshness_window_secs")]
    pub mfa_freshness_window_secs: u64,

    /// Two operations closer together than this flag the session.
    #[serde(default = "default_suspicious_interval_ms")]
    pub suspicious_interval_ms: u64,

    /// How recently a device's last session must have expired for the
    /// device to still count as known.
    #[serde(default = "default_device_recency_window_secs")]
    pub device_recency_window_secs: u64,

    /// Expired-session cleanup sweep interval.
    #[serde(default = "default_session_cleanup_interval_secs")]
    pub session_cleanup_interval_secs: u64,

    // -- recovery --
    /// Shares required to reconstruct the secret.
    #[serde(default = "default_recovery_threshold")]
    pub recovery_threshold: usize,

    /// Upper bound on the number of contacts/shares.
    #[serde(default = "default_recovery_max_shares")]
    pub recovery_max_shares: usize,

    /// Recovery session grace period.
    #[serde(default = "default_recovery_grace_period_secs")]
    pub recovery_grace_period_secs: u64,

    /// Whether shares are sealed under per-contact derived keys.
    #[serde(default = "default_true")]
    pub encrypt_shares: bool,

    // -- reconciliation --
    /// Numeric tolerance for `is_synced` comparisons.
    #[serde(default = "default_sync_epsilon")]
    pub sync_epsilon: f64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        // serde defaults are the single source of truth
        toml::from_str("").expect("empty config must deserialize")
    }
}

impl CoreConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CoreError::Config(format!("failed to read config file: {e}")))?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| CoreError::Config(format!("failed to parse config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check global invariants (`threshold >= 2`, `threshold <= max_shares`).
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.recovery_threshold < 2 || self.recovery_threshold > self.recovery_max_shares {
            return Err(CoreError::ThresholdViolation {
                threshold: self.recovery_threshold,
                max_shares: self.recovery_max_shares,
            });
        }
        if self.max_queue_size == 0 {
            return Err(CoreError::Config("max_queue_size must be positive".into()));
        }
        Ok(())
    }

    pub fn executed_retention(&self) -> Duration {
        Duration::from_secs(self.executed_retention_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn offline_refresh_extension(&self) -> Duration {
        Duration::from_secs(self.offline_refresh_extension_secs)
    }

    pub fn mfa_freshness_window(&self) -> Duration {
        Duration::from_secs(self.mfa_freshness_window_secs)
    }

    pub fn suspicious_interval(&self) -> Duration {
        Duration::from_millis(self.suspicious_interval_ms)
    }

    pub fn device_recency_window(&self) -> Duration {
        Duration::from_secs(self.device_recency_window_secs)
    }

    pub fn recovery_grace_period(&self) -> Duration {
        Duration::from_secs(self.recovery_grace_period_secs)
    }
}

fn default_max_queue_size() -> usize {
    100
}
fn default_max_retries() -> u32 {
    3
}
fn default_executed_retention_secs() -> u64 {
    30
}
fn default_drain_interval_secs() -> u64 {
    5
}
fn default_cache_sweep_interval_secs() -> u64 {
    60
}
fn default_balance_cache_ttl_secs() -> i64 {
    300
}
fn default_session_timeout_secs() -> u64 {
    30 * 60
}
fn default_offline_refresh_extension_secs() -> u64 {
    5 * 60
}
fn default_mfa_freshness_window_secs() -> u64 {
    24 * 60 * 60
}
fn default_suspicious_interval_ms() -> u64 {
    1000
}
fn default_device_recency_window_secs() -> u64 {
    7 * 24 * 60 * 60
}
fn default_session_cleanup_interval_secs() -> u64 {
    60
}
fn default_recovery_threshold() -> usize {
    3
}
fn default_recovery_max_shares() -> usize {
    10
}
fn default_recovery_grace_period_secs() -> u64 {
    24 * 60 * 60
}
fn default_sync_epsilon() -> f64 {
    1e-3
}
fn default_true() -> bool {
    true
}
