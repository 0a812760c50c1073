//! Session configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use stakeflow_types::Contracts;

use crate::CoreError;

/// Configuration for a [`crate::StakingSession`].
///
/// Can be loaded from a TOML file via [`SessionConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Token and staking contract addresses.
    pub contracts: Contracts,

    /// Poll interval for wallet balance, stake position, allowance and faucet state.
    #[serde(default = "default_balance_poll_interval_ms")]
    pub balance_poll_interval_ms: u64,

    /// Poll interval for pending rewards (live display).
    #[serde(default = "default_rewards_poll_interval_ms")]
    pub rewards_poll_interval_ms: u64,

    /// Advertised annual rate in basis points, used only for advisory projections.
    #[serde(default = "default_annual_rate_bps")]
    pub annual_rate_bps: u32,

    /// How many settled transaction handles are remembered for de-duplication.
    #[serde(default = "default_processed_tx_capacity")]
    pub processed_tx_capacity: usize,

    /// Buffer size of the flow-transition and outcome broadcast channels.
    #[serde(default = "default_flow_event_capacity")]
    pub flow_event_capacity: usize,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_balance_poll_interval_ms() -> u64 {
    5_000
}

fn default_rewards_poll_interval_ms() -> u64 {
    1_000
}

fn default_annual_rate_bps() -> u32 {
    1_000
}

fn default_processed_tx_capacity() -> usize {
    1_024
}

fn default_flow_event_capacity() -> usize {
    64
}

// ── Impl ───────────────────────────────────────────────────────────────

impl SessionConfig {
    /// A configuration with default intervals for the given contracts.
    pub fn new(contracts: Contracts) -> Self {
        Self {
            contracts,
            balance_poll_interval_ms: default_balance_poll_interval_ms(),
            rewards_poll_interval_ms: default_rewards_poll_interval_ms(),
            annual_rate_bps: default_annual_rate_bps(),
            processed_tx_capacity: default_processed_tx_capacity(),
            flow_event_capacity: default_flow_event_capacity(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, CoreError> {
        let config: Self = toml::from_str(s).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would stall polling or drop every event.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.balance_poll_interval_ms == 0 || self.rewards_poll_interval_ms == 0 {
            return Err(CoreError::Config("poll intervals must be non-zero".into()));
        }
        if self.processed_tx_capacity == 0 || self.flow_event_capacity == 0 {
            return Err(CoreError::Config("capacities must be non-zero".into()));
        }
        Ok(())
    }

    pub fn balance_poll_interval(&self) -> Duration {
        Duration::from_millis(self.balance_poll_interval_ms)
    }

    pub fn rewards_poll_interval(&self) -> Duration {
        Duration::from_millis(self.rewards_poll_interval_ms)
    }
}
