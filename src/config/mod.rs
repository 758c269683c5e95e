//! Configuration for the popup mediator

pub mod env;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub use env::EnvOverrides;

/// Ledgers per day at a 5 second close time
pub const LEDGERS_PER_DAY: u32 = 17_280;

/// Default network passphrase used to domain-separate signature payloads
pub const DEFAULT_NETWORK_PASSPHRASE: &str = "Test SDF Network ; September 2015";

/// What to do when a selection was submitted but never observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnconfirmedSelectionPolicy {
    /// Continue the flow once the confirmation window closes (logs a warning)
    #[default]
    Proceed,
    /// Stay on the selection screen and report the missing confirmation
    RequireConfirmation,
}

/// Onboarding gate timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Bound on a single selection status fetch
    pub status_timeout_ms: u64,
    /// Delay between confirmation polls after a selection
    pub poll_interval_ms: u64,
    /// Total time spent polling for confirmation
    pub confirm_window_ms: u64,
    #[serde(default)]
    pub unconfirmed_policy: UnconfirmedSelectionPolicy,
}

impl GateConfig {
    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirm_window(&self) -> Duration {
        Duration::from_millis(self.confirm_window_ms)
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            status_timeout_ms: 30_000,
            poll_interval_ms: 750,
            confirm_window_ms: 15_000,
            unconfirmed_policy: UnconfirmedSelectionPolicy::Proceed,
        }
    }
}

/// Authorization signing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// How far past the latest ledger a signed entry stays valid
    pub auth_expiration_ledgers: u32,
    pub network_passphrase: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            auth_expiration_ledgers: LEDGERS_PER_DAY,
            network_passphrase: DEFAULT_NETWORK_PASSPHRASE.to_string(),
        }
    }
}

/// Popup window lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Delay between the final response and closing the popup
    pub close_delay_ms: u64,
    /// Identity of the window that opened the popup
    pub opener: Option<String>,
}

impl WindowConfig {
    pub fn close_delay(&self) -> Duration {
        Duration::from_millis(self.close_delay_ms)
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            close_delay_ms: 500,
            opener: None,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub window: WindowConfig,
    /// Base URL of the selection status service
    pub status_url: Option<String>,
    /// Local wallet state (sessions and pending credentials)
    pub wallet_state_file: String,
    /// Path to audit log file
    pub audit_log_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gate: GateConfig::default(),
            signing: SigningConfig::default(),
            window: WindowConfig::default(),
            status_url: None,
            wallet_state_file: "wallet-state.json".to_string(),
            audit_log_path: Some("audit.jsonl".to_string()),
        }
    }
}

impl Config {
    /// Load a JSON config file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Apply environment overrides on top of file/default values
    pub fn with_env(mut self, overrides: &EnvOverrides) -> Self {
        overrides.apply(&mut self);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_defaults_match_documented_bounds() {
        let gate = GateConfig::default();
        assert_eq!(gate.status_timeout(), Duration::from_secs(30));
        assert_eq!(gate.poll_interval(), Duration::from_millis(750));
        assert_eq!(gate.confirm_window(), Duration::from_secs(15));
        assert_eq!(gate.unconfirmed_policy, UnconfirmedSelectionPolicy::Proceed);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let value = serde_json::json!({
            "gate": {
                "status_timeout_ms": 1000,
                "poll_interval_ms": 10,
                "confirm_window_ms": 100,
                "unconfirmed_policy": "require_confirmation"
            },
            "status_url": "https://status.example",
            "wallet_state_file": "state.json",
            "audit_log_path": null
        });
        let parsed: Config = serde_json::from_value(value).expect("parse config");
        assert_eq!(
            parsed.gate.unconfirmed_policy,
            UnconfirmedSelectionPolicy::RequireConfirmation
        );
        assert_eq!(parsed.signing.auth_expiration_ledgers, LEDGERS_PER_DAY);
        assert_eq!(parsed.window.close_delay_ms, 500);
        assert!(parsed.window.opener.is_none());
        assert!(parsed.audit_log_path.is_none());
    }

    #[test]
    fn policy_defaults_to_proceed_when_omitted() {
        let value = serde_json::json!({
            "status_timeout_ms": 30000,
            "poll_interval_ms": 750,
            "confirm_window_ms": 15000
        });
        let parsed: GateConfig = serde_json::from_value(value).expect("parse gate");
        assert_eq!(parsed.unconfirmed_policy, UnconfirmedSelectionPolicy::Proceed);
    }
}
