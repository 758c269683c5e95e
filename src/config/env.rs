//! Environment overrides
//!
//! Values set in the environment (or a `.env` file loaded by the binary)
//! win over the config file:
//!
//! ```bash
//! export MEDIATOR_STATUS_URL="https://status.example.com"
//! export MEDIATOR_NETWORK_PASSPHRASE="Public Global Stellar Network ; September 2015"
//! export MEDIATOR_WALLET_STATE="$HOME/.mediator/wallet.json"
//! export MEDIATOR_AUDIT_LOG="$HOME/.mediator/audit.jsonl"
//! export MEDIATOR_OPENER="opener-window"
//! ```

use super::Config;

/// Environment variable names
mod env_vars {
    pub const STATUS_URL: &str = "MEDIATOR_STATUS_URL";
    pub const NETWORK_PASSPHRASE: &str = "MEDIATOR_NETWORK_PASSPHRASE";
    pub const WALLET_STATE: &str = "MEDIATOR_WALLET_STATE";
    pub const AUDIT_LOG: &str = "MEDIATOR_AUDIT_LOG";
    pub const OPENER: &str = "MEDIATOR_OPENER";
}

/// Overrides collected from the environment
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub status_url: Option<String>,
    pub network_passphrase: Option<String>,
    pub wallet_state_file: Option<String>,
    pub audit_log_path: Option<String>,
    pub opener: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let overrides = Self {
            status_url: read(env_vars::STATUS_URL),
            network_passphrase: read(env_vars::NETWORK_PASSPHRASE),
            wallet_state_file: read(env_vars::WALLET_STATE),
            audit_log_path: read(env_vars::AUDIT_LOG),
            opener: read(env_vars::OPENER),
        };

        if overrides.status_url.is_some() {
            tracing::debug!("Using {} for selection status", env_vars::STATUS_URL);
        }
        overrides
    }

    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.status_url {
            config.status_url = Some(url.clone());
        }
        if let Some(passphrase) = &self.network_passphrase {
            config.signing.network_passphrase = passphrase.clone();
        }
        if let Some(path) = &self.wallet_state_file {
            config.wallet_state_file = path.clone();
        }
        if let Some(path) = &self.audit_log_path {
            config.audit_log_path = Some(path.clone());
        }
        if let Some(opener) = &self.opener {
            config.window.opener = Some(opener.clone());
        }
    }
}
