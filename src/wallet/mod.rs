//! Wallet session management
//!
//! The popup never holds credential material itself. It talks to a
//! [`WalletSession`] and keeps one [`ActiveWallet`] cell that every signing
//! path reads at the moment it signs.

mod local;
mod signer;

pub use local::LocalWalletSession;
pub use signer::LocalSigner;

use crate::transaction::{AuthorizationEntry, TransactionEnvelope};
use crate::Result;
use alloy::primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Smart-wallet session provider
#[async_trait]
pub trait WalletSession: Send + Sync {
    /// Reconnect from persisted state without user interaction
    async fn restore(&self) -> Result<Option<Address>>;

    /// Connect to an existing wallet (may prompt for a credential)
    async fn connect(&self) -> Result<Address>;

    /// Register a new credential and deploy a wallet for it
    async fn create(&self, name: &str) -> Result<Address>;

    async fn is_connected(&self) -> bool;

    /// Most recent closed ledger, used to compute expirations
    async fn latest_ledger(&self) -> Result<u32>;

    /// Sign one address-bound entry so it stays valid until `expiration_ledger`
    async fn sign_auth_entry(
        &self,
        entry: &AuthorizationEntry,
        expiration_ledger: u32,
    ) -> Result<AuthorizationEntry>;

    /// Submit a fully authorized envelope; returns the transaction id
    async fn submit(&self, envelope: &TransactionEnvelope) -> Result<String>;
}

/// The one place that says which wallet is connected right now
#[derive(Debug, Clone, Default)]
pub struct ActiveWallet {
    inner: Arc<RwLock<Option<Address>>>,
}

impl ActiveWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<Address> {
        *self.inner.read().await
    }

    pub async fn set(&self, address: Address) {
        let mut inner = self.inner.write().await;
        if inner.is_some_and(|prev| prev != address) {
            tracing::info!(previous = ?*inner, %address, "Active wallet changed");
        }
        *inner = Some(address);
    }

    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[tokio::test]
    async fn clones_share_the_same_cell() {
        let active = ActiveWallet::new();
        let reader = active.clone();
        assert!(reader.current().await.is_none());

        let first = address!("00000000000000000000000000000000000000aa");
        let second = address!("00000000000000000000000000000000000000bb");
        active.set(first).await;
        assert_eq!(reader.current().await, Some(first));

        active.set(second).await;
        assert_eq!(reader.current().await, Some(second));

        active.clear().await;
        assert!(reader.current().await.is_none());
    }
}
