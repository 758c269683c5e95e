//! Pending-credential recovery
//!
//! A registration that created a credential but never finished deploying a
//! wallet for it leaves an orphan behind. Orphans are listed oldest-first
//! and can be deployed or deleted. Deletion always needs an explicit
//! confirmation and is never triggered by a failed deploy.

use crate::wallet::ActiveWallet;
use crate::{Error, Result};
use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A credential with no confirmed wallet deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCredential {
    pub credential_id: String,
    pub created_at: DateTime<Utc>,
}

/// Storage of registration artifacts
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Credentials that were never attached to a deployed wallet
    async fn pending(&self) -> Result<Vec<PendingCredential>>;

    /// Deploy a wallet controlled by this credential and consume it
    async fn deploy(&self, credential_id: &str) -> Result<Address>;

    /// Permanently discard a pending credential
    async fn delete(&self, credential_id: &str) -> Result<()>;
}

/// User-facing recovery operations
#[derive(Clone)]
pub struct PendingCredentialRecovery {
    store: Arc<dyn CredentialStore>,
    active: ActiveWallet,
}

impl PendingCredentialRecovery {
    pub fn new(store: Arc<dyn CredentialStore>, active: ActiveWallet) -> Self {
        Self { store, active }
    }

    /// Pending credentials, oldest first
    pub async fn list(&self) -> Result<Vec<PendingCredential>> {
        let mut pending = self
            .store
            .pending()
            .await
            .map_err(|e| Error::Recovery(format!("Failed to list pending credentials: {}", e)))?;
        pending.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.credential_id.cmp(&b.credential_id))
        });
        Ok(pending)
    }

    /// Deploy a wallet for `credential_id` and make it the active wallet.
    ///
    /// On failure the candidate stays in the list untouched.
    pub async fn deploy(&self, credential_id: &str) -> Result<Address> {
        match self.store.deploy(credential_id).await {
            Ok(address) => {
                self.active.set(address).await;
                tracing::info!(credential_id, %address, "Deployed wallet for pending credential");
                Ok(address)
            }
            Err(e) => {
                tracing::warn!(
                    credential_id,
                    error = %e,
                    "Deploy of pending credential failed; keeping it for retry"
                );
                Err(Error::Recovery(format!("Deploy failed: {}", e)))
            }
        }
    }

    /// Discard `credential_id`. Refused unless the user confirmed.
    pub async fn delete(&self, credential_id: &str, confirmed: bool) -> Result<()> {
        if !confirmed {
            return Err(Error::Recovery(
                "Deleting a pending credential requires confirmation".to_string(),
            ));
        }
        self.store
            .delete(credential_id)
            .await
            .map_err(|e| Error::Recovery(format!("Delete failed: {}", e)))?;
        tracing::info!(credential_id, "Deleted pending credential");
        Ok(())
    }
}
