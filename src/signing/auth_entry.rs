//! Standalone authorization entry signing

use super::{expiration_ledger, sign_entry};
use crate::transaction::AuthorizationEntry;
use crate::wallet::{ActiveWallet, WalletSession};
use crate::{Error, Result};
use std::sync::Arc;

pub struct AuthEntrySigner {
    wallet: Arc<dyn WalletSession>,
    active: ActiveWallet,
    expiration_ledgers: u32,
}

impl AuthEntrySigner {
    pub fn new(
        wallet: Arc<dyn WalletSession>,
        active: ActiveWallet,
        expiration_ledgers: u32,
    ) -> Self {
        Self {
            wallet,
            active,
            expiration_ledgers,
        }
    }

    /// Sign one base64 entry; returns the signed entry in the same encoding
    pub async fn sign(&self, entry_b64: &str) -> Result<String> {
        let entry = AuthorizationEntry::from_base64(entry_b64)?;

        let signer = self
            .active
            .current()
            .await
            .ok_or_else(|| Error::Signing("No wallet connected".to_string()))?;
        if !entry.is_bound_to(signer) {
            return Err(Error::Signing(format!(
                "Authorization entry is not bound to the connected wallet {}",
                signer
            )));
        }

        let expiration = expiration_ledger(self.wallet.as_ref(), self.expiration_ledgers).await?;
        let signed = sign_entry(self.wallet.as_ref(), &entry, signer, expiration).await?;
        tracing::info!(%signer, expiration, "Signed authorization entry");

        signed.to_base64()
    }
}
