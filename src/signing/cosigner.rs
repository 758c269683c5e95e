//! Transaction co-signer
//!
//! Walks every contract invocation in an envelope and signs the entries
//! bound to the active wallet. Source-account entries and entries bound to
//! other addresses are left exactly as they arrived, as is every field
//! outside the authorization lists.

use super::{expiration_ledger, sign_entry};
use crate::transaction::RawEnvelope;
use crate::wallet::{ActiveWallet, WalletSession};
use crate::{Error, Result};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoSignOutcome {
    /// Base64 envelope carrying the new signatures
    pub signed_envelope: String,
    /// Number of entries signed by this wallet
    pub signed_entries: usize,
    pub submitted_id: Option<String>,
}

pub struct TransactionCoSigner {
    wallet: Arc<dyn WalletSession>,
    active: ActiveWallet,
    expiration_ledgers: u32,
}

impl TransactionCoSigner {
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

    /// Co-sign `envelope_b64` and optionally submit it.
    ///
    /// Only the text of entries bound to the active wallet changes. A failed
    /// submission returns [`Error::Submission`], which still carries the
    /// signed envelope.
    pub async fn cosign(&self, envelope_b64: &str, submit: bool) -> Result<CoSignOutcome> {
        let raw = RawEnvelope::from_base64(envelope_b64)?;
        // refuse anything that is not a well-formed envelope
        raw.decode()?;

        let signer = self
            .active
            .current()
            .await
            .ok_or_else(|| Error::Signing("No wallet connected".to_string()))?;
        let expiration = expiration_ledger(self.wallet.as_ref(), self.expiration_ledgers).await?;

        let mut edits = Vec::new();
        for slot in raw.auth_slots()? {
            if !slot.entry.is_bound_to(signer) {
                continue;
            }
            let signed = sign_entry(self.wallet.as_ref(), &slot.entry, signer, expiration).await?;
            edits.push((slot.span, serde_json::to_string(&signed)?));
        }
        let signed_entries = edits.len();

        if signed_entries == 0 {
            tracing::warn!(%signer, "Envelope has no entries bound to the active wallet");
        } else {
            tracing::info!(%signer, signed_entries, expiration, "Co-signed transaction");
        }

        let signed = raw.splice(edits)?;
        let signed_envelope = signed.to_base64();

        let submitted_id = if submit {
            let envelope = signed.decode()?;
            match self.wallet.submit(&envelope).await {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::error!(error = %e, "Submission failed after signing");
                    return Err(Error::Submission {
                        signed_envelope,
                        reason: e.to_string(),
                    });
                }
            }
        } else {
            None
        };

        Ok(CoSignOutcome {
            signed_envelope,
            signed_entries,
            submitted_id,
        })
    }
}
