//! Authorization signing
//!
//! SECURITY NOTE:
//! - Only entries bound to the active wallet are ever handed to the wallet
//! - The active wallet is read when signing starts, not when the request arrived
//! - Entries belonging to other parties are passed through untouched

mod auth_entry;
mod cosigner;

pub use auth_entry::AuthEntrySigner;
pub use cosigner::{CoSignOutcome, TransactionCoSigner};

use crate::transaction::AuthorizationEntry;
use crate::wallet::WalletSession;
use crate::{Error, Result};
use alloy::primitives::Address;

/// Ledger at which a signature made now should expire
async fn expiration_ledger(wallet: &dyn WalletSession, window: u32) -> Result<u32> {
    let latest = wallet
        .latest_ledger()
        .await
        .map_err(|e| Error::Signing(format!("Could not read latest ledger: {}", e)))?;
    Ok(latest.saturating_add(window))
}

/// Ask the wallet to sign `entry` as `signer` and check what comes back
async fn sign_entry(
    wallet: &dyn WalletSession,
    entry: &AuthorizationEntry,
    signer: Address,
    expiration: u32,
) -> Result<AuthorizationEntry> {
    let signed = wallet
        .sign_auth_entry(entry, expiration)
        .await
        .map_err(|e| match e {
            Error::Signing(_) => e,
            other => Error::Signing(other.to_string()),
        })?;

    let same_invocation = signed.root_invocation.get() == entry.root_invocation.get();
    if signed.signer() != Some(signer) || !same_invocation {
        return Err(Error::Signing(
            "Wallet returned an entry that does not match the request".to_string(),
        ));
    }
    Ok(signed)
}
