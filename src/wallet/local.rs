//! File-backed wallet session
//!
//! Credentials are local keys persisted in a JSON state file. Creating a
//! wallet is two steps, exactly like a real passkey registration: the
//! credential is recorded first, then the wallet is deployed. A crash or
//! error between the two leaves a pending credential for recovery.

use super::{LocalSigner, WalletSession};
use crate::recovery::{CredentialStore, PendingCredential};
use crate::transaction::{AuthorizationEntry, Credentials, TransactionEnvelope};
use crate::{Error, Result};
use alloy::primitives::{hex, Address};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Seconds between ledger closes on the local clock
const LEDGER_CLOSE_SECS: i64 = 5;

fn expose_key<S>(key: &SecretString, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(key.expose_secret())
}

fn secret_key<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

#[derive(Serialize, Deserialize)]
struct StoredCredential {
    credential_id: String,
    #[serde(serialize_with = "expose_key", deserialize_with = "secret_key")]
    key: SecretString,
    created_at: DateTime<Utc>,
    #[serde(default)]
    label: Option<String>,
    /// Set once a wallet has been deployed for this credential
    #[serde(default)]
    wallet: Option<Address>,
}

#[derive(Default, Serialize, Deserialize)]
struct LocalState {
    /// Credential id of the last connected wallet
    #[serde(default)]
    active: Option<String>,
    #[serde(default)]
    credentials: Vec<StoredCredential>,
}

impl LocalState {
    fn find(&self, credential_id: &str) -> Option<&StoredCredential> {
        self.credentials
            .iter()
            .find(|c| c.credential_id == credential_id)
    }

    fn index_of(&self, credential_id: &str) -> Result<usize> {
        self.credentials
            .iter()
            .position(|c| c.credential_id == credential_id)
            .ok_or_else(|| Error::Recovery(format!("Unknown credential {}", credential_id)))
    }
}

pub struct LocalWalletSession {
    path: Option<PathBuf>,
    network_passphrase: String,
    state: Mutex<LocalState>,
    connected: Mutex<Option<LocalSigner>>,
    submitted: Mutex<Vec<String>>,
}

impl LocalWalletSession {
    /// Session whose state lives only in memory
    pub fn in_memory(network_passphrase: impl Into<String>) -> Self {
        Self {
            path: None,
            network_passphrase: network_passphrase.into(),
            state: Mutex::new(LocalState::default()),
            connected: Mutex::new(None),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Load state from a file, or start empty if it doesn't exist
    pub async fn open(
        path: impl AsRef<Path>,
        network_passphrase: impl Into<String>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str(&content).map_err(|e| {
                Error::Wallet(format!("Corrupt wallet state {}: {}", path.display(), e))
            })?
        } else {
            LocalState::default()
        };

        Ok(Self {
            path: Some(path),
            network_passphrase: network_passphrase.into(),
            state: Mutex::new(state),
            connected: Mutex::new(None),
            submitted: Mutex::new(Vec::new()),
        })
    }

    /// Record a new credential without deploying a wallet for it
    pub async fn register_credential(&self, label: Option<&str>) -> Result<String> {
        let signer = LocalSigner::generate();
        let credential_id = uuid::Uuid::new_v4().to_string();

        let mut state = self.state.lock().await;
        state.credentials.push(StoredCredential {
            credential_id: credential_id.clone(),
            key: signer.to_secret(),
            created_at: Utc::now(),
            label: label.map(str::to_string),
            wallet: None,
        });
        if let Err(e) = self.persist(&state).await {
            state.credentials.pop();
            return Err(e);
        }

        tracing::info!(credential_id = %credential_id, "Registered credential");
        Ok(credential_id)
    }

    /// Transaction ids accepted by `submit`
    pub async fn submitted(&self) -> Vec<String> {
        self.submitted.lock().await.clone()
    }

    /// Write `state` to disk. Callers undo their in-memory change when this fails,
    /// so memory never holds anything the file does not.
    async fn persist(&self, state: &LocalState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(state)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    async fn activate(&self, signer: LocalSigner) -> Address {
        let address = signer.address();
        *self.connected.lock().await = Some(signer);
        address
    }
}

#[async_trait]
impl WalletSession for LocalWalletSession {
    async fn restore(&self) -> Result<Option<Address>> {
        let signer = {
            let state = self.state.lock().await;
            let Some(active) = state.active.as_deref() else {
                return Ok(None);
            };
            match state.find(active) {
                Some(stored) if stored.wallet.is_some() => LocalSigner::from_secret(&stored.key)?,
                _ => {
                    tracing::debug!(
                        credential_id = active,
                        "Persisted session has no deployed wallet"
                    );
                    return Ok(None);
                }
            }
        };

        let address = self.activate(signer).await;
        tracing::info!(%address, "Restored wallet session");
        Ok(Some(address))
    }

    async fn connect(&self) -> Result<Address> {
        let (credential_id, signer) = {
            let state = self.state.lock().await;
            let stored = state
                .credentials
                .iter()
                .filter(|c| c.wallet.is_some())
                .max_by_key(|c| c.created_at)
                .ok_or_else(|| Error::Wallet("No wallet found; create one first".to_string()))?;
            (stored.credential_id.clone(), LocalSigner::from_secret(&stored.key)?)
        };

        let mut state = self.state.lock().await;
        let previous = state.active.replace(credential_id);
        if let Err(e) = self.persist(&state).await {
            state.active = previous;
            return Err(e);
        }
        drop(state);

        Ok(self.activate(signer).await)
    }

    async fn create(&self, name: &str) -> Result<Address> {
        let credential_id = self.register_credential(Some(name)).await?;
        self.deploy(&credential_id).await
    }

    async fn is_connected(&self) -> bool {
        self.connected.lock().await.is_some()
    }

    async fn latest_ledger(&self) -> Result<u32> {
        u32::try_from(Utc::now().timestamp() / LEDGER_CLOSE_SECS)
            .map_err(|e| Error::Wallet(format!("Ledger clock out of range: {}", e)))
    }

    async fn sign_auth_entry(
        &self,
        entry: &AuthorizationEntry,
        expiration_ledger: u32,
    ) -> Result<AuthorizationEntry> {
        let connected = self.connected.lock().await;
        let signer = connected
            .as_ref()
            .ok_or_else(|| Error::Signing("No wallet connected".to_string()))?;

        match entry.signer() {
            Some(address) if address == signer.address() => {}
            Some(address) => {
                return Err(Error::Signing(format!(
                    "Entry is bound to {}, connected wallet is {}",
                    address,
                    signer.address()
                )))
            }
            None => {
                return Err(Error::Signing(
                    "Source-account entries are authorized by the transaction signature"
                        .to_string(),
                ))
            }
        }

        let payload = entry
            .signature_payload(&self.network_passphrase, expiration_ledger)
            .ok_or_else(|| Error::Signing("Entry has no signature payload".to_string()))?;
        let signature = signer.sign_hash(&payload)?;

        Ok(entry.with_signature(expiration_ledger, signature))
    }

    async fn submit(&self, envelope: &TransactionEnvelope) -> Result<String> {
        for entry in envelope.auth_entries() {
            if let Credentials::Address(creds) = &entry.credentials {
                if creds.signature.is_none() {
                    return Err(Error::Wallet(format!(
                        "Missing authorization from {}",
                        creds.address
                    )));
                }
            }
        }

        let id = hex::encode(envelope.hash(&self.network_passphrase)?);
        self.submitted.lock().await.push(id.clone());
        tracing::info!(transaction_id = %id, "Submitted transaction");
        Ok(id)
    }
}

#[async_trait]
impl CredentialStore for LocalWalletSession {
    async fn pending(&self) -> Result<Vec<PendingCredential>> {
        let state = self.state.lock().await;
        Ok(state
            .credentials
            .iter()
            .filter(|c| c.wallet.is_none())
            .map(|c| PendingCredential {
                credential_id: c.credential_id.clone(),
                created_at: c.created_at,
            })
            .collect())
    }

    async fn deploy(&self, credential_id: &str) -> Result<Address> {
        let mut state = self.state.lock().await;
        let index = state.index_of(credential_id)?;
        if state.credentials[index].wallet.is_some() {
            return Err(Error::Recovery(format!(
                "Credential {} already has a wallet",
                credential_id
            )));
        }

        let signer = LocalSigner::from_secret(&state.credentials[index].key)?;
        state.credentials[index].wallet = Some(signer.address());
        let previous = state.active.replace(credential_id.to_string());
        if let Err(e) = self.persist(&state).await {
            // still pending, so recovery can try again
            state.credentials[index].wallet = None;
            state.active = previous;
            tracing::warn!(credential_id, error = %e, "Deployment not recorded");
            return Err(e);
        }
        drop(state);

        let address = self.activate(signer).await;
        tracing::info!(credential_id, %address, "Deployed wallet");
        Ok(address)
    }

    async fn delete(&self, credential_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let index = state.index_of(credential_id)?;
        if state.credentials[index].wallet.is_some() {
            return Err(Error::Recovery(format!(
                "Credential {} controls a deployed wallet",
                credential_id
            )));
        }
        let removed = state.credentials.remove(index);
        if let Err(e) = self.persist(&state).await {
            state.credentials.insert(index, removed);
            return Err(e);
        }
        Ok(())
    }
}
