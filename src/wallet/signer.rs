//! Local credential signer
//!
//! SECURITY: This is the ONLY place where key material is used.
//! - Keys are held in alloy's PrivateKeySigner
//! - Persisted key hex only ever travels inside a SecretString
//! - Keys are never logged

use crate::{Error, Result};
use alloy::primitives::{hex, Address, Bytes, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use secrecy::{ExposeSecret, SecretString};

/// Key-backed stand-in for a registered passkey credential
#[derive(Clone)]
pub struct LocalSigner {
    signer: PrivateKeySigner,
    /// Public address (safe to expose)
    address: Address,
}

impl LocalSigner {
    /// Fresh random credential
    pub fn generate() -> Self {
        Self::from_signer(PrivateKeySigner::random())
    }

    /// Create a signer from a hex-encoded private key
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| Error::Wallet(format!("Invalid credential key: {}", e)))?;

        Ok(Self::from_signer(signer))
    }

    pub fn from_secret(key: &SecretString) -> Result<Self> {
        Self::from_hex(key.expose_secret())
    }

    fn from_signer(signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        Self { signer, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Key material for persistence
    pub fn to_secret(&self) -> SecretString {
        SecretString::from(hex::encode(self.signer.to_bytes()))
    }

    /// Sign a 32-byte payload; returns the 65-byte recoverable signature
    pub fn sign_hash(&self, hash: &B256) -> Result<Bytes> {
        let signature = self
            .signer
            .sign_hash_sync(hash)
            .map_err(|e| Error::Signing(e.to_string()))?;
        Ok(Bytes::from(signature.as_bytes().to_vec()))
    }
}

// Implement Debug manually to avoid exposing the signer
impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}
