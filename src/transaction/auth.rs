//! Authorization entries
//!
//! An entry grants one signer's approval for a contract invocation tree.
//! Entries satisfied by the transaction source account carry no address and
//! are never signed here.
//!
//! The invocation tree is kept as the JSON text it arrived in. Signatures
//! commit to those exact bytes, and re-encoding an entry never rewrites
//! numbers or key order inside it.

use super::codec;
use crate::Result;
use alloy::primitives::{keccak256, Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

/// A contract call and the calls it makes on the signer's behalf.
///
/// Used to build entries; received entries keep their invocation verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub contract: Address,
    pub function: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub sub_invocations: Vec<Invocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressCredentials {
    pub address: Address,
    pub nonce: i64,
    pub signature_expiration_ledger: u32,
    #[serde(default)]
    pub signature: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// Covered by the transaction's own source-account signature
    SourceAccount,
    /// Must be signed by the named address
    Address(AddressCredentials),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationEntry {
    pub credentials: Credentials,
    /// Invocation tree, byte for byte as received
    pub root_invocation: Box<RawValue>,
}

impl PartialEq for AuthorizationEntry {
    fn eq(&self, other: &Self) -> bool {
        self.credentials == other.credentials
            && self.root_invocation.get() == other.root_invocation.get()
    }
}

impl AuthorizationEntry {
    pub fn new(credentials: Credentials, root_invocation: &Invocation) -> Result<Self> {
        Ok(Self {
            credentials,
            root_invocation: serde_json::value::to_raw_value(root_invocation)?,
        })
    }

    pub fn from_base64(input: &str) -> Result<Self> {
        codec::decode(input)
    }

    pub fn to_base64(&self) -> Result<String> {
        codec::encode(self)
    }

    /// Address this entry must be signed by, if any
    pub fn signer(&self) -> Option<Address> {
        match &self.credentials {
            Credentials::Address(creds) => Some(creds.address),
            Credentials::SourceAccount => None,
        }
    }

    pub fn is_bound_to(&self, address: Address) -> bool {
        self.signer() == Some(address)
    }

    /// Hash a signer commits to for this entry.
    ///
    /// Covers the network, the replay nonce, the expiration ledger and the
    /// full invocation tree. Returns `None` for source-account entries.
    pub fn signature_payload(
        &self,
        network_passphrase: &str,
        expiration_ledger: u32,
    ) -> Option<B256> {
        let Credentials::Address(creds) = &self.credentials else {
            return None;
        };

        let invocation = self.root_invocation.get().as_bytes();
        let mut preimage = Vec::with_capacity(32 + 8 + 4 + invocation.len());
        preimage.extend_from_slice(network_id(network_passphrase).as_slice());
        preimage.extend_from_slice(&creds.nonce.to_be_bytes());
        preimage.extend_from_slice(&expiration_ledger.to_be_bytes());
        preimage.extend_from_slice(invocation);

        Some(keccak256(preimage))
    }

    /// Copy of this entry carrying `signature`, valid until `expiration_ledger`
    pub fn with_signature(&self, expiration_ledger: u32, signature: Bytes) -> Self {
        let mut signed = self.clone();
        if let Credentials::Address(creds) = &mut signed.credentials {
            creds.signature_expiration_ledger = expiration_ledger;
            creds.signature = Some(signature);
        }
        signed
    }
}

/// Network identifier derived from its passphrase
pub fn network_id(network_passphrase: &str) -> B256 {
    keccak256(network_passphrase.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn entry_for(signer: Address) -> AuthorizationEntry {
        let credentials = Credentials::Address(AddressCredentials {
            address: signer,
            nonce: 42,
            signature_expiration_ledger: 0,
            signature: None,
        });
        let invocation = Invocation {
            contract: address!("1000000000000000000000000000000000000001"),
            function: "deposit".to_string(),
            args: vec![serde_json::json!(100)],
            sub_invocations: vec![],
        };
        AuthorizationEntry::new(credentials, &invocation).unwrap()
    }

    #[test]
    fn payload_changes_with_expiration_and_network() {
        let entry = entry_for(address!("00000000000000000000000000000000000000aa"));

        let a = entry.signature_payload("net-a", 100).unwrap();
        let b = entry.signature_payload("net-a", 101).unwrap();
        let c = entry.signature_payload("net-b", 100).unwrap();

        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn source_account_entry_has_no_payload() {
        let mut entry = entry_for(Address::ZERO);
        entry.credentials = Credentials::SourceAccount;

        assert!(entry.signer().is_none());
        assert!(entry.signature_payload("net", 1).is_none());
    }

    #[test]
    fn received_invocation_is_kept_verbatim() {
        const INVOCATION: &str = concat!(
            r#"{"function": "deposit", "#,
            r#""contract": "0x1000000000000000000000000000000000000001", "#,
            r#""args": [340282366920938463463374607431768211455]}"#
        );
        let credentials = concat!(
            r#"{"type": "address", "nonce": 1, "signature_expiration_ledger": 0, "#,
            r#""address": "0x00000000000000000000000000000000000000aa"}"#
        );
        let input = format!(
            r#"{{"credentials": {}, "root_invocation": {}}}"#,
            credentials, INVOCATION
        );
        let entry: AuthorizationEntry = serde_json::from_str(&input).unwrap();
        assert_eq!(entry.root_invocation.get(), INVOCATION);

        let signed = entry.with_signature(9, Bytes::from(vec![7]));
        let text = serde_json::to_string(&signed).unwrap();
        assert!(text.contains(INVOCATION));

        // the payload covers the text as received, not a re-encoding of it
        let rebuilt: Invocation = serde_json::from_str(INVOCATION).unwrap();
        let rebuilt = AuthorizationEntry::new(entry.credentials.clone(), &rebuilt).unwrap();
        assert_ne!(
            entry.signature_payload("net", 9),
            rebuilt.signature_payload("net", 9)
        );
    }

    #[test]
    fn unknown_entry_fields_are_rejected() {
        let input = r#"{"credentials":{"type":"source_account"},"root_invocation":{},"memo":"x"}"#;
        assert!(serde_json::from_str::<AuthorizationEntry>(input).is_err());
    }

    #[test]
    fn with_signature_sets_expiration() {
        let signer = address!("00000000000000000000000000000000000000aa");
        let signed = entry_for(signer).with_signature(500, Bytes::from(vec![1, 2, 3]));

        match signed.credentials {
            Credentials::Address(creds) => {
                assert_eq!(creds.signature_expiration_ledger, 500);
                assert_eq!(creds.signature, Some(Bytes::from(vec![1, 2, 3])));
                assert_eq!(creds.nonce, 42);
            }
            Credentials::SourceAccount => panic!("credentials changed kind"),
        }
    }
}
