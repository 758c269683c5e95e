//! Multi-party transaction envelopes
//!
//! The popup only ever edits the authorization lists of contract
//! invocations. [`RawEnvelope`] makes those edits on the encoded text so
//! every other byte goes back out as it came in.

mod auth;
pub mod codec;
mod raw;

pub use auth::{network_id, AddressCredentials, AuthorizationEntry, Credentials, Invocation};
pub use raw::{AuthSlot, RawEnvelope};

use crate::Result;
use alloy::primitives::{keccak256, Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub tx: Transaction,
    #[serde(default)]
    pub signatures: Vec<DecoratedSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedSignature {
    pub hint: Bytes,
    pub signature: Bytes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub source_account: Address,
    pub fee: u32,
    pub seq_num: i64,
    #[serde(default)]
    pub cond: Preconditions,
    #[serde(default)]
    pub memo: Memo,
    pub operations: Vec<Operation>,
    /// Opaque resource/extension data
    #[serde(default)]
    pub ext: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Preconditions {
    #[default]
    None,
    Time {
        min_time: u64,
        max_time: u64,
    },
    Ledger {
        min_ledger: u32,
        max_ledger: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Memo {
    #[default]
    None,
    Text(String),
    Id(u64),
    Hash(B256),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub source_account: Option<Address>,
    pub body: OperationBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeContractOp {
    pub contract: Address,
    pub function: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub auth: Vec<AuthorizationEntry>,
}

/// Externally tagged: `{"invoke_contract": {...}}`. Entries hold raw JSON,
/// which serde cannot buffer through an internal tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationBody {
    InvokeContract(InvokeContractOp),
    Payment {
        destination: Address,
        asset: String,
        amount: i64,
    },
    /// Operation kinds the popup does not interpret
    Other { kind: String, body: Value },
}

impl TransactionEnvelope {
    pub fn from_base64(input: &str) -> Result<Self> {
        codec::decode(input)
    }

    pub fn to_base64(&self) -> Result<String> {
        codec::encode(self)
    }

    /// Identifier of the transaction on the given network
    pub fn hash(&self, network_passphrase: &str) -> Result<B256> {
        let body = serde_json::to_vec(&self.tx)?;
        let mut preimage = Vec::with_capacity(32 + body.len());
        preimage.extend_from_slice(network_id(network_passphrase).as_slice());
        preimage.extend_from_slice(&body);
        Ok(keccak256(preimage))
    }

    /// All authorization entries across contract invocations, in order
    pub fn auth_entries(&self) -> impl Iterator<Item = &AuthorizationEntry> {
        self.tx.operations.iter().flat_map(|op| match &op.body {
            OperationBody::InvokeContract(invoke) => invoke.auth.as_slice(),
            _ => &[][..],
        })
    }
}
