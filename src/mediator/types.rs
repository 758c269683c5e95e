//! State and event types of the mediator

use crate::gate::Faction;
use crate::protocol::{InboundEnvelope, SignAuthEntryRequest, SignTransactionRequest};
use serde::{Deserialize, Serialize};

/// What the popup is currently showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerMode {
    Initializing,
    Connecting,
    Connected,
    Onboarding,
    Signing,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Transaction,
    AuthEntry,
}

/// A sign request waiting for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: String,
    pub kind: RequestKind,
    pub description: String,
    /// Base64 envelope or entry
    pub payload: String,
    pub submit: bool,
    /// Canonical origin the response goes to
    pub origin: String,
    pub timestamp: u64,
}

impl PendingRequest {
    pub fn transaction(req: SignTransactionRequest, origin: String) -> Self {
        Self {
            id: req.request_id,
            kind: RequestKind::Transaction,
            description: req.description,
            payload: req.transaction_envelope,
            submit: req.submit.unwrap_or(false),
            origin,
            timestamp: req.timestamp,
        }
    }

    pub fn auth_entry(req: SignAuthEntryRequest, origin: String) -> Self {
        Self {
            id: req.request_id,
            kind: RequestKind::AuthEntry,
            description: req.description,
            payload: req.auth_entry,
            submit: false,
            origin,
            timestamp: req.timestamp,
        }
    }
}

/// The application that opened the popup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub name: String,
    pub icon: Option<String>,
    pub origin: String,
}

/// Which response the onboarding gate is holding back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateFlow {
    Connect,
    Sign,
}

/// Something the user did in the popup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UserAction {
    /// Connect with an existing credential
    Connect,
    /// Register a new credential and deploy a wallet
    Create { name: String },
    SelectFaction { faction: Faction },
    Approve,
    Retry,
    Reject,
    DeployPending { credential_id: String },
    DeletePending { credential_id: String, confirmed: bool },
    DismissError,
}

/// Input to the mediator's single handler
#[derive(Debug, Clone)]
pub enum MediatorEvent {
    Message(InboundEnvelope),
    Action(UserAction),
}
