//! Messages the popup posts back to the referring window

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ConnectResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectResponse {
    pub fn connected(address: impl Into<String>) -> Self {
        Self {
            success: true,
            address: Some(address.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            address: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SignTransactionResponse {
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_envelope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SignAuthEntryResponse {
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PopupStatus {
    #[ts(type = "number")]
    pub timestamp: u64,
}

/// Every message the popup sends to its opener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(tag = "type")]
#[ts(export)]
pub enum OutgoingMessage {
    /// Startup ping; carries nothing sensitive
    #[serde(rename = "POPUP_READY")]
    Ready(PopupStatus),
    #[serde(rename = "CONNECT_RESPONSE")]
    Connect(ConnectResponse),
    #[serde(rename = "SIGN_TRANSACTION_RESPONSE")]
    SignTransaction(SignTransactionResponse),
    #[serde(rename = "SIGN_AUTH_ENTRY_RESPONSE")]
    SignAuthEntry(SignAuthEntryResponse),
    #[serde(rename = "POPUP_CLOSED")]
    Closed(PopupStatus),
}

impl OutgoingMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutgoingMessage::Ready(_) => "ready",
            OutgoingMessage::Connect(_) => "connect",
            OutgoingMessage::SignTransaction(_) => "sign_transaction",
            OutgoingMessage::SignAuthEntry(_) => "sign_auth_entry",
            OutgoingMessage::Closed(_) => "closed",
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            OutgoingMessage::SignTransaction(r) => Some(&r.request_id),
            OutgoingMessage::SignAuthEntry(r) => Some(&r.request_id),
            _ => None,
        }
    }

    /// Success flag of a terminal response
    pub fn success(&self) -> Option<bool> {
        match self {
            OutgoingMessage::Connect(r) => Some(r.success),
            OutgoingMessage::SignTransaction(r) => Some(r.success),
            OutgoingMessage::SignAuthEntry(r) => Some(r.success),
            OutgoingMessage::Ready(_) | OutgoingMessage::Closed(_) => None,
        }
    }
}
