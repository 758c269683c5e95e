//! Messages posted to the popup by the referring window

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Request to connect a wallet to the referring application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ConnectRequest {
    pub app_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_icon: Option<String>,
    pub origin: String,
    #[ts(type = "number")]
    pub timestamp: u64,
}

/// Request to co-sign a full transaction envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SignTransactionRequest {
    pub request_id: String,
    /// Base64 transaction envelope
    pub transaction_envelope: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit: Option<bool>,
    pub origin: String,
    #[ts(type = "number")]
    pub timestamp: u64,
}

/// Request to sign one standalone authorization entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SignAuthEntryRequest {
    pub request_id: String,
    /// Base64 authorization entry
    pub auth_entry: String,
    pub description: String,
    pub origin: String,
    #[ts(type = "number")]
    pub timestamp: u64,
}

/// Error raised by the referring application's UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UiErrorNotice {
    pub error: String,
    pub origin: String,
    #[ts(type = "number")]
    pub timestamp: u64,
}

/// Every message the popup accepts from its opener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(tag = "type")]
#[ts(export)]
pub enum IncomingMessage {
    #[serde(rename = "CONNECT_REQUEST")]
    Connect(ConnectRequest),
    #[serde(rename = "SIGN_TRANSACTION_REQUEST")]
    SignTransaction(SignTransactionRequest),
    #[serde(rename = "SIGN_AUTH_ENTRY_REQUEST")]
    SignAuthEntry(SignAuthEntryRequest),
    #[serde(rename = "UI_ERROR")]
    UiError(UiErrorNotice),
}

impl IncomingMessage {
    pub fn origin(&self) -> &str {
        match self {
            IncomingMessage::Connect(m) => &m.origin,
            IncomingMessage::SignTransaction(m) => &m.origin,
            IncomingMessage::SignAuthEntry(m) => &m.origin,
            IncomingMessage::UiError(m) => &m.origin,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            IncomingMessage::Connect(m) => m.timestamp,
            IncomingMessage::SignTransaction(m) => m.timestamp,
            IncomingMessage::SignAuthEntry(m) => m.timestamp,
            IncomingMessage::UiError(m) => m.timestamp,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            IncomingMessage::SignTransaction(m) => Some(&m.request_id),
            IncomingMessage::SignAuthEntry(m) => Some(&m.request_id),
            IncomingMessage::Connect(_) | IncomingMessage::UiError(_) => None,
        }
    }

    /// Short tag used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            IncomingMessage::Connect(_) => "connect",
            IncomingMessage::SignTransaction(_) => "sign_transaction",
            IncomingMessage::SignAuthEntry(_) => "sign_auth_entry",
            IncomingMessage::UiError(_) => "ui_error",
        }
    }
}
