//! Cross-window wire protocol
//!
//! Messages travel as JSON objects tagged by `type`. The popup only trusts
//! the window that opened it; the `source` of every inbound envelope is
//! compared against that window before anything else is looked at.

mod incoming;
mod outgoing;

pub use incoming::{
    ConnectRequest, IncomingMessage, SignAuthEntryRequest, SignTransactionRequest, UiErrorNotice,
};
pub use outgoing::{
    ConnectResponse, OutgoingMessage, PopupStatus, SignAuthEntryResponse, SignTransactionResponse,
};

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identity of a browsing context (the `source` of a message event)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub String);

impl WindowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message together with the window that posted it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEnvelope {
    pub source: WindowId,
    pub message: IncomingMessage,
}

/// Reduce an origin string to its canonical `scheme://host[:port]` form.
///
/// Opaque origins (`null`, `data:` and friends) can never be replied to and
/// are rejected.
pub fn normalize_origin(raw: &str) -> Result<String> {
    let url = url::Url::parse(raw)
        .map_err(|e| Error::Validation(format!("bad origin {:?}: {}", raw, e)))?;
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(Error::Validation(format!("opaque origin {:?}", raw)));
    }
    Ok(origin.ascii_serialization())
}

/// JSON schema of both message directions
pub fn protocol_schema() -> serde_json::Value {
    serde_json::json!({
        "incoming": schemars::schema_for!(IncomingMessage),
        "outgoing": schemars::schema_for!(OutgoingMessage),
    })
}
