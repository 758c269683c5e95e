//! Outbound side of the cross-window channel
//!
//! The popup talks to exactly one opener. Responses are always scoped to an
//! explicit origin; only the startup ping may be posted to any origin.

mod audit;
mod dispatcher;
mod memory;
mod stdio;

pub use audit::AuditLog;
pub use dispatcher::ResponseDispatcher;
pub use memory::{MemoryChannel, PostedMessage};
pub use stdio::StdioChannel;

use crate::protocol::OutgoingMessage;
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Where a posted message may be delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TargetOrigin {
    /// Delivered only if the opener is still at this origin
    Exact(String),
    /// `"*"`; reserved for the readiness ping
    Any,
}

impl TargetOrigin {
    pub fn as_str(&self) -> &str {
        match self {
            TargetOrigin::Exact(origin) => origin,
            TargetOrigin::Any => "*",
        }
    }
}

impl fmt::Display for TargetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle on the opener window
#[async_trait]
pub trait WindowChannel: Send + Sync {
    /// Post one message to the opener
    async fn post(&self, message: &OutgoingMessage, target: &TargetOrigin) -> Result<()>;

    /// Close the popup
    async fn close(&self) -> Result<()>;
}
