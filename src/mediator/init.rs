//! Buffer-then-drain queue for requests that arrive before session restore
//!
//! While the popup is still restoring a session, at most one connect and
//! one sign request are held. Draining flips the queue to `Complete` and
//! hands the held requests out; any later drain gets nothing.

use super::types::PendingRequest;
use crate::protocol::ConnectRequest;

#[derive(Debug, Default)]
pub struct HeldRequests {
    pub connect: Option<ConnectRequest>,
    pub sign: Option<PendingRequest>,
}

#[derive(Debug)]
enum Phase {
    Pending(HeldRequests),
    Complete,
}

#[derive(Debug)]
pub struct InitQueue {
    phase: Phase,
}

impl Default for InitQueue {
    fn default() -> Self {
        Self {
            phase: Phase::Pending(HeldRequests::default()),
        }
    }
}

impl InitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.phase, Phase::Complete)
    }

    /// Hold a connect request; a later one replaces an earlier one
    pub fn hold_connect(&mut self, request: ConnectRequest) {
        if let Phase::Pending(held) = &mut self.phase {
            held.connect = Some(request);
        }
    }

    /// Hold a sign request. Hands it back if the slot is taken or
    /// initialization already finished.
    pub fn hold_sign(&mut self, request: PendingRequest) -> Result<(), PendingRequest> {
        match &mut self.phase {
            Phase::Pending(held) if held.sign.is_none() => {
                held.sign = Some(request);
                Ok(())
            }
            _ => Err(request),
        }
    }

    pub fn held_sign_id(&self) -> Option<&str> {
        match &self.phase {
            Phase::Pending(held) => held.sign.as_ref().map(|r| r.id.as_str()),
            Phase::Complete => None,
        }
    }

    /// Mark initialization complete; returns the held requests the first time only
    pub fn drain(&mut self) -> Option<HeldRequests> {
        match std::mem::replace(&mut self.phase, Phase::Complete) {
            Phase::Pending(held) => Some(held),
            Phase::Complete => None,
        }
    }
}
