//! In-process channel that records what would have been posted

use super::{TargetOrigin, WindowChannel};
use crate::protocol::OutgoingMessage;
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub message: OutgoingMessage,
    pub target: TargetOrigin,
}

/// Channel that keeps every posted message in memory
#[derive(Clone, Default)]
pub struct MemoryChannel {
    posted: Arc<Mutex<Vec<PostedMessage>>>,
    closed: Arc<AtomicBool>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything posted so far
    pub fn posted(&self) -> Vec<PostedMessage> {
        self.posted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Posted messages that carry a success flag
    pub fn responses(&self) -> Vec<PostedMessage> {
        self.posted()
            .into_iter()
            .filter(|p| p.message.success().is_some())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WindowChannel for MemoryChannel {
    async fn post(&self, message: &OutgoingMessage, target: &TargetOrigin) -> Result<()> {
        self.posted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(PostedMessage {
                message: message.clone(),
                target: target.clone(),
            });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
