//! Response dispatcher
//!
//! Every request id gets exactly one terminal response, addressed to the
//! origin recorded when the request arrived. A second attempt to answer the
//! same id is dropped here, whatever path in the state machine produced it.

use super::{AuditLog, TargetOrigin, WindowChannel};
use crate::protocol::{
    ConnectResponse, OutgoingMessage, PopupStatus, SignAuthEntryResponse, SignTransactionResponse,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

pub struct ResponseDispatcher {
    channel: Arc<dyn WindowChannel>,
    answered: HashSet<String>,
    /// A connect request is waiting for its response
    connect_armed: bool,
    audit: Option<AuditLog>,
}

impl ResponseDispatcher {
    pub fn new(channel: Arc<dyn WindowChannel>) -> Self {
        Self {
            channel,
            answered: HashSet::new(),
            connect_armed: false,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Has a terminal response already been sent for this id?
    pub fn is_answered(&self, request_id: &str) -> bool {
        self.answered.contains(request_id)
    }

    /// Expect one connect response
    pub fn arm_connect(&mut self) {
        self.connect_armed = true;
    }

    pub fn connect_armed(&self) -> bool {
        self.connect_armed
    }

    /// Broadcast the readiness ping. Safe to send to any origin.
    pub async fn announce_ready(&self) {
        let message = OutgoingMessage::Ready(PopupStatus {
            timestamp: now_millis(),
        });
        self.deliver(&message, &TargetOrigin::Any).await;
    }

    /// Send the connect response; returns false if none was expected
    pub async fn connect(&mut self, origin: &str, response: ConnectResponse) -> bool {
        if !self.connect_armed {
            tracing::warn!(origin, "Dropping unexpected connect response");
            return false;
        }
        self.connect_armed = false;
        self.deliver(
            &OutgoingMessage::Connect(response),
            &TargetOrigin::Exact(origin.to_string()),
        )
        .await;
        true
    }

    /// Send the terminal transaction response; returns false if already answered
    pub async fn transaction(&mut self, origin: &str, response: SignTransactionResponse) -> bool {
        if !self.answered.insert(response.request_id.clone()) {
            tracing::warn!(
                request_id = %response.request_id,
                "Request already answered; dropping duplicate response"
            );
            return false;
        }
        self.deliver(
            &OutgoingMessage::SignTransaction(response),
            &TargetOrigin::Exact(origin.to_string()),
        )
        .await;
        true
    }

    /// Send the terminal auth-entry response; returns false if already answered
    pub async fn auth_entry(&mut self, origin: &str, response: SignAuthEntryResponse) -> bool {
        if !self.answered.insert(response.request_id.clone()) {
            tracing::warn!(
                request_id = %response.request_id,
                "Request already answered; dropping duplicate response"
            );
            return false;
        }
        self.deliver(
            &OutgoingMessage::SignAuthEntry(response),
            &TargetOrigin::Exact(origin.to_string()),
        )
        .await;
        true
    }

    /// Best-effort close notice, then close the window
    pub async fn close_window(&self, origin: Option<&str>) {
        if let Some(origin) = origin {
            let notice = OutgoingMessage::Closed(PopupStatus {
                timestamp: now_millis(),
            });
            self.deliver(&notice, &TargetOrigin::Exact(origin.to_string()))
                .await;
        }
        if let Err(e) = self.channel.close().await {
            tracing::warn!(error = %e, "Failed to close popup window");
        }
    }

    async fn deliver(&self, message: &OutgoingMessage, target: &TargetOrigin) {
        let delivered = match self.channel.post(message, target).await {
            Ok(()) => {
                tracing::debug!(message = message.kind(), target = %target, "Posted to opener");
                true
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    message = message.kind(),
                    target = %target,
                    "Failed to post to opener"
                );
                false
            }
        };

        if message.success().is_some() {
            if let Some(audit) = &self.audit {
                audit.record(message, target.as_str(), delivered).await;
            }
        }
    }
}

fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;

    fn rejected(id: &str) -> SignAuthEntryResponse {
        SignAuthEntryResponse {
            request_id: id.to_string(),
            success: false,
            signed_entry: None,
            error: Some("User rejected the request".to_string()),
        }
    }

    #[tokio::test]
    async fn second_response_for_same_id_is_dropped() {
        let channel = MemoryChannel::new();
        let mut dispatcher = ResponseDispatcher::new(Arc::new(channel.clone()));

        assert!(dispatcher.auth_entry("https://a.example", rejected("r1")).await);
        assert!(!dispatcher.auth_entry("https://a.example", rejected("r1")).await);
        assert!(dispatcher.is_answered("r1"));
        assert_eq!(channel.responses().len(), 1);
    }

    #[tokio::test]
    async fn responses_are_scoped_to_origin() {
        let channel = MemoryChannel::new();
        let mut dispatcher = ResponseDispatcher::new(Arc::new(channel.clone()));

        dispatcher.arm_connect();
        dispatcher
            .connect("https://a.example", ConnectResponse::connected("0xabc"))
            .await;

        let posted = channel.posted();
        assert_eq!(
            posted[0].target,
            TargetOrigin::Exact("https://a.example".to_string())
        );
    }

    #[tokio::test]
    async fn only_ready_ping_is_broadcast() {
        let channel = MemoryChannel::new();
        let dispatcher = ResponseDispatcher::new(Arc::new(channel.clone()));

        dispatcher.announce_ready().await;
        dispatcher.close_window(Some("https://a.example")).await;

        let posted = channel.posted();
        assert_eq!(posted.len(), 2);
        assert_eq!(posted[0].target, TargetOrigin::Any);
        assert!(matches!(posted[0].message, OutgoingMessage::Ready(_)));
        assert_eq!(
            posted[1].target,
            TargetOrigin::Exact("https://a.example".to_string())
        );
        assert!(channel.is_closed());
    }

    #[tokio::test]
    async fn unarmed_connect_response_is_not_sent() {
        let channel = MemoryChannel::new();
        let mut dispatcher = ResponseDispatcher::new(Arc::new(channel.clone()));

        assert!(
            !dispatcher
                .connect("https://a.example", ConnectResponse::connected("0xabc"))
                .await
        );
        assert!(channel.posted().is_empty());
    }
}
