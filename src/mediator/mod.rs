//! Popup state machine
//!
//! A single handler consumes inbound messages and user actions in arrival
//! order. Requests that arrive while the session is still being restored are
//! held by [`InitQueue`] and replayed once restoration settles. Nothing is
//! answered before the onboarding gate is satisfied, and every answer goes
//! through the [`ResponseDispatcher`], which guarantees one terminal response
//! per request id.
//!
//! SECURITY NOTE:
//! - Messages whose source is not the opener window are dropped unseen
//! - Responses go to the origin recorded with the request, never to "*"
//! - Signing reads the active wallet at the moment the user approves

mod init;
mod types;

pub use init::{HeldRequests, InitQueue};
pub use types::{
    AppInfo, GateFlow, MediatorEvent, PendingRequest, RequestKind, SignerMode, UserAction,
};

use crate::channel::{AuditLog, ResponseDispatcher, WindowChannel};
use crate::config::Config;
use crate::gate::{Faction, GateCheck, OnboardingGate, SelectionStatusProvider};
use crate::protocol::{
    normalize_origin, ConnectRequest, ConnectResponse, InboundEnvelope, IncomingMessage,
    SignAuthEntryResponse, SignTransactionResponse, UiErrorNotice, WindowId,
};
use crate::recovery::{CredentialStore, PendingCredential, PendingCredentialRecovery};
use crate::signing::{AuthEntrySigner, TransactionCoSigner};
use crate::wallet::{ActiveWallet, WalletSession};
use crate::{Error, ErrorKind, Result};
use alloy::primitives::Address;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const USER_REJECTED: &str = "User rejected the request";
pub const REQUEST_IN_PROGRESS: &str = "Another request is already in progress";

/// Everything the mediator talks to
pub struct Collaborators {
    pub wallet: Arc<dyn WalletSession>,
    pub status: Arc<dyn SelectionStatusProvider>,
    pub credentials: Arc<dyn CredentialStore>,
    pub channel: Arc<dyn WindowChannel>,
}

pub struct Mediator {
    config: Config,
    opener: Option<WindowId>,
    mode: SignerMode,
    init: InitQueue,
    app: Option<AppInfo>,
    pending: Option<PendingRequest>,
    /// Set while the selection screen holds back a response
    gate_flow: Option<GateFlow>,
    /// Wallet that last passed the gate
    gate_passed_for: Option<Address>,
    last_error: Option<String>,
    /// Signed envelope whose submission failed
    unsubmitted_envelope: Option<String>,
    closed: bool,
    wallet: Arc<dyn WalletSession>,
    active: ActiveWallet,
    gate: OnboardingGate,
    cosigner: TransactionCoSigner,
    auth_signer: AuthEntrySigner,
    recovery: PendingCredentialRecovery,
    dispatcher: ResponseDispatcher,
}

impl Mediator {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let active = ActiveWallet::new();
        let expiration = config.signing.auth_expiration_ledgers;
        let Collaborators {
            wallet,
            status,
            credentials,
            channel,
        } = collaborators;

        Self {
            opener: config.window.opener.clone().map(WindowId::new),
            mode: SignerMode::Initializing,
            init: InitQueue::new(),
            app: None,
            pending: None,
            gate_flow: None,
            gate_passed_for: None,
            last_error: None,
            unsubmitted_envelope: None,
            closed: false,
            gate: OnboardingGate::new(status, config.gate.clone()),
            cosigner: TransactionCoSigner::new(wallet.clone(), active.clone(), expiration),
            auth_signer: AuthEntrySigner::new(wallet.clone(), active.clone(), expiration),
            recovery: PendingCredentialRecovery::new(credentials, active.clone()),
            dispatcher: ResponseDispatcher::new(channel),
            wallet,
            active,
            config,
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.dispatcher = self.dispatcher.with_audit(audit);
        self
    }

    pub fn mode(&self) -> SignerMode {
        self.mode
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn pending(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    pub fn app(&self) -> Option<&AppInfo> {
        self.app.as_ref()
    }

    pub fn gate_flow(&self) -> Option<GateFlow> {
        self.gate_flow
    }

    pub fn unsubmitted_envelope(&self) -> Option<&str> {
        self.unsubmitted_envelope.as_deref()
    }

    pub fn is_initialized(&self) -> bool {
        self.init.is_complete()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn active_wallet(&self) -> ActiveWallet {
        self.active.clone()
    }

    /// Orphaned credentials the user may deploy or delete
    pub async fn pending_credentials(&self) -> Result<Vec<PendingCredential>> {
        self.recovery.list().await
    }

    /// Announce readiness to the opener.
    ///
    /// Without an opener there is nobody to answer, so the popup goes
    /// straight to a terminal error.
    pub async fn start(&mut self) -> Result<()> {
        if self.opener.is_none() {
            self.surface(Error::NoOpener, "start");
            return Err(Error::NoOpener);
        }
        self.dispatcher.announce_ready().await;
        Ok(())
    }

    /// Drive the popup until it closes or the event source goes away
    pub async fn run(mut self, mut events: mpsc::Receiver<MediatorEvent>) -> Result<()> {
        self.start().await?;

        let wallet = self.wallet.clone();
        let restore = async move { wallet.restore().await };
        tokio::pin!(restore);
        let mut restoring = true;

        while !self.closed {
            tokio::select! {
                restored = &mut restore, if restoring => {
                    restoring = false;
                    self.finish_initialization(restored).await;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => {
                        tracing::info!("Event source closed; stopping");
                        break;
                    }
                },
            }
        }
        Ok(())
    }

    pub async fn handle(&mut self, event: MediatorEvent) {
        if self.closed {
            tracing::debug!("Popup closed; ignoring event");
            return;
        }
        match event {
            MediatorEvent::Message(envelope) => self.handle_message(envelope).await,
            MediatorEvent::Action(action) => self.handle_action(action).await,
        }
    }

    /// Session restore settled. Replays held requests the first time only.
    pub async fn finish_initialization(&mut self, restored: Result<Option<Address>>) {
        let Some(held) = self.init.drain() else {
            tracing::warn!("Initialization already complete; ignoring restore result");
            return;
        };

        let restored = match restored {
            Ok(address) => address,
            Err(e) => {
                tracing::info!(error = %e, "Session restore failed; treating as no session");
                None
            }
        };
        if let Some(address) = restored {
            self.active.set(address).await;
        }
        tracing::info!(
            restored = restored.is_some(),
            held_connect = held.connect.is_some(),
            held_sign = held.sign.is_some(),
            "Initialization complete"
        );

        if self.mode == SignerMode::Error {
            return;
        }

        if let Some(request) = held.sign {
            self.pending = Some(request);
        }
        if held.connect.is_some() || self.pending.is_some() {
            self.resume_flow().await;
        } else if restored.is_some() {
            self.mode = SignerMode::Connected;
        } else {
            self.mode = SignerMode::Connecting;
        }
    }

    async fn handle_message(&mut self, envelope: InboundEnvelope) {
        if self.opener.as_ref() != Some(&envelope.source) {
            tracing::debug!(source = %envelope.source, "Dropping message from foreign window");
            return;
        }
        let origin = match normalize_origin(envelope.message.origin()) {
            Ok(origin) => origin,
            Err(e) => {
                self.surface(e, envelope.message.kind());
                return;
            }
        };

        match envelope.message {
            IncomingMessage::Connect(request) => self.on_connect(request, origin).await,
            IncomingMessage::SignTransaction(request) => {
                self.on_sign_request(PendingRequest::transaction(request, origin))
                    .await
            }
            IncomingMessage::SignAuthEntry(request) => {
                self.on_sign_request(PendingRequest::auth_entry(request, origin))
                    .await
            }
            IncomingMessage::UiError(notice) => self.on_ui_error(notice),
        }
    }

    async fn on_connect(&mut self, request: ConnectRequest, origin: String) {
        tracing::info!(app = %request.app_name, %origin, "Connect request");
        self.app = Some(AppInfo {
            name: request.app_name.clone(),
            icon: request.app_icon.clone(),
            origin,
        });
        self.dispatcher.arm_connect();

        if !self.init.is_complete() {
            self.init.hold_connect(request);
            return;
        }
        self.resume_flow().await;
    }

    async fn on_sign_request(&mut self, request: PendingRequest) {
        if self.dispatcher.is_answered(&request.id) {
            tracing::debug!(request_id = %request.id, "Request already answered; ignoring");
            return;
        }
        let in_flight = self
            .pending
            .as_ref()
            .map(|p| p.id.as_str())
            .or_else(|| self.init.held_sign_id());
        match in_flight {
            Some(id) if id == request.id => {
                tracing::debug!(
                    request_id = %request.id,
                    "Duplicate of in-flight request; ignoring"
                );
                return;
            }
            Some(id) => {
                tracing::warn!(
                    request_id = %request.id,
                    in_flight = id,
                    "Refusing concurrent request"
                );
                self.respond_failure(&request, REQUEST_IN_PROGRESS).await;
                return;
            }
            None => {}
        }

        tracing::info!(
            request_id = %request.id,
            kind = ?request.kind,
            origin = %request.origin,
            "Sign request"
        );
        if self.app.is_none() {
            self.app = Some(AppInfo {
                name: request.origin.clone(),
                icon: None,
                origin: request.origin.clone(),
            });
        }

        if !self.init.is_complete() {
            if let Err(request) = self.init.hold_sign(request) {
                self.respond_failure(&request, REQUEST_IN_PROGRESS).await;
            }
            return;
        }

        self.last_error = None;
        self.pending = Some(request);
        self.resume_flow().await;
    }

    fn on_ui_error(&mut self, notice: UiErrorNotice) {
        tracing::warn!(error = %notice.error, "Opener reported an error");
        self.last_error = Some(notice.error);
        if self.pending.is_none() && self.init.is_complete() {
            self.mode = SignerMode::Connected;
        }
    }

    async fn handle_action(&mut self, action: UserAction) {
        if self.opener.is_none() {
            tracing::debug!(?action, "No opener; ignoring action");
            return;
        }
        match action {
            UserAction::Connect => {
                let connected = self.wallet.connect().await;
                self.after_wallet_attempt(connected, "connect").await;
            }
            UserAction::Create { name } => {
                let created = self.wallet.create(&name).await;
                self.after_wallet_attempt(created, "create").await;
            }
            UserAction::DeployPending { credential_id } => {
                // recovery already updated the active wallet on success
                match self.recovery.deploy(&credential_id).await {
                    Ok(address) => self.after_connected(address).await,
                    Err(e) => self.surface(e, "deploy"),
                }
            }
            UserAction::DeletePending {
                credential_id,
                confirmed,
            } => {
                if let Err(e) = self.recovery.delete(&credential_id, confirmed).await {
                    self.surface(e, "delete");
                }
            }
            UserAction::SelectFaction { faction } => self.select_faction(faction).await,
            UserAction::Approve | UserAction::Retry => self.approve().await,
            UserAction::Reject => self.reject().await,
            UserAction::DismissError => self.last_error = None,
        }
    }

    async fn after_wallet_attempt(&mut self, attempt: Result<Address>, what: &str) {
        match attempt {
            Ok(address) => {
                self.active.set(address).await;
                self.after_connected(address).await;
            }
            Err(e) => self.surface(e, what),
        }
    }

    async fn after_connected(&mut self, address: Address) {
        self.last_error = None;
        if self.dispatcher.connect_armed() || self.pending.is_some() {
            self.run_gate(address).await;
        } else {
            self.mode = SignerMode::Connected;
        }
    }

    /// Continue the held-back flow with whatever wallet is active now
    async fn resume_flow(&mut self) {
        match self.active.current().await {
            Some(address) => self.run_gate(address).await,
            None => self.mode = SignerMode::Connecting,
        }
    }

    async fn run_gate(&mut self, address: Address) {
        let flow = if self.pending.is_some() {
            GateFlow::Sign
        } else {
            GateFlow::Connect
        };
        match self.gate.check(address).await {
            GateCheck::Satisfied(_) => self.gate_satisfied(address).await,
            GateCheck::NeedsSelection(reason) => {
                tracing::info!(%address, ?flow, ?reason, "Selection required");
                self.gate_flow = Some(flow);
                self.mode = SignerMode::Onboarding;
            }
        }
    }

    async fn select_faction(&mut self, faction: Faction) {
        if self.mode != SignerMode::Onboarding {
            tracing::debug!(mode = ?self.mode, "Not onboarding; ignoring selection");
            return;
        }
        let Some(address) = self.active.current().await else {
            self.last_error = Some("No wallet connected".to_string());
            self.mode = SignerMode::Connecting;
            return;
        };

        match self.gate.select(address, faction).await {
            Ok(outcome) if self.gate.accepts(outcome) => {
                self.last_error = None;
                self.gate_satisfied(address).await;
            }
            Ok(_) => {
                self.last_error =
                    Some("Selection not confirmed yet; try again shortly".to_string());
            }
            Err(e) => self.surface(e, "selection"),
        }
    }

    async fn gate_satisfied(&mut self, address: Address) {
        self.gate_flow = None;
        self.gate_passed_for = Some(address);

        let mut answered_connect = false;
        if self.dispatcher.connect_armed() {
            if let Some(origin) = self.app.as_ref().map(|a| a.origin.clone()) {
                answered_connect = self
                    .dispatcher
                    .connect(&origin, ConnectResponse::connected(address.to_string()))
                    .await;
            }
        }

        if self.pending.is_some() {
            self.mode = SignerMode::Signing;
        } else if answered_connect {
            self.mode = SignerMode::Success;
            self.close().await;
        } else {
            self.mode = SignerMode::Connected;
        }
    }

    async fn approve(&mut self) {
        if self.mode != SignerMode::Signing {
            tracing::debug!(mode = ?self.mode, "Nothing to approve");
            return;
        }
        let Some(request) = self.pending.clone() else {
            return;
        };

        let current = self.active.current().await;
        if current.is_none() || current != self.gate_passed_for {
            tracing::info!(
                request_id = %request.id,
                "Active wallet changed; re-checking selection"
            );
            self.resume_flow().await;
            return;
        }

        match request.kind {
            RequestKind::Transaction => {
                match self.cosigner.cosign(&request.payload, request.submit).await {
                    Ok(outcome) => {
                        let response = SignTransactionResponse {
                            request_id: request.id.clone(),
                            success: true,
                            signed_envelope: Some(outcome.signed_envelope),
                            submitted_id: outcome.submitted_id,
                            error: None,
                        };
                        self.dispatcher
                            .transaction(&request.origin, response)
                            .await;
                        self.finish_request().await;
                    }
                    Err(e) => {
                        if let Error::Submission {
                            signed_envelope, ..
                        } = &e
                        {
                            self.unsubmitted_envelope = Some(signed_envelope.clone());
                        }
                        self.signing_failed(&request, e);
                    }
                }
            }
            RequestKind::AuthEntry => match self.auth_signer.sign(&request.payload).await {
                Ok(signed_entry) => {
                    let response = SignAuthEntryResponse {
                        request_id: request.id.clone(),
                        success: true,
                        signed_entry: Some(signed_entry),
                        error: None,
                    };
                    self.dispatcher.auth_entry(&request.origin, response).await;
                    self.finish_request().await;
                }
                Err(e) => self.signing_failed(&request, e),
            },
        }
    }

    fn signing_failed(&mut self, request: &PendingRequest, error: Error) {
        tracing::info!(request_id = %request.id, "Request kept for retry or reject");
        self.mode = SignerMode::Signing;
        self.surface(error, "signing");
    }

    /// Route a failure by its kind. Invalid input is dropped without a
    /// trace in the UI; everything else is shown, and fatal errors end in
    /// `error` mode.
    fn surface(&mut self, error: Error, context: &str) {
        match error.kind() {
            ErrorKind::Validation => {
                tracing::debug!(error = %error, context, "Dropping invalid input");
            }
            ErrorKind::Timeout => {
                tracing::warn!(error = %error, context, "Timed out");
                self.last_error = Some(format!("{} timed out; try again", context));
            }
            ErrorKind::Recoverable => {
                tracing::warn!(error = %error, context, "Action failed");
                self.last_error = Some(error.to_string());
            }
            ErrorKind::Fatal => {
                tracing::error!(error = %error, context, "Unrecoverable error");
                self.mode = SignerMode::Error;
                self.last_error = Some(error.to_string());
            }
        }
    }

    async fn finish_request(&mut self) {
        self.pending = None;
        self.last_error = None;
        self.unsubmitted_envelope = None;
        self.mode = SignerMode::Success;
        self.close().await;
    }

    async fn reject(&mut self) {
        let pending = self.pending.take();
        let had_connect = self.dispatcher.connect_armed();
        if pending.is_none() && !had_connect {
            tracing::debug!("Nothing to reject");
            return;
        }

        if let Some(request) = pending {
            tracing::info!(request_id = %request.id, "User rejected request");
            self.respond_failure(&request, USER_REJECTED).await;
        }
        if had_connect {
            if let Some(origin) = self.app.as_ref().map(|a| a.origin.clone()) {
                self.dispatcher
                    .connect(&origin, ConnectResponse::failed(USER_REJECTED))
                    .await;
            }
        }

        self.gate_flow = None;
        self.unsubmitted_envelope = None;
        self.close().await;
    }

    async fn respond_failure(&mut self, request: &PendingRequest, error: &str) {
        match request.kind {
            RequestKind::Transaction => {
                let response = SignTransactionResponse {
                    request_id: request.id.clone(),
                    success: false,
                    signed_envelope: None,
                    submitted_id: None,
                    error: Some(error.to_string()),
                };
                self.dispatcher
                    .transaction(&request.origin, response)
                    .await;
            }
            RequestKind::AuthEntry => {
                let response = SignAuthEntryResponse {
                    request_id: request.id.clone(),
                    success: false,
                    signed_entry: None,
                    error: Some(error.to_string()),
                };
                self.dispatcher.auth_entry(&request.origin, response).await;
            }
        }
    }

    async fn close(&mut self) {
        tokio::time::sleep(self.config.window.close_delay()).await;
        let origin = self.app.as_ref().map(|a| a.origin.clone());
        self.dispatcher.close_window(origin.as_deref()).await;
        self.closed = true;
        tracing::info!("Popup closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::gate::SelectionStatus;
    use crate::protocol::{OutgoingMessage, SignAuthEntryRequest};
    use crate::wallet::LocalWalletSession;
    use async_trait::async_trait;

    struct AlwaysSelected;

    #[async_trait]
    impl SelectionStatusProvider for AlwaysSelected {
        async fn selection(&self, _address: Address) -> Result<SelectionStatus> {
            Ok(SelectionStatus {
                faction: Some(Faction(1)),
                epoch: Some(1),
            })
        }

        async fn submit_selection(&self, _address: Address, _faction: Faction) -> Result<()> {
            Ok(())
        }
    }

    fn config(opener: Option<&str>) -> Config {
        let mut config = Config::default();
        config.window.close_delay_ms = 0;
        config.window.opener = opener.map(str::to_string);
        config
    }

    fn mediator(opener: Option<&str>) -> (Mediator, MemoryChannel) {
        let wallet = Arc::new(LocalWalletSession::in_memory("mediator unit network"));
        let channel = MemoryChannel::new();
        let mediator = Mediator::new(
            config(opener),
            Collaborators {
                wallet: wallet.clone(),
                status: Arc::new(AlwaysSelected),
                credentials: wallet,
                channel: Arc::new(channel.clone()),
            },
        );
        (mediator, channel)
    }

    fn auth_request(id: &str) -> MediatorEvent {
        MediatorEvent::Message(InboundEnvelope {
            source: WindowId::new("opener"),
            message: IncomingMessage::SignAuthEntry(SignAuthEntryRequest {
                request_id: id.to_string(),
                auth_entry: "AAAA".to_string(),
                description: "join".to_string(),
                origin: "https://game.example".to_string(),
                timestamp: 1,
            }),
        })
    }

    #[tokio::test]
    async fn missing_opener_is_fatal() {
        let (mut mediator, channel) = mediator(None);

        let err = mediator.start().await.unwrap_err();
        assert!(matches!(err, Error::NoOpener));
        assert_eq!(mediator.mode(), SignerMode::Error);
        assert!(channel.posted().is_empty());

        mediator.finish_initialization(Ok(None)).await;
        assert_eq!(mediator.mode(), SignerMode::Error);
    }

    #[tokio::test]
    async fn start_broadcasts_ready() {
        let (mut mediator, channel) = mediator(Some("opener"));
        mediator.start().await.unwrap();

        let posted = channel.posted();
        assert_eq!(posted.len(), 1);
        assert!(matches!(posted[0].message, OutgoingMessage::Ready(_)));
        assert_eq!(posted[0].target.as_str(), "*");
    }

    #[tokio::test]
    async fn requests_are_held_until_initialized() {
        let (mut mediator, channel) = mediator(Some("opener"));
        mediator.handle(auth_request("r1")).await;

        assert_eq!(mediator.mode(), SignerMode::Initializing);
        assert!(mediator.pending().is_none());

        mediator.finish_initialization(Ok(None)).await;
        assert_eq!(mediator.pending().map(|p| p.id.as_str()), Some("r1"));
        assert_eq!(mediator.mode(), SignerMode::Connecting);
        assert!(channel.responses().is_empty());
    }

    #[tokio::test]
    async fn second_request_is_refused_while_one_is_held() {
        let (mut mediator, channel) = mediator(Some("opener"));
        mediator.handle(auth_request("r1")).await;
        mediator.handle(auth_request("r1")).await;
        mediator.handle(auth_request("r2")).await;

        let responses = channel.responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].message.request_id(), Some("r2"));
        assert_eq!(responses[0].message.success(), Some(false));
    }

    #[tokio::test]
    async fn restore_failure_means_no_session() {
        let (mut mediator, _) = mediator(Some("opener"));
        mediator
            .finish_initialization(Err(Error::Wallet("storage unavailable".into())))
            .await;

        assert!(mediator.is_initialized());
        assert_eq!(mediator.mode(), SignerMode::Connecting);
        assert!(mediator.last_error().is_none());
    }

    #[tokio::test]
    async fn ui_error_without_request_returns_to_connected() {
        let (mut mediator, _) = mediator(Some("opener"));
        mediator
            .finish_initialization(Ok(Some(Address::repeat_byte(1))))
            .await;
        mediator
            .handle(MediatorEvent::Message(InboundEnvelope {
                source: WindowId::new("opener"),
                message: IncomingMessage::UiError(UiErrorNotice {
                    error: "game crashed".into(),
                    origin: "https://game.example".into(),
                    timestamp: 2,
                }),
            }))
            .await;

        assert_eq!(mediator.mode(), SignerMode::Connected);
        assert_eq!(mediator.last_error(), Some("game crashed"));
    }
}
