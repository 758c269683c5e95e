#![allow(dead_code)]

use alloy::primitives::Address;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wallet_popup_mediator::channel::{MemoryChannel, PostedMessage, TargetOrigin};
use wallet_popup_mediator::gate::{Faction, SelectionStatus, SelectionStatusProvider};
use wallet_popup_mediator::protocol::{
    ConnectRequest, InboundEnvelope, IncomingMessage, OutgoingMessage, SignAuthEntryRequest,
    SignTransactionRequest, WindowId,
};
use wallet_popup_mediator::transaction::{
    AddressCredentials, AuthorizationEntry, Credentials, InvokeContractOp, Invocation, Memo,
    Operation, OperationBody, Preconditions, Transaction, TransactionEnvelope,
};
use wallet_popup_mediator::wallet::LocalWalletSession;
use wallet_popup_mediator::{Collaborators, Config, Mediator, MediatorEvent, Result};

pub const OPENER: &str = "opener-window";
pub const ORIGIN: &str = "https://game.example";
pub const PASSPHRASE: &str = "integration test network";

/// In-memory selection service
#[derive(Default)]
pub struct FakeStatus {
    selections: Mutex<HashMap<Address, Faction>>,
    /// Submitted selections never show up in reads
    pub hide_submissions: AtomicBool,
    pub fail_submit: AtomicBool,
    /// Submissions never return
    pub hang_submit: AtomicBool,
    /// Reads never return
    pub hang: AtomicBool,
    pub reads: AtomicUsize,
}

impl FakeStatus {
    pub fn with_selection(address: Address, faction: Faction) -> Self {
        let status = Self::default();
        status.select(address, faction);
        status
    }

    pub fn select(&self, address: Address, faction: Faction) {
        self.selections.lock().unwrap().insert(address, faction);
    }
}

#[async_trait]
impl SelectionStatusProvider for FakeStatus {
    async fn selection(&self, address: Address) -> Result<SelectionStatus> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(SelectionStatus {
            faction: self.selections.lock().unwrap().get(&address).copied(),
            epoch: Some(1),
        })
    }

    async fn submit_selection(&self, address: Address, faction: Faction) -> Result<()> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(wallet_popup_mediator::Error::Status(
                "service unavailable".into(),
            ));
        }
        if self.hang_submit.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if !self.hide_submissions.load(Ordering::SeqCst) {
            self.select(address, faction);
        }
        Ok(())
    }
}

pub struct Harness {
    pub mediator: Mediator,
    pub channel: MemoryChannel,
    pub wallet: Arc<LocalWalletSession>,
    pub status: Arc<FakeStatus>,
}

/// Short timings so bounded waits finish quickly
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.window.opener = Some(OPENER.to_string());
    config.window.close_delay_ms = 0;
    config.gate.status_timeout_ms = 100;
    config.gate.poll_interval_ms = 5;
    config.gate.confirm_window_ms = 60;
    config.signing.network_passphrase = PASSPHRASE.to_string();
    config.audit_log_path = None;
    config
}

pub fn harness(status: FakeStatus) -> Harness {
    harness_with(test_config(), Arc::new(LocalWalletSession::in_memory(PASSPHRASE)), status)
}

pub fn harness_with(
    config: Config,
    wallet: Arc<LocalWalletSession>,
    status: FakeStatus,
) -> Harness {
    let channel = MemoryChannel::new();
    let status = Arc::new(status);
    let mediator = Mediator::new(
        config,
        Collaborators {
            wallet: wallet.clone(),
            status: status.clone(),
            credentials: wallet.clone(),
            channel: Arc::new(channel.clone()),
        },
    );
    Harness {
        mediator,
        channel,
        wallet,
        status,
    }
}

pub fn from_window(source: &str, message: IncomingMessage) -> MediatorEvent {
    MediatorEvent::Message(InboundEnvelope {
        source: WindowId::new(source),
        message,
    })
}

pub fn connect_request(app_name: &str) -> MediatorEvent {
    from_window(
        OPENER,
        IncomingMessage::Connect(ConnectRequest {
            app_name: app_name.to_string(),
            app_icon: None,
            origin: ORIGIN.to_string(),
            timestamp: 1,
        }),
    )
}

pub fn sign_transaction(
    request_id: &str,
    envelope: &TransactionEnvelope,
    submit: bool,
) -> MediatorEvent {
    from_window(
        OPENER,
        IncomingMessage::SignTransaction(SignTransactionRequest {
            request_id: request_id.to_string(),
            transaction_envelope: envelope.to_base64().unwrap(),
            description: "Start game".to_string(),
            submit: Some(submit),
            origin: ORIGIN.to_string(),
            timestamp: 2,
        }),
    )
}

pub fn sign_auth_entry(request_id: &str, entry: &AuthorizationEntry) -> MediatorEvent {
    from_window(
        OPENER,
        IncomingMessage::SignAuthEntry(SignAuthEntryRequest {
            request_id: request_id.to_string(),
            auth_entry: entry.to_base64().unwrap(),
            description: "Join lobby".to_string(),
            origin: ORIGIN.to_string(),
            timestamp: 3,
        }),
    )
}

pub fn address_entry(address: Address, nonce: i64) -> AuthorizationEntry {
    let credentials = Credentials::Address(AddressCredentials {
        address,
        nonce,
        signature_expiration_ledger: 0,
        signature: None,
    });
    let invocation = Invocation {
        contract: Address::repeat_byte(0xc0),
        function: "start_game".to_string(),
        args: vec![serde_json::json!({"session": 7})],
        sub_invocations: vec![],
    };
    AuthorizationEntry::new(credentials, &invocation).unwrap()
}

pub fn two_party_envelope(x: Address, y: Address) -> TransactionEnvelope {
    TransactionEnvelope {
        tx: Transaction {
            source_account: Address::repeat_byte(0xf0),
            fee: 250_000,
            seq_num: 77,
            cond: Preconditions::Time {
                min_time: 0,
                max_time: 2_000_000_000,
            },
            memo: Memo::Text("round 3".to_string()),
            operations: vec![Operation {
                source_account: None,
                body: OperationBody::InvokeContract(InvokeContractOp {
                    contract: Address::repeat_byte(0xc0),
                    function: "start_game".to_string(),
                    args: vec![],
                    auth: vec![address_entry(x, 1), address_entry(y, 2)],
                }),
            }],
            ext: None,
        },
        signatures: vec![],
    }
}

pub fn exact_origin() -> TargetOrigin {
    TargetOrigin::Exact(ORIGIN.to_string())
}

/// Terminal responses posted for `request_id`
pub fn responses_for(posted: &[PostedMessage], request_id: &str) -> usize {
    posted
        .iter()
        .filter(|p| p.message.request_id() == Some(request_id))
        .count()
}

pub fn connect_responses(posted: &[PostedMessage]) -> Vec<&PostedMessage> {
    posted
        .iter()
        .filter(|p| matches!(p.message, OutgoingMessage::Connect(_)))
        .collect()
}

pub fn short(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
