//! Popup mediator CLI
//!
//! `run` reads inbound window messages and user actions as JSON lines on
//! stdin and writes every post to the opener as a JSON line on stdout.
//! Logs go to stderr.

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wallet_popup_mediator::channel::{AuditLog, StdioChannel};
use wallet_popup_mediator::gate::HttpStatusProvider;
use wallet_popup_mediator::protocol::{protocol_schema, InboundEnvelope};
use wallet_popup_mediator::recovery::PendingCredentialRecovery;
use wallet_popup_mediator::wallet::{ActiveWallet, LocalWalletSession};
use wallet_popup_mediator::{
    Collaborators, Config, EnvOverrides, Error, Mediator, MediatorEvent, Result, UserAction,
};

#[derive(Parser)]
#[command(name = "popup-mediator")]
#[command(about = "Wallet popup mediator for connect and signing requests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Mediate between an opener window (stdin/stdout) and the wallet
    Run {
        /// Window id of the opener; overrides config and MEDIATOR_OPENER
        #[arg(long)]
        opener: Option<String>,
    },

    /// Show current configuration
    Config,

    /// Print the JSON schema of the window protocol
    Schema,

    /// Manage credentials left behind by interrupted registrations
    Credentials {
        #[command(subcommand)]
        command: CredentialCommands,
    },
}

#[derive(Subcommand)]
enum CredentialCommands {
    /// List pending credentials, oldest first
    List,

    /// Deploy a wallet for a pending credential
    Deploy { credential_id: String },

    /// Permanently delete a pending credential
    Delete {
        credential_id: String,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

/// One line of stdin
#[derive(Deserialize)]
#[serde(untagged)]
enum InputLine {
    Message(InboundEnvelope),
    Action(UserAction),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdout carries the window protocol
    tracing_subscriber::registry()
        .with(filter)
        .with(
            cli.json_logs
                .then(|| fmt::layer().json().with_writer(std::io::stderr)),
        )
        .with((!cli.json_logs).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    }
    .with_env(&EnvOverrides::from_env());

    match cli.command {
        Commands::Run { opener } => run_mediator(config, opener).await?,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&protocol_schema())?);
        }
        Commands::Credentials { command } => run_credentials(config, command).await?,
    }

    Ok(())
}

async fn run_mediator(mut config: Config, opener: Option<String>) -> Result<()> {
    if opener.is_some() {
        config.window.opener = opener;
    }
    let status_url = config
        .status_url
        .clone()
        .ok_or_else(|| Error::Config("status_url is not set".to_string()))?;

    let wallet = Arc::new(
        LocalWalletSession::open(
            &config.wallet_state_file,
            config.signing.network_passphrase.clone(),
        )
        .await?,
    );
    let status = Arc::new(HttpStatusProvider::new(&status_url)?);

    tracing::info!(
        status_url = %status_url,
        wallet_state = %config.wallet_state_file,
        opener = ?config.window.opener,
        "Starting popup mediator"
    );

    let audit_path = config.audit_log_path.clone();
    let mut mediator = Mediator::new(
        config,
        Collaborators {
            wallet: wallet.clone(),
            status,
            credentials: wallet,
            channel: Arc::new(StdioChannel::new()),
        },
    );
    if let Some(path) = audit_path {
        mediator = mediator.with_audit(AuditLog::new(path));
    }

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(forward_stdin(tx));

    mediator.run(rx).await
}

async fn forward_stdin(tx: mpsc::Sender<MediatorEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let event = match serde_json::from_str::<InputLine>(&line) {
            Ok(InputLine::Message(envelope)) => MediatorEvent::Message(envelope),
            Ok(InputLine::Action(action)) => MediatorEvent::Action(action),
            Err(e) => {
                // malformed input is dropped, never answered
                tracing::debug!(error = %e, "Ignoring unparseable input line");
                continue;
            }
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }
}

async fn run_credentials(config: Config, command: CredentialCommands) -> Result<()> {
    let wallet = Arc::new(
        LocalWalletSession::open(&config.wallet_state_file, config.signing.network_passphrase)
            .await?,
    );
    let recovery = PendingCredentialRecovery::new(wallet, ActiveWallet::new());

    match command {
        CredentialCommands::List => {
            let pending = recovery.list().await?;
            if pending.is_empty() {
                println!("No pending credentials");
            }
            for credential in pending {
                println!(
                    "{}  created {}",
                    credential.credential_id,
                    credential.created_at.to_rfc3339()
                );
            }
        }
        CredentialCommands::Deploy { credential_id } => {
            let address = recovery.deploy(&credential_id).await?;
            println!("Deployed {} -> {}", credential_id, address);
        }
        CredentialCommands::Delete { credential_id, yes } => {
            recovery.delete(&credential_id, yes).await?;
            println!("Deleted {}", credential_id);
        }
    }

    Ok(())
}
