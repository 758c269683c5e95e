//! Wallet popup mediator
//!
//! Runs inside a popup opened by a game page and mediates between that page
//! and a smart wallet:
//! - Restores or creates a wallet session
//! - Makes sure the player picked a faction before anything is answered
//! - Co-signs multi-party transactions and standalone authorization entries
//! - Recovers credentials orphaned by an interrupted registration
//!
//! # Security Model
//!
//! - Only the window that opened the popup is listened to
//! - Every response is scoped to the origin that asked for it
//! - Only entries bound to the active wallet are ever signed
//! - Key material stays inside the wallet module
//! - Every response posted to the opener is written to an audit trail

pub mod channel;
pub mod config;
pub mod gate;
pub mod mediator;
pub mod protocol;
pub mod recovery;
pub mod signing;
pub mod transaction;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use config::{Config, EnvOverrides, UnconfirmedSelectionPolicy};
pub use error::{Error, ErrorKind, Result};
pub use mediator::{Collaborators, Mediator, MediatorEvent, SignerMode, UserAction};
