//! Audit trail of terminal responses
//!
//! Every response that leaves the popup is appended to a JSONL file so a
//! request can be traced after the window is gone.

use crate::protocol::OutgoingMessage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Entry in the audit log
#[derive(Debug, Serialize)]
struct AuditEntry<'a> {
    timestamp: DateTime<Utc>,
    message: &'static str,
    request_id: Option<&'a str>,
    success: Option<bool>,
    target_origin: &'a str,
    delivered: bool,
}

/// Writer for audit log entries
struct AuditLogWriter {
    path: PathBuf,
}

impl AuditLogWriter {
    fn write(&self, entry: &AuditEntry<'_>) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

/// Append-only JSONL log of outbound responses
#[derive(Clone)]
pub struct AuditLog {
    writer: Arc<Mutex<AuditLogWriter>>,
}

impl AuditLog {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(AuditLogWriter {
                path: log_path.into(),
            })),
        }
    }

    /// Record a dispatched message; failures are logged, never raised
    pub async fn record(&self, message: &OutgoingMessage, target_origin: &str, delivered: bool) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            message: message.kind(),
            request_id: message.request_id(),
            success: message.success(),
            target_origin,
            delivered,
        };

        let writer = self.writer.lock().await;
        if let Err(e) = writer.write(&entry) {
            tracing::warn!(error = %e, "Failed to write audit log entry");
        }
    }
}
