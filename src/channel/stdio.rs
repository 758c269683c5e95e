//! Line-oriented channel used by the CLI host
//!
//! Each post is written to stdout as one JSON object:
//! `{"targetOrigin": "...", "message": {...}}`.

use super::{TargetOrigin, WindowChannel};
use crate::protocol::OutgoingMessage;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Frame<'a> {
    target_origin: &'a str,
    message: &'a OutgoingMessage,
}

pub struct StdioChannel {
    stdout: Mutex<Stdout>,
}

impl StdioChannel {
    pub fn new() -> Self {
        Self {
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }

    async fn write_line(&self, line: String) -> Result<()> {
        let mut stdout = self.stdout.lock().await;
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        Ok(())
    }
}

impl Default for StdioChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WindowChannel for StdioChannel {
    async fn post(&self, message: &OutgoingMessage, target: &TargetOrigin) -> Result<()> {
        let line = serde_json::to_string(&Frame {
            target_origin: target.as_str(),
            message,
        })
        .map_err(|e| Error::Channel(e.to_string()))?;
        self.write_line(line).await
    }

    async fn close(&self) -> Result<()> {
        self.write_line(r#"{"closed":true}"#.to_string()).await
    }
}
