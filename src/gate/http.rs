//! HTTP selection status provider
//!
//! Talks to the game's status service:
//! - `GET  {base}/players/{address}/faction` -> `{"faction": 1, "epoch": 12}`
//! - `POST {base}/players/{address}/faction` with `{"faction": 1}`
//!
//! A 404 on the read side means the player has never selected.

use super::{Faction, SelectionStatus, SelectionStatusProvider};
use crate::{Error, Result};
use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;

pub struct HttpStatusProvider {
    client: Client,
    base_url: url::Url,
}

impl HttpStatusProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = url::Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid status URL {}: {}", base_url, e)))?;
        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    fn faction_url(&self, address: Address) -> url::Url {
        let path = format!(
            "{}/players/{}/faction",
            self.base_url.path().trim_end_matches('/'),
            address
        );
        let mut url = self.base_url.clone();
        url.set_path(&path);
        url
    }
}

#[async_trait]
impl SelectionStatusProvider for HttpStatusProvider {
    async fn selection(&self, address: Address) -> Result<SelectionStatus> {
        let response = self.client.get(self.faction_url(address)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(SelectionStatus::default());
        }
        if !response.status().is_success() {
            return Err(Error::Status(format!(
                "Status service returned {}",
                response.status()
            )));
        }

        response
            .json::<SelectionStatus>()
            .await
            .map_err(|e| Error::Status(format!("Failed to parse selection status: {}", e)))
    }

    async fn submit_selection(&self, address: Address, faction: Faction) -> Result<()> {
        let response = self
            .client
            .post(self.faction_url(address))
            .json(&json!({ "faction": faction }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status(format!(
                "Selection rejected ({}): {}",
                status, body
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn builds_player_url_under_base_path() {
        let provider = HttpStatusProvider::new("https://status.example/api/").unwrap();
        let url = provider.faction_url(address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266"));

        assert_eq!(
            url.as_str(),
            "https://status.example/api/players/0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266/faction"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(HttpStatusProvider::new("not a url").is_err());
    }

    #[test]
    fn status_body_without_faction_means_not_selected() {
        let status: SelectionStatus = serde_json::from_str(r#"{"faction": null}"#).unwrap();
        assert!(status.faction.is_none());
        assert!(status.epoch.is_none());
    }
}
