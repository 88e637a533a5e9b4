//! Holder list source
//!
//! ## API Reference
//!
//! Endpoint: `https://v2api.bestinslot.xyz/brc2.0/holders?tick=<tick>`
//! Returns: `{"items": [{"evm_wallet", "btc_wallet", "total_balance", ...}]}`
//! sorted by balance, largest first.

use super::{SourceError, USER_AGENT};
use crate::tracker::RawHolderRecord;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Anything that can produce one run's raw holder list
#[async_trait]
pub trait HolderSource: Send + Sync {
    /// Fetch the full holder list, ordered by rank
    async fn fetch_holders(&self) -> Result<Vec<RawHolderRecord>, SourceError>;

    /// Source name for logging
    fn source_name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct HoldersResponse {
    #[serde(default)]
    items: Vec<RawHolderRecord>,
}

pub struct BestInSlotClient {
    client: reqwest::Client,
    url: String,
}

impl BestInSlotClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

/// Decode a holders response body
pub fn parse_holders_body(body: &str) -> Result<Vec<RawHolderRecord>, SourceError> {
    let response: HoldersResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Decode(e.to_string()))?;
    Ok(response.items)
}

#[async_trait]
impl HolderSource for BestInSlotClient {
    async fn fetch_holders(&self) -> Result<Vec<RawHolderRecord>, SourceError> {
        log::info!("🚀 Downloading holder list: {}", self.url);

        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().to_string()));
        }

        let body = response.text().await?;
        let records = parse_holders_body(&body)?;

        log::info!("✅ Received {} holder records", records.len());
        Ok(records)
    }

    fn source_name(&self) -> &'static str {
        "BestInSlot"
    }
}
