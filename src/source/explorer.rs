//! Blockscout-style explorer client
//!
//! Two jobs against `/addresses/{address}/token-transfers`:
//! - mint provenance: page through the origin wallet's transfers and collect
//!   every recipient of an outgoing transfer of the tracked token
//! - prior activity: for a newly seen address, check whether any of its
//!   token transfers is older than the RETURNING threshold
//!
//! Response parsing is split into pure functions so it can be tested
//! without the network.

use super::{SourceError, USER_AGENT};
use crate::tracker::{ActivityVerifier, MintProvenance, VerificationError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::time::Duration;

const MINT_PAGE_LIMIT: u32 = 50;
const VERIFY_PAGE_LIMIT: u32 = 10;
const MAX_MINT_PAGES: usize = 5_000;
const MIN_VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default, Deserialize)]
pub struct AddressRef {
    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenRef {
    #[serde(default, alias = "address_hash")]
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenTransfer {
    #[serde(default)]
    pub from: Option<AddressRef>,
    #[serde(default)]
    pub to: Option<AddressRef>,
    #[serde(default)]
    pub token: Option<TokenRef>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransferPage {
    #[serde(default)]
    pub items: Vec<TokenTransfer>,
    #[serde(default)]
    pub next_page_params: Option<Map<String, Value>>,
}

fn hash_of(address: &Option<AddressRef>) -> Option<String> {
    address
        .as_ref()
        .and_then(|a| a.hash.as_deref())
        .map(str::to_lowercase)
}

/// Recipients of outgoing transfers of `token_contract` sent by `origin`
pub fn mint_recipients<'a>(
    items: &'a [TokenTransfer],
    origin: &'a str,
    token_contract: &'a str,
) -> impl Iterator<Item = String> + 'a {
    items.iter().filter_map(move |transfer| {
        let token = transfer
            .token
            .as_ref()
            .and_then(|t| t.address.as_deref())
            .map(str::to_lowercase);

        if token.as_deref() != Some(token_contract) {
            return None;
        }
        if hash_of(&transfer.from).as_deref() != Some(origin) {
            return None;
        }
        hash_of(&transfer.to)
    })
}

/// Explorer timestamps are RFC 3339; fall back to the bare seconds prefix
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    let prefix = raw.get(..19)?;
    NaiveDateTime::parse_from_str(prefix, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Whether any transfer happened before `now - older_than`
///
/// Unparseable timestamps are ignored.
pub fn has_activity_before(
    items: &[TokenTransfer],
    now: DateTime<Utc>,
    older_than: chrono::Duration,
) -> bool {
    let cutoff = now - older_than;
    items
        .iter()
        .filter_map(|t| t.timestamp.as_deref().and_then(parse_timestamp))
        .any(|ts| ts < cutoff)
}

/// Flatten `next_page_params` into query pairs
pub fn page_query(params: &Map<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

pub struct ExplorerClient {
    client: reqwest::Client,
    verify_client: reqwest::Client,
    api: String,
    token_contract: String,
}

impl ExplorerClient {
    /// Scans use `timeout`; per-address verification uses a third of it (min 5s)
    pub fn new(api: &str, token_contract: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        let verify_client = reqwest::Client::builder()
            .timeout((timeout / 3).max(MIN_VERIFY_TIMEOUT))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            verify_client,
            api: api.trim_end_matches('/').to_string(),
            token_contract: token_contract.to_lowercase(),
        })
    }

    fn transfers_url(&self, address: &str) -> String {
        format!("{}/addresses/{}/token-transfers", self.api, address)
    }

    async fn fetch_page(
        &self,
        client: &reqwest::Client,
        address: &str,
        limit: u32,
        extra: &[(String, String)],
    ) -> Result<TransferPage, SourceError> {
        let limit = limit.to_string();
        let response = client
            .get(self.transfers_url(address))
            .query(&[
                ("token", self.token_contract.as_str()),
                ("type", "ERC-20"),
                ("limit", limit.as_str()),
            ])
            .query(extra)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().to_string()));
        }

        Ok(response.json::<TransferPage>().await?)
    }

    /// Page through the origin wallet's transfers and build the mint list
    ///
    /// A failure on the first page is an error. A failure later keeps the
    /// recipients collected so far.
    pub async fn fetch_mint_provenance(&self, origin: &str) -> Result<MintProvenance, SourceError> {
        let origin = origin.to_lowercase();
        let mut recipients: HashSet<String> = HashSet::new();
        let mut cursor: Vec<(String, String)> = Vec::new();

        log::info!("🔍 Scanning mint transfers from {}", origin);

        for page_number in 1..=MAX_MINT_PAGES {
            let page = match self.fetch_page(&self.client, &origin, MINT_PAGE_LIMIT, &cursor).await {
                Ok(page) => page,
                Err(e) if page_number == 1 => return Err(e),
                Err(e) => {
                    log::warn!(
                        "⚠️  Mint scan stopped at page {}: {} (keeping {} recipients)",
                        page_number,
                        e,
                        recipients.len()
                    );
                    break;
                }
            };

            recipients.extend(mint_recipients(&page.items, &origin, &self.token_contract));

            if page_number % 20 == 0 {
                log::info!("   ...page {}, {} recipients so far", page_number, recipients.len());
            }

            match page.next_page_params.as_ref().map(page_query) {
                Some(next) if !next.is_empty() && !page.items.is_empty() => cursor = next,
                _ => break,
            }

            if page_number == MAX_MINT_PAGES {
                log::warn!("⚠️  Mint scan hit the {} page limit", MAX_MINT_PAGES);
            }
        }

        log::info!("✅ Mint scan complete: {} recipients", recipients.len());
        Ok(MintProvenance::new(Some(&origin), recipients))
    }
}

#[async_trait]
impl ActivityVerifier for ExplorerClient {
    async fn has_prior_activity(
        &self,
        address: &str,
        older_than: chrono::Duration,
    ) -> Result<bool, VerificationError> {
        let page = self
            .fetch_page(&self.verify_client, address, VERIFY_PAGE_LIMIT, &[])
            .await
            .map_err(|e| match e {
                SourceError::Decode(msg) => VerificationError::Decode(msg),
                other => VerificationError::Request(other.to_string()),
            })?;

        Ok(has_activity_before(&page.items, Utc::now(), older_than))
    }
}
