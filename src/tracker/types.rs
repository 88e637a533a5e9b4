//! Core data types for the holder tracker
//!
//! `Sample` is the only persisted type. Everything else is produced fresh on
//! each run and handed to the report layer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Calendar day format used on disk (`t` field)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One daily balance observation
///
/// Serialized as `{"t": "YYYY-MM-DD", "y": <balance>}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "t")]
    pub date: NaiveDate,
    #[serde(rename = "y")]
    pub balance: f64,
}

impl Sample {
    pub fn new(date: NaiveDate, balance: f64) -> Self {
        Self { date, balance }
    }
}

/// Provenance flags attached to a snapshot by the normalizer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceFlags {
    /// Received tokens directly from the origin wallet
    pub minted: bool,
}

/// Canonical holder record for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderSnapshot {
    /// Lower-cased address, the Store key
    pub key: String,
    pub balance: f64,
    /// 1-based position in the fetched holder list
    pub rank: usize,
    /// Paired address on the other chain (BTC side), when the source reports one
    pub secondary_address: Option<String>,
    pub provenance: Option<ProvenanceFlags>,
}

impl HolderSnapshot {
    pub fn is_minted(&self) -> bool {
        self.provenance.map(|p| p.minted).unwrap_or(false)
    }
}

/// Temporal classification of an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemporalStatus {
    #[serde(rename = "NEW")]
    New,
    #[serde(rename = "RETURNING")]
    Returning,
    #[serde(rename = "ESTABLISHED")]
    Established,
}

impl TemporalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemporalStatus::New => "NEW",
            TemporalStatus::Returning => "RETURNING",
            TemporalStatus::Established => "ESTABLISHED",
        }
    }
}

/// Full classification: temporal status plus the MINTED tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub temporal: TemporalStatus,
    pub minted: bool,
}

impl Status {
    pub fn new(temporal: TemporalStatus, minted: bool) -> Self {
        Self { temporal, minted }
    }

    pub fn is_new(&self) -> bool {
        self.temporal == TemporalStatus::New
    }
}

/// One presentation-ready row per currently ranked holder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub rank: usize,
    pub key: String,
    pub secondary_address: Option<String>,
    pub balance: f64,
    /// Omitted when no total supply is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_of_supply: Option<f64>,
    /// Difference between the two most recent samples
    pub change: f64,
    pub status: Status,
    /// Watchlist label, empty when the address is not watched
    pub note: String,
    pub chart_series: Vec<Sample>,
}
