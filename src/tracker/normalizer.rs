//! Snapshot normalization from raw holder records to `HolderSnapshot`

use super::classify::MintProvenance;
use super::types::HolderSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Holder record as reported by the holder-list source
///
/// Balances arrive either as JSON numbers or as numeric strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHolderRecord {
    #[serde(default)]
    pub evm_wallet: Option<String>,
    #[serde(default)]
    pub btc_wallet: Option<String>,
    #[serde(default)]
    pub total_balance: Option<Value>,
    #[serde(default)]
    pub evm_withdrawable_balance: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeError {
    MissingKey,
    MalformedBalance(String),
    NegativeBalance(f64),
}

impl std::fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizeError::MissingKey => write!(f, "record has no address"),
            NormalizeError::MalformedBalance(raw) => write!(f, "malformed balance: {}", raw),
            NormalizeError::NegativeBalance(b) => write!(f, "negative balance: {}", b),
        }
    }
}

impl std::error::Error for NormalizeError {}

/// Empty strings, nulls and zero count as absent
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::Bool(b) => *b,
        _ => true,
    }
}

fn parse_balance(value: &Value) -> Result<f64, NormalizeError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(b) if !b.is_finite() => Err(NormalizeError::MalformedBalance(value.to_string())),
        Some(b) if b < 0.0 => Err(NormalizeError::NegativeBalance(b)),
        Some(b) => Ok(b),
        None => Err(NormalizeError::MalformedBalance(value.to_string())),
    }
}

impl RawHolderRecord {
    /// Lower-cased trimmed primary address
    pub fn key(&self) -> Result<String, NormalizeError> {
        self.evm_wallet
            .as_deref()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .ok_or(NormalizeError::MissingKey)
    }

    /// First present of total / withdrawable balance, else zero
    pub fn balance(&self) -> Result<f64, NormalizeError> {
        let candidate = [&self.total_balance, &self.evm_withdrawable_balance]
            .into_iter()
            .flatten()
            .find(|v| is_present(v));

        match candidate {
            Some(value) => parse_balance(value),
            None => Ok(0.0),
        }
    }

    pub fn secondary_address(&self) -> Option<String> {
        self.btc_wallet
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty() && *w != "-")
            .map(str::to_string)
    }
}

/// Convert raw records into ranked snapshots
///
/// Invalid records are skipped with one warning each. Ranks are assigned
/// 1..n over accepted records in input order; a repeated address keeps its
/// first (highest-ranked) record.
pub fn normalize_holders(records: &[RawHolderRecord], provenance: &MintProvenance) -> Vec<HolderSnapshot> {
    let mut snapshots = Vec::with_capacity(records.len());
    let mut seen = HashSet::new();

    for (index, record) in records.iter().enumerate() {
        let parsed = record.key().and_then(|key| Ok((key, record.balance()?)));

        let (key, balance) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("⚠️  Skipping holder record #{}: {}", index + 1, e);
                continue;
            }
        };

        if !seen.insert(key.clone()) {
            log::warn!("⚠️  Duplicate holder {} at record #{}; keeping first", key, index + 1);
            continue;
        }

        snapshots.push(HolderSnapshot {
            provenance: Some(provenance.flags_for(&key)),
            secondary_address: record.secondary_address(),
            rank: snapshots.len() + 1,
            key,
            balance,
        });
    }

    log::debug!("Normalized {} of {} holder records", snapshots.len(), records.len());
    snapshots
}
