//! Time series store: address -> daily balance history
//!
//! The on-disk form is a `StoreDocument` (address -> raw JSON value). Each
//! value is parsed into a typed `History` on load. Entries that fail to parse
//! are kept verbatim in a side table so a save writes them back untouched,
//! unless the address is merged this run, in which case the corrupted
//! continuity is discarded and the history restarts from today.

use super::types::{Sample, DATE_FORMAT};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Persisted shape handed to and received from a `StoreBackend`
pub type StoreDocument = BTreeMap<String, Value>;

/// A persisted sample that could not be parsed
#[derive(Debug, Clone, PartialEq)]
pub enum SampleParseError {
    NotASequence,
    NotAnObject { index: usize },
    MalformedDate { index: usize, raw: String },
    MalformedBalance { index: usize, raw: String },
    OutOfOrder { index: usize },
}

impl std::fmt::Display for SampleParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleParseError::NotASequence => write!(f, "history is not a sequence"),
            SampleParseError::NotAnObject { index } => {
                write!(f, "sample {} is not an object", index)
            }
            SampleParseError::MalformedDate { index, raw } => {
                write!(f, "sample {} has malformed date: {}", index, raw)
            }
            SampleParseError::MalformedBalance { index, raw } => {
                write!(f, "sample {} has malformed balance: {}", index, raw)
            }
            SampleParseError::OutOfOrder { index } => {
                write!(f, "sample {} is not after the previous sample", index)
            }
        }
    }
}

impl std::error::Error for SampleParseError {}

/// Ordered daily samples for one address
///
/// Dates are strictly increasing. Only the merge engine mutates a history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    samples: Vec<Sample>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from samples, rejecting any out-of-order or duplicate date
    pub fn from_samples(samples: Vec<Sample>) -> Result<Self, SampleParseError> {
        for (index, pair) in samples.windows(2).enumerate() {
            if pair[1].date <= pair[0].date {
                return Err(SampleParseError::OutOfOrder { index: index + 1 });
            }
        }
        Ok(Self { samples })
    }

    /// Parse a raw persisted value (`[{"t": ..., "y": ...}, ...]`)
    pub fn parse(value: &Value) -> Result<Self, SampleParseError> {
        let items = value.as_array().ok_or(SampleParseError::NotASequence)?;
        let mut samples = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            let obj = item
                .as_object()
                .ok_or(SampleParseError::NotAnObject { index })?;

            let raw_date = obj.get("t").cloned().unwrap_or(Value::Null);
            let date = raw_date
                .as_str()
                .and_then(parse_day)
                .ok_or_else(|| SampleParseError::MalformedDate {
                    index,
                    raw: raw_date.to_string(),
                })?;

            let raw_balance = obj.get("y").cloned().unwrap_or(Value::Null);
            let balance = raw_balance
                .as_f64()
                .filter(|b| b.is_finite() && *b >= 0.0)
                .ok_or_else(|| SampleParseError::MalformedBalance {
                    index,
                    raw: raw_balance.to_string(),
                })?;

            samples.push(Sample::new(date, balance));
        }

        Self::from_samples(samples)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// The two most recent samples, oldest first
    pub fn last_two(&self) -> Option<(&Sample, &Sample)> {
        match self.samples.as_slice() {
            [.., prev, last] => Some((prev, last)),
            _ => None,
        }
    }

    pub(crate) fn samples_mut(&mut self) -> &mut Vec<Sample> {
        &mut self.samples
    }

    /// Keep the most recent `retention` samples
    pub(crate) fn truncate_front(&mut self, retention: usize) {
        if self.samples.len() > retention {
            let excess = self.samples.len() - retention;
            self.samples.drain(..excess);
        }
    }
}

/// Parse a `YYYY-MM-DD` day, rejecting anything that would not re-serialize identically
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .filter(|date| date.format(DATE_FORMAT).to_string() == raw)
}

/// Address-keyed store of histories, loaded once and persisted once per run
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesStore {
    histories: BTreeMap<String, History>,
    /// Entries that failed to parse, kept verbatim for round-tripping
    corrupt: BTreeMap<String, Value>,
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the typed store from a persisted document
    ///
    /// Never fails: unparseable entries are logged once and set aside.
    /// Keys are trimmed and lower-cased. When two persisted keys collapse to
    /// the same address, a parseable history beats a corrupted one and the
    /// longer history wins; on a tie the first in document order is kept.
    pub fn from_document(document: StoreDocument) -> Self {
        let mut store = Self::new();

        for (raw_key, value) in document {
            let key = raw_key.trim().to_lowercase();

            match History::parse(&value) {
                Ok(history) => {
                    if let Some(existing) = store.histories.get(&key) {
                        let keep_existing = existing.len() >= history.len();
                        log::warn!(
                            "⚠️  Duplicate history for {} (persisted as {}); keeping the {} one",
                            key,
                            raw_key,
                            if keep_existing { "earlier" } else { "longer" }
                        );
                        if keep_existing {
                            continue;
                        }
                    } else if store.corrupt.remove(&key).is_some() {
                        log::warn!("⚠️  Duplicate history for {}; replacing corrupted entry with {}", key, raw_key);
                    }
                    store.histories.insert(key, history);
                }
                Err(e) if store.histories.contains_key(&key) || store.corrupt.contains_key(&key) => {
                    log::warn!("⚠️  Duplicate history for {} (persisted as {}) is corrupted: {}; dropped", key, raw_key, e);
                }
                Err(e) => {
                    log::warn!("⚠️  Corrupted history for {}: {} (kept as-is until next merge)", key, e);
                    store.corrupt.insert(key, value);
                }
            }
        }

        store
    }

    /// Persisted shape of the store, corrupted entries included verbatim
    pub fn to_document(&self) -> Result<StoreDocument, serde_json::Error> {
        let mut document = StoreDocument::new();

        for (key, value) in &self.corrupt {
            document.insert(key.clone(), value.clone());
        }
        for (key, history) in &self.histories {
            document.insert(key.clone(), serde_json::to_value(history)?);
        }

        Ok(document)
    }

    /// Every address present at load time, parseable or not
    pub fn known_keys(&self) -> HashSet<String> {
        self.histories
            .keys()
            .chain(self.corrupt.keys())
            .cloned()
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&History> {
        self.histories.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.histories.contains_key(key) || self.corrupt.contains_key(key)
    }

    pub fn is_corrupt(&self, key: &str) -> bool {
        self.corrupt.contains_key(key)
    }

    /// Number of addresses tracked
    pub fn len(&self) -> usize {
        self.histories.len() + self.corrupt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn histories(&self) -> impl Iterator<Item = (&String, &History)> {
        self.histories.iter()
    }

    /// History slot for a merge, plus the corrupted raw value it replaces (if any)
    pub(crate) fn history_for_merge(&mut self, key: &str) -> (&mut History, Option<Value>) {
        let discarded = self.corrupt.remove(key);
        let history = self.histories.entry(key.to_string()).or_default();
        (history, discarded)
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, key: &str, history: History) {
        self.histories.insert(key.to_string(), history);
    }
}
