//! Holder classification: NEW / RETURNING / ESTABLISHED, MINTED tag, watchlist notes
//!
//! Temporal status has two evidence sources:
//! - the Store (cheap): an address absent at load time with a single-sample
//!   history after merge is a NEW candidate
//! - an `ActivityVerifier` (expensive, rate-limited): a candidate with on-chain
//!   activity older than the configured threshold is RETURNING instead
//!
//! Whether the expensive check runs is decided by `VerificationPolicy`.

use super::store::History;
use super::types::{HolderSnapshot, ProvenanceFlags, Status, TemporalStatus};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// When to run the expensive prior-activity check on NEW candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationPolicy {
    Always,
    Never,
    /// Verify unless there are more than `threshold` candidates, then mark all NEW
    BulkSkip(usize),
}

impl VerificationPolicy {
    /// Whether a batch of `candidate_count` candidates gets verified
    pub fn should_verify(&self, candidate_count: usize) -> bool {
        match self {
            VerificationPolicy::Always => true,
            VerificationPolicy::Never => false,
            VerificationPolicy::BulkSkip(threshold) => candidate_count <= *threshold,
        }
    }
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        VerificationPolicy::BulkSkip(50)
    }
}

#[derive(Debug)]
pub enum VerificationError {
    Request(String),
    Decode(String),
}

impl std::fmt::Display for VerificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationError::Request(e) => write!(f, "Verification request failed: {}", e),
            VerificationError::Decode(e) => write!(f, "Verification response invalid: {}", e),
        }
    }
}

impl std::error::Error for VerificationError {}

/// External check for activity that predates the Store
#[async_trait]
pub trait ActivityVerifier: Send + Sync {
    /// Returns true if `address` has token activity older than `older_than`
    async fn has_prior_activity(
        &self,
        address: &str,
        older_than: chrono::Duration,
    ) -> Result<bool, VerificationError>;
}

/// Addresses that received tokens directly from the origin wallet
#[derive(Debug, Clone, Default)]
pub struct MintProvenance {
    origin: Option<String>,
    recipients: HashSet<String>,
}

impl MintProvenance {
    pub fn new(origin: Option<&str>, recipients: impl IntoIterator<Item = String>) -> Self {
        Self {
            origin: origin.map(|o| o.to_lowercase()),
            recipients: recipients.into_iter().map(|r| r.to_lowercase()).collect(),
        }
    }

    /// The origin wallet itself is never tagged
    pub fn is_minted(&self, key: &str) -> bool {
        self.recipients.contains(key) && self.origin.as_deref() != Some(key)
    }

    pub fn flags_for(&self, key: &str) -> ProvenanceFlags {
        ProvenanceFlags {
            minted: self.is_minted(key),
        }
    }

    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}

/// Static address -> label mapping rendered into the row note
#[derive(Debug, Clone, Default)]
pub struct Watchlist {
    labels: HashMap<String, String>,
}

impl Watchlist {
    pub fn new(labels: HashMap<String, String>) -> Self {
        Self {
            labels: labels
                .into_iter()
                .map(|(k, v)| (k.trim().to_lowercase(), v))
                .collect(),
        }
    }

    pub fn label(&self, key: &str) -> &str {
        self.labels.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Absent at load time and first observed in this run
pub fn is_new_candidate(key: &str, history: &History, known_keys: &HashSet<String>) -> bool {
    !known_keys.contains(key) && history.len() == 1
}

/// Verified temporal status per NEW candidate
pub type Verdicts = HashMap<String, TemporalStatus>;

/// Classify one address after its merge
///
/// `known_keys` must be captured before any merge of the run. Candidates
/// missing from `verdicts` default to NEW.
pub fn classify(
    snapshot: &HolderSnapshot,
    history: &History,
    known_keys: &HashSet<String>,
    verdicts: &Verdicts,
) -> Status {
    let temporal = if is_new_candidate(&snapshot.key, history, known_keys) {
        verdicts
            .get(&snapshot.key)
            .copied()
            .unwrap_or(TemporalStatus::New)
    } else {
        TemporalStatus::Established
    };

    Status::new(temporal, snapshot.is_minted())
}

/// Upgrade NEW candidates to RETURNING where the verifier finds older activity
///
/// Failures default to NEW. Runs sequentially; the bulk-skip policy bounds
/// run time instead of fanning out requests.
pub async fn resolve_candidates(
    candidates: &[String],
    policy: VerificationPolicy,
    verifier: Option<&dyn ActivityVerifier>,
    older_than: chrono::Duration,
) -> Verdicts {
    let mut verdicts: Verdicts = candidates
        .iter()
        .map(|key| (key.clone(), TemporalStatus::New))
        .collect();

    if candidates.is_empty() {
        return verdicts;
    }

    let verifier = match verifier {
        Some(v) if policy.should_verify(candidates.len()) => v,
        Some(_) => {
            log::info!(
                "⏭️  {} new addresses exceed verification policy {:?}; marking all NEW",
                candidates.len(),
                policy
            );
            return verdicts;
        }
        None => {
            log::debug!("No activity verifier configured; {} candidates stay NEW", candidates.len());
            return verdicts;
        }
    };

    log::info!("🕵️  Verifying {} newly seen addresses...", candidates.len());

    let mut returning = 0;
    for (i, key) in candidates.iter().enumerate() {
        log::debug!("   verifying ({}/{}) {}", i + 1, candidates.len(), key);
        match verifier.has_prior_activity(key, older_than).await {
            Ok(true) => {
                verdicts.insert(key.clone(), TemporalStatus::Returning);
                returning += 1;
            }
            Ok(false) => {}
            Err(e) => {
                log::warn!("⚠️  Verification failed for {}: {} (defaulting to NEW)", key, e);
            }
        }
    }

    log::info!(
        "✅ Verification complete: {} NEW, {} RETURNING",
        candidates.len() - returning,
        returning
    );

    verdicts
}
