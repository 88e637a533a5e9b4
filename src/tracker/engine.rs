//! Tracker engine - one snapshot run from raw records to persisted store
//!
//! ```text
//! StoreBackend::load ─► TimeSeriesStore (known keys captured)
//!         raw records ─► normalize_holders ─► Vec<HolderSnapshot>
//!                                   │
//!                    merge (per address, today)
//!                                   │
//!      NEW candidates ─► resolve_candidates (VerificationPolicy)
//!                                   │
//!                 classify + delta ─► assemble ─► Report
//!                                   │
//!                         StoreBackend::save (once)
//! ```
//!
//! The store is only written after the report has been assembled; a failure
//! before that leaves the persisted history untouched.

use super::classify::{self, ActivityVerifier, MintProvenance, VerificationPolicy, Watchlist};
use super::delta::delta;
use super::merge::{merge, MergeKind};
use super::normalizer::{normalize_holders, RawHolderRecord};
use super::report::{assemble, Report};
use super::store::TimeSeriesStore;
use super::types::{Status, TemporalStatus};
use crate::persistence::{StoreBackend, StoreError};
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use std::collections::HashMap;

/// Core tuning consumed by a run
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum samples kept per address
    pub retention_days: usize,
    /// Changes smaller than this are reported as 0
    pub change_epsilon: f64,
    pub total_supply: Option<f64>,
    pub watchlist: Watchlist,
    pub verification_policy: VerificationPolicy,
    /// Minimum age of prior activity for RETURNING
    pub returning_after: chrono::Duration,
    /// Offset in which the run's calendar day is taken
    pub utc_offset: FixedOffset,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention_days: 180,
            change_epsilon: 1.0,
            total_supply: None,
            watchlist: Watchlist::default(),
            verification_policy: VerificationPolicy::default(),
            returning_after: chrono::Duration::hours(24),
            utc_offset: FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix()),
        }
    }
}

/// Counters reported after a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub holders: usize,
    pub known_before: usize,
    pub created: usize,
    pub same_day_updates: usize,
    pub restarted: usize,
    pub gap_filled_days: usize,
    pub new: usize,
    pub returning: usize,
    pub minted: usize,
}

pub struct TrackerEngine {
    config: EngineConfig,
    now_fn: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl TrackerEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::new_with_clock(config, Box::new(Utc::now))
    }

    /// Engine with an injected clock, for deterministic runs
    pub fn new_with_clock(
        config: EngineConfig,
        now_fn: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    ) -> Self {
        Self { config, now_fn }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Calendar day of this run in the configured offset
    pub fn today(&self) -> NaiveDate {
        (self.now_fn)().with_timezone(&self.config.utc_offset).date_naive()
    }

    /// Merge, classify and assemble against an already loaded store
    ///
    /// Mutates `store` in place; persisting it is the caller's job.
    pub async fn process(
        &self,
        store: &mut TimeSeriesStore,
        records: &[RawHolderRecord],
        provenance: &MintProvenance,
        verifier: Option<&dyn ActivityVerifier>,
    ) -> (Report, RunSummary) {
        let today = self.today();
        let known_keys = store.known_keys();
        let snapshots = normalize_holders(records, provenance);

        let mut summary = RunSummary {
            holders: snapshots.len(),
            known_before: known_keys.len(),
            ..RunSummary::default()
        };

        for snapshot in &snapshots {
            let outcome = merge(store, today, snapshot, self.config.retention_days);
            summary.gap_filled_days += outcome.filled_days;
            match outcome.kind {
                MergeKind::Created => summary.created += 1,
                MergeKind::SameDayUpdate => summary.same_day_updates += 1,
                MergeKind::Restarted => summary.restarted += 1,
                MergeKind::Appended | MergeKind::Rewound => {}
            }
        }

        log::info!(
            "🧮 Merged {} holders for {} ({} created, {} same-day updates, {} gap-filled days)",
            snapshots.len(),
            today,
            summary.created,
            summary.same_day_updates,
            summary.gap_filled_days
        );

        // A first run has nothing to compare against: everyone is NEW
        let candidates: Vec<String> = if known_keys.is_empty() {
            log::info!("📭 Empty store; {} holders marked NEW without verification", snapshots.len());
            Vec::new()
        } else {
            snapshots
                .iter()
                .filter(|s| {
                    store
                        .get(&s.key)
                        .map_or(false, |h| classify::is_new_candidate(&s.key, h, &known_keys))
                })
                .map(|s| s.key.clone())
                .collect()
        };

        let verdicts = classify::resolve_candidates(
            &candidates,
            self.config.verification_policy,
            verifier,
            self.config.returning_after,
        )
        .await;

        let mut statuses: HashMap<String, Status> = HashMap::with_capacity(snapshots.len());
        let mut deltas: HashMap<String, f64> = HashMap::with_capacity(snapshots.len());

        for snapshot in &snapshots {
            let Some(history) = store.get(&snapshot.key) else {
                continue;
            };
            let status = classify::classify(snapshot, history, &known_keys, &verdicts);
            match status.temporal {
                TemporalStatus::New => summary.new += 1,
                TemporalStatus::Returning => summary.returning += 1,
                TemporalStatus::Established => {}
            }
            if status.minted {
                summary.minted += 1;
            }
            statuses.insert(snapshot.key.clone(), status);
            deltas.insert(snapshot.key.clone(), delta(history, self.config.change_epsilon));
        }

        let rows = assemble(
            &snapshots,
            store,
            &statuses,
            &deltas,
            self.config.total_supply,
            &self.config.watchlist,
        );

        (Report { today, rows }, summary)
    }

    /// Full run: load, process, persist
    ///
    /// Load and save failures are fatal and leave no report.
    pub async fn run(
        &self,
        backend: &dyn StoreBackend,
        records: &[RawHolderRecord],
        provenance: &MintProvenance,
        verifier: Option<&dyn ActivityVerifier>,
    ) -> Result<(Report, RunSummary), StoreError> {
        let document = backend.load()?;
        let mut store = TimeSeriesStore::from_document(document);
        log::info!(
            "📂 Loaded {} address histories from {} store",
            store.len(),
            backend.backend_type()
        );

        let (report, summary) = self.process(&mut store, records, provenance, verifier).await;

        let document = store.to_document()?;
        backend.save(&document)?;
        log::info!("💾 Persisted {} address histories", document.len());

        Ok((report, summary))
    }
}
