//! # Holder Tracker Core
//!
//! Snapshot-merge-and-classify engine. Takes one run's fetched holder list
//! plus the persisted store and produces:
//! - an updated store (one daily sample per address, gap-filled, bounded)
//! - a report with one row per currently ranked holder
//!
//! ## Invariants
//!
//! - History dates are strictly increasing with no gaps after a merge
//! - Re-running on the same calendar day overwrites the last sample
//! - History length never exceeds the retention window
//! - No per-address failure aborts the run; only store load/save errors do
//!
//! ## Module Organization
//!
//! - `types` - Sample, HolderSnapshot, Status, ReportRow
//! - `store` - History and TimeSeriesStore (document conversion, corrupt entries)
//! - `normalizer` - raw holder records to ranked snapshots
//! - `merge` - gap-fill, same-day update, retention
//! - `classify` - NEW / RETURNING / ESTABLISHED, MINTED, watchlist, verification policy
//! - `delta` - day-over-day change
//! - `report` - row assembly
//! - `engine` - run orchestration

pub mod types;
pub mod store;
pub mod normalizer;
pub mod merge;
pub mod classify;
pub mod delta;
pub mod report;
pub mod engine;

pub use types::{HolderSnapshot, ProvenanceFlags, ReportRow, Sample, Status, TemporalStatus};
pub use store::{History, SampleParseError, StoreDocument, TimeSeriesStore};
pub use normalizer::{normalize_holders, NormalizeError, RawHolderRecord};
pub use merge::{merge, MergeKind, MergeOutcome};
pub use classify::{
    classify, resolve_candidates, ActivityVerifier, MintProvenance, VerificationError,
    VerificationPolicy, Verdicts, Watchlist,
};
pub use delta::delta;
pub use report::{assemble, Report};
pub use engine::{EngineConfig, RunSummary, TrackerEngine};
