//! Merge engine: folds one day's snapshot into the store
//!
//! Per address:
//! 1. Missing key -> empty history
//! 2. Missing days, inside the history or since the last sample, are gap-filled
//!    with the previous balance
//! 3. Same day -> overwrite the last sample, otherwise append
//! 4. Truncate to the retention window (oldest first)

use super::store::TimeSeriesStore;
use super::types::{HolderSnapshot, Sample};
use chrono::{Days, NaiveDate};

/// What the merge did to an address's history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    /// First observation of the key
    Created,
    /// New day appended (after any gap-fill)
    Appended,
    /// Re-run on the same calendar day, last sample overwritten
    SameDayUpdate,
    /// Persisted history was unparseable and has been restarted from today
    Restarted,
    /// Samples dated after today were dropped before merging
    Rewound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub kind: MergeKind,
    /// Synthesized carry-forward samples
    pub filled_days: usize,
    /// Samples dropped by the retention window
    pub truncated: usize,
}

/// Merge `snapshot` into `store` for calendar day `today`
///
/// Keeps at most `retention` samples (a retention of 0 is treated as 1).
pub fn merge(
    store: &mut TimeSeriesStore,
    today: NaiveDate,
    snapshot: &HolderSnapshot,
    retention: usize,
) -> MergeOutcome {
    let retention = retention.max(1);
    let (history, discarded) = store.history_for_merge(&snapshot.key);

    let mut kind = if discarded.is_some() {
        log::warn!(
            "⚠️  Discarding unparseable history for {} and restarting from {}",
            snapshot.key,
            today
        );
        MergeKind::Restarted
    } else if history.is_empty() {
        MergeKind::Created
    } else {
        MergeKind::Appended
    };

    let samples = history.samples_mut();

    if samples.last().map_or(false, |s| s.date > today) {
        let before = samples.len();
        samples.retain(|s| s.date <= today);
        log::warn!(
            "⚠️  {} has {} sample(s) dated after {}; dropped",
            snapshot.key,
            before - samples.len(),
            today
        );
        kind = MergeKind::Rewound;
    }

    let mut filled_days = fill_holes(samples);
    if filled_days > 0 {
        log::debug!("{}: filled {} day(s) missing inside stored history", snapshot.key, filled_days);
    }

    match samples.last().copied() {
        Some(last) if last.date == today => {
            if let Some(last) = samples.last_mut() {
                last.balance = snapshot.balance;
            }
            if kind == MergeKind::Appended {
                kind = MergeKind::SameDayUpdate;
            }
        }
        Some(last) => {
            let gap = (today - last.date).num_days();
            if gap > 1 {
                // Anything older than the window would be truncated straight away
                let first = (gap - retention as i64).max(1);
                for offset in first..gap {
                    if let Some(date) = last.date.checked_add_days(Days::new(offset as u64)) {
                        samples.push(Sample::new(date, last.balance));
                        filled_days += 1;
                    }
                }
                log::debug!("{}: gap-filled {} day(s) after {}", snapshot.key, filled_days, last.date);
            }
            samples.push(Sample::new(today, snapshot.balance));
        }
        None => samples.push(Sample::new(today, snapshot.balance)),
    }

    let before = history.len();
    history.truncate_front(retention);
    let truncated = before - history.len();

    MergeOutcome {
        kind,
        filled_days,
        truncated,
    }
}

/// Carry-forward fill of days missing between stored samples
fn fill_holes(samples: &mut Vec<Sample>) -> usize {
    if samples.windows(2).all(|pair| pair[0].date.succ_opt() == Some(pair[1].date)) {
        return 0;
    }

    let mut filled: Vec<Sample> = Vec::with_capacity(samples.len());
    let mut added = 0;

    for sample in samples.drain(..) {
        if let Some(prev) = filled.last().copied() {
            let mut next = prev.date.succ_opt();
            while let Some(date) = next.filter(|d| *d < sample.date) {
                filled.push(Sample::new(date, prev.balance));
                added += 1;
                next = date.succ_opt();
            }
        }
        filled.push(sample);
    }

    *samples = filled;
    added
}
