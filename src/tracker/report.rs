//! Report assembly: one row per currently ranked holder

use super::classify::Watchlist;
use super::store::TimeSeriesStore;
use super::types::{HolderSnapshot, ReportRow, Sample, Status, TemporalStatus};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Assembled output of one run, ready for the render layer
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub today: NaiveDate,
    pub rows: Vec<ReportRow>,
}

impl Report {
    /// Store-shaped chart data for the ranked holders only
    pub fn chart_data(&self) -> BTreeMap<String, Vec<Sample>> {
        self.rows
            .iter()
            .map(|row| (row.key.clone(), row.chart_series.clone()))
            .collect()
    }

    pub fn count_where(&self, pred: impl Fn(&ReportRow) -> bool) -> usize {
        self.rows.iter().filter(|r| pred(r)).count()
    }
}

/// `balance / total_supply * 100`, omitted without a usable supply
pub fn percent_of_supply(balance: f64, total_supply: Option<f64>) -> Option<f64> {
    total_supply
        .filter(|s| s.is_finite() && *s > 0.0)
        .map(|s| balance / s * 100.0)
}

/// Build report rows in snapshot order
///
/// Snapshots are expected pre-sorted by the source; no re-sorting happens
/// here. Addresses that are in the store but not in `snapshots` get no row.
pub fn assemble(
    snapshots: &[HolderSnapshot],
    store: &TimeSeriesStore,
    statuses: &HashMap<String, Status>,
    deltas: &HashMap<String, f64>,
    total_supply: Option<f64>,
    watchlist: &Watchlist,
) -> Vec<ReportRow> {
    snapshots
        .iter()
        .map(|snapshot| {
            let chart_series = match store.get(&snapshot.key) {
                Some(history) => history.samples().to_vec(),
                None => {
                    log::debug!("No merged history for {}; empty chart series", snapshot.key);
                    Vec::new()
                }
            };

            let status = statuses.get(&snapshot.key).copied().unwrap_or_else(|| {
                Status::new(TemporalStatus::Established, snapshot.is_minted())
            });

            ReportRow {
                rank: snapshot.rank,
                key: snapshot.key.clone(),
                secondary_address: snapshot.secondary_address.clone(),
                balance: snapshot.balance,
                percent_of_supply: percent_of_supply(snapshot.balance, total_supply),
                change: deltas.get(&snapshot.key).copied().unwrap_or(0.0),
                status,
                note: watchlist.label(&snapshot.key).to_string(),
                chart_series,
            }
        })
        .collect()
}
