//! Render hand-off
//!
//! The report is written as one JSON document for the page renderer, plus a
//! few formatting helpers used for the run summary in the logs.

use crate::persistence::write_atomic;
use crate::tracker::{Report, ReportRow, Sample};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Everything the renderer needs for one page
#[derive(Debug, Serialize)]
pub struct ReportExport<'a> {
    pub generated_at: DateTime<Utc>,
    pub today: NaiveDate,
    pub holder_count: usize,
    /// Per-address chart series, ranked holders only
    pub chart: BTreeMap<String, Vec<Sample>>,
    pub rows: &'a [ReportRow],
}

impl<'a> ReportExport<'a> {
    pub fn new(report: &'a Report, generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            today: report.today,
            holder_count: report.rows.len(),
            chart: report.chart_data(),
            rows: &report.rows,
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, &json)?;
        log::info!("💾 Report written: {} ({} rows)", path.display(), self.holder_count);
        Ok(())
    }
}

/// Whole units with thousands separators
pub fn format_balance(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// `+1,234 ▲`, `-56 ▼`, or `-` for no change
pub fn format_change(change: f64) -> String {
    if change > 0.0 {
        format!("+{} ▲", format_balance(change))
    } else if change < 0.0 {
        format!("{} ▼", format_balance(change))
    } else {
        "-".to_string()
    }
}

pub fn format_percent(percent: Option<f64>) -> String {
    match percent {
        Some(p) => format!("{:.2}%", p),
        None => "-".to_string(),
    }
}
