//! Day-over-day balance change

use super::store::History;

/// Difference between the two most recent samples
///
/// Returns 0 for histories shorter than two samples, and for changes whose
/// magnitude is below `epsilon`.
pub fn delta(history: &History, epsilon: f64) -> f64 {
    match history.last_two() {
        Some((prev, last)) => {
            let change = last.balance - prev.balance;
            if change.abs() < epsilon {
                0.0
            } else {
                change
            }
        }
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::merge::merge;
    use crate::tracker::store::{parse_day, StoreDocument, TimeSeriesStore};
    use crate::tracker::types::HolderSnapshot;
    use serde_json::json;

    fn history(raw: serde_json::Value) -> History {
        History::parse(&raw).unwrap()
    }

    #[test]
    fn test_delta_of_last_two_samples() {
        let h = history(json!([{"t": "2024-01-01", "y": 100.0}, {"t": "2024-01-02", "y": 130.0}]));
        assert_eq!(delta(&h, 0.0), 30.0);

        let h = history(json!([
            {"t": "2024-01-01", "y": 500.0},
            {"t": "2024-01-02", "y": 130.0},
            {"t": "2024-01-03", "y": 100.0}
        ]));
        assert_eq!(delta(&h, 0.0), -30.0);
    }

    #[test]
    fn test_short_history_has_no_delta() {
        assert_eq!(delta(&History::new(), 0.0), 0.0);
        let h = history(json!([{"t": "2024-01-01", "y": 100.0}]));
        assert_eq!(delta(&h, 0.0), 0.0);
    }

    #[test]
    fn test_epsilon_suppresses_noise() {
        let h = history(json!([{"t": "2024-01-01", "y": 100.0}, {"t": "2024-01-02", "y": 100.4}]));
        assert_eq!(delta(&h, 1.0), 0.0);
        assert!((delta(&h, 0.0) - 0.4).abs() < 1e-9);

        // Exactly at the threshold is kept
        let h = history(json!([{"t": "2024-01-01", "y": 100.0}, {"t": "2024-01-02", "y": 99.0}]));
        assert_eq!(delta(&h, 1.0), -1.0);
    }

    #[test]
    fn test_delta_after_gap_fill_compares_against_carried_balance() {
        let mut document = StoreDocument::new();
        document.insert("0xa".to_string(), json!([{"t": "2024-01-01", "y": 50.0}]));
        let mut store = TimeSeriesStore::from_document(document);

        let snapshot = HolderSnapshot {
            key: "0xa".to_string(),
            balance: 80.0,
            rank: 1,
            secondary_address: None,
            provenance: None,
        };
        merge(&mut store, parse_day("2024-01-04").unwrap(), &snapshot, 180);

        assert_eq!(delta(store.get("0xa").unwrap(), 0.0), 30.0);
    }
}
