//! End-to-end snapshot runs through the public API
//!
//! Each test drives `TrackerEngine::run` against a real on-disk backend and a
//! scripted activity verifier, across several simulated days.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use holderflow::persistence::{JsonFileStore, SqliteStore, StoreBackend, StoreError};
use holderflow::render::ReportExport;
use holderflow::tracker::{
    ActivityVerifier, EngineConfig, MintProvenance, RawHolderRecord, TemporalStatus,
    TrackerEngine, VerificationError, VerificationPolicy,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Mutex;
use tempfile::tempdir;

struct ScriptedVerifier {
    returning: HashSet<String>,
    calls: Mutex<usize>,
}

impl ScriptedVerifier {
    fn new(returning: &[&str]) -> Self {
        Self {
            returning: returning.iter().map(|s| s.to_string()).collect(),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ActivityVerifier for ScriptedVerifier {
    async fn has_prior_activity(
        &self,
        address: &str,
        _older_than: chrono::Duration,
    ) -> Result<bool, VerificationError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.returning.contains(address))
    }
}

fn engine_at(y: i32, m: u32, d: u32, config: EngineConfig) -> TrackerEngine {
    let now: DateTime<Utc> = Utc.with_ymd_and_hms(y, m, d, 2, 0, 0).unwrap();
    TrackerEngine::new_with_clock(config, Box::new(move || now))
}

fn holders(raw: serde_json::Value) -> Vec<RawHolderRecord> {
    serde_json::from_value(raw).unwrap()
}

async fn three_day_scenario(backend: &dyn StoreBackend) {
    // Every day-1 holder has older activity; only day-3 newcomers may use it
    let verifier = ScriptedVerifier::new(&["0xaaa", "0xbbb", "0xccc"]);
    let provenance = MintProvenance::new(Some("0xorigin"), vec!["0xccc".to_string()]);

    // Day 1: empty store, everyone NEW without asking the verifier
    let day1 = holders(json!([
        {"evm_wallet": "0xAAA", "btc_wallet": "bc1qaaa", "total_balance": "1,000"},
        {"evm_wallet": "0xbbb", "total_balance": 500}
    ]));
    let config = EngineConfig {
        verification_policy: VerificationPolicy::Always,
        ..EngineConfig::default()
    };
    let (report, summary) = engine_at(2024, 1, 1, config.clone())
        .run(backend, &day1, &provenance, Some(&verifier))
        .await
        .unwrap();
    assert_eq!(summary.new, 2);
    assert_eq!(summary.returning, 0);
    assert!(report.rows.iter().all(|r| r.status.temporal == TemporalStatus::New));
    assert_eq!(report.rows[0].secondary_address.as_deref(), Some("bc1qaaa"));
    assert_eq!(verifier.calls(), 0);

    // Day 3 (day 2 missed): 0xbbb drops out, 0xccc appears with older activity
    let day3 = holders(json!([
        {"evm_wallet": "0xaaa", "total_balance": 1200},
        {"evm_wallet": "0xccc", "total_balance": 300},
        {"evm_wallet": "0xddd", "evm_withdrawable_balance": "50"}
    ]));
    let (report, summary) = engine_at(2024, 1, 3, config.clone())
        .run(backend, &day3, &provenance, Some(&verifier))
        .await
        .unwrap();

    assert_eq!(verifier.calls(), 2);
    assert_eq!(summary.returning, 1);
    assert_eq!(summary.new, 1);
    assert_eq!(summary.minted, 1);
    assert_eq!(summary.gap_filled_days, 1);

    let keys: Vec<&str> = report.rows.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["0xaaa", "0xccc", "0xddd"]);
    assert_eq!(report.rows[0].change, 200.0);
    assert_eq!(report.rows[0].chart_series.len(), 3);
    assert_eq!(report.rows[1].status.temporal, TemporalStatus::Returning);
    assert!(report.rows[1].status.minted);
    assert_eq!(report.rows[2].status.temporal, TemporalStatus::New);
    assert_eq!(report.rows[2].balance, 50.0);

    // Same-day re-run overwrites instead of appending
    let (report, summary) = engine_at(2024, 1, 3, config)
        .run(backend, &day3, &provenance, Some(&verifier))
        .await
        .unwrap();
    assert_eq!(summary.same_day_updates, 3);
    assert_eq!(report.rows[0].chart_series.len(), 3);
    assert_eq!(report.rows[1].status.temporal, TemporalStatus::Established);

    let document = backend.load().unwrap();
    assert_eq!(
        document["0xbbb"],
        json!([{"t": "2024-01-01", "y": 500.0}])
    );
    assert_eq!(
        document["0xaaa"],
        json!([
            {"t": "2024-01-01", "y": 1000.0},
            {"t": "2024-01-02", "y": 1000.0},
            {"t": "2024-01-03", "y": 1200.0}
        ])
    );
}

#[tokio::test]
async fn test_json_backend_multi_day_run() {
    let dir = tempdir().unwrap();
    let backend = JsonFileStore::new(dir.path().join("holders_db.json"));
    three_day_scenario(&backend).await;
}

#[tokio::test]
async fn test_sqlite_backend_multi_day_run() {
    let dir = tempdir().unwrap();
    let backend = SqliteStore::new(dir.path().join("holders_db.sqlite")).unwrap();
    three_day_scenario(&backend).await;
}

#[tokio::test]
async fn test_corrupt_entries_round_trip_until_merged() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("holders_db.json");
    std::fs::write(
        &path,
        json!({
            "0xbroken": [{"t": "2024-13-45", "y": 10}],
            "0xidle": "not a history",
            "0xok": [{"t": "2024-01-01", "y": 5.0}]
        })
        .to_string(),
    )
    .unwrap();
    let backend = JsonFileStore::new(&path);

    let (report, summary) = engine_at(2024, 1, 2, EngineConfig::default())
        .run(
            &backend,
            &holders(json!([{"evm_wallet": "0xbroken", "total_balance": 7}])),
            &MintProvenance::default(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(summary.restarted, 1);
    assert_eq!(summary.new, 0);
    assert_eq!(report.rows[0].status.temporal, TemporalStatus::Established);
    assert_eq!(report.rows[0].change, 0.0);

    let document = backend.load().unwrap();
    assert_eq!(document["0xbroken"], json!([{"t": "2024-01-02", "y": 7.0}]));
    assert_eq!(document["0xidle"], json!("not a history"));
    assert_eq!(document["0xok"], json!([{"t": "2024-01-01", "y": 5.0}]));
}

#[tokio::test]
async fn test_unreadable_store_is_fatal_and_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("holders_db.json");
    std::fs::write(&path, "{truncated").unwrap();
    let backend = JsonFileStore::new(&path);

    let result = engine_at(2024, 1, 2, EngineConfig::default())
        .run(
            &backend,
            &holders(json!([{"evm_wallet": "0xaaa", "total_balance": 1}])),
            &MintProvenance::default(),
            None,
        )
        .await;

    assert!(matches!(result, Err(StoreError::Serialization(_))));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{truncated");
}

#[tokio::test]
async fn test_report_export_matches_store_shape() {
    let dir = tempdir().unwrap();
    let backend = JsonFileStore::new(dir.path().join("holders_db.json"));
    let config = EngineConfig {
        total_supply: Some(1_000.0),
        ..EngineConfig::default()
    };

    let (report, _) = engine_at(2024, 1, 1, config)
        .run(
            &backend,
            &holders(json!([{"evm_wallet": "0xaaa", "total_balance": 250}])),
            &MintProvenance::default(),
            None,
        )
        .await
        .unwrap();

    let report_path = dir.path().join("holders_report.json");
    ReportExport::new(&report, Utc::now()).write_to(&report_path).unwrap();

    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    let stored = backend.load().unwrap();

    assert_eq!(exported["chart"]["0xaaa"], stored["0xaaa"]);
    assert_eq!(exported["rows"][0]["percent_of_supply"], 25.0);
    assert_eq!(exported["rows"][0]["status"]["temporal"], "NEW");
}
