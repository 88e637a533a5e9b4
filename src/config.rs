//! Runtime configuration from environment variables
//!
//! Environment variables (all optional):
//! - `HOLDERS_URL` - holder list endpoint
//! - `EXPLORER_API` - Blockscout-style explorer API base
//! - `TOKEN_CONTRACT` - token contract on the explorer
//! - `ORIGIN_ADDRESS` - mint origin wallet (unset: no provenance scan)
//! - `STORE_BACKEND` (json | sqlite, default json), `STORE_PATH`
//! - `REPORT_PATH` (default holders_report.json)
//! - `RETENTION_DAYS` (default 180)
//! - `CHANGE_EPSILON` (default 1.0)
//! - `TOTAL_SUPPLY` (unset: percent of supply omitted)
//! - `WATCHLIST_PATH` - JSON object of address -> label
//! - `VERIFICATION_POLICY` (always | never | bulk-skip, default bulk-skip)
//! - `BULK_SKIP_THRESHOLD` (default 50)
//! - `RETURNING_ACTIVITY_HOURS` (default 24)
//! - `UTC_OFFSET_HOURS` (default 8)
//! - `REQUEST_TIMEOUT_SECS` (default 30)

use crate::tracker::{EngineConfig, VerificationPolicy, Watchlist};
use chrono::FixedOffset;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

pub const DEFAULT_HOLDERS_URL: &str = "https://v2api.bestinslot.xyz/brc2.0/holders?tick=acorns";
pub const DEFAULT_EXPLORER_API: &str = "https://explorer.brc20.build/api/v2";
pub const DEFAULT_TOKEN_CONTRACT: &str = "0x4aa8e9ca6d90e2e47b44336aa4725894332c1b16";

/// Ten years; keeps the duration arithmetic in range
const MAX_RETURNING_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendType {
    Json,
    Sqlite,
}

/// Full configuration for a snapshot run
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub holders_url: String,
    pub explorer_api: String,
    pub token_contract: String,
    pub origin_address: Option<String>,
    pub store_backend: BackendType,
    pub store_path: String,
    pub report_path: String,
    pub request_timeout_secs: u64,
    pub engine: EngineConfig,
}

/// Parse an optional variable, warning and falling back on garbage
fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Invalid {} '{}', using default", name, raw);
                default
            }
        },
        Err(_) => default,
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse `always`, `never` or `bulk-skip` into a policy
pub fn parse_verification_policy(raw: &str, threshold: usize) -> Result<VerificationPolicy, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "always" => Ok(VerificationPolicy::Always),
        "never" => Ok(VerificationPolicy::Never),
        "bulk-skip" | "bulk_skip" | "bulkskip" => Ok(VerificationPolicy::BulkSkip(threshold)),
        other => Err(ConfigError::InvalidValue(format!(
            "VERIFICATION_POLICY must be always, never or bulk-skip, got '{}'",
            other
        ))),
    }
}

/// Load a watchlist file (`{"0xaddr": "label", ...}`)
pub fn load_watchlist(path: &str) -> Result<Watchlist, ConfigError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::InvalidValue(format!("WATCHLIST_PATH {}: {}", path, e)))?;
    let labels: HashMap<String, String> = serde_json::from_str(&json)
        .map_err(|e| ConfigError::InvalidValue(format!("WATCHLIST_PATH {}: {}", path, e)))?;
    Ok(Watchlist::new(labels))
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "json".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => BackendType::Json,
            "sqlite" => BackendType::Sqlite,
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "STORE_BACKEND must be json or sqlite, got '{}'",
                    other
                )))
            }
        };

        let default_store_path = match store_backend {
            BackendType::Json => "holders_db.json",
            BackendType::Sqlite => "holders_db.sqlite",
        };

        let retention_days = parse_or("RETENTION_DAYS", 180usize);
        if retention_days == 0 {
            return Err(ConfigError::InvalidValue(
                "RETENTION_DAYS must be at least 1".to_string(),
            ));
        }

        let change_epsilon = parse_or("CHANGE_EPSILON", 1.0f64);
        if !change_epsilon.is_finite() || change_epsilon < 0.0 {
            return Err(ConfigError::InvalidValue(
                "CHANGE_EPSILON must be a non-negative number".to_string(),
            ));
        }

        let total_supply = match non_empty("TOTAL_SUPPLY") {
            Some(raw) => match raw.replace(',', "").parse::<f64>() {
                Ok(s) if s.is_finite() && s > 0.0 => Some(s),
                _ => {
                    return Err(ConfigError::InvalidValue(format!(
                        "TOTAL_SUPPLY must be a positive number, got '{}'",
                        raw
                    )))
                }
            },
            None => None,
        };

        let watchlist = match non_empty("WATCHLIST_PATH") {
            Some(path) => load_watchlist(&path)?,
            None => Watchlist::default(),
        };

        let threshold = parse_or("BULK_SKIP_THRESHOLD", 50usize);
        let verification_policy = match non_empty("VERIFICATION_POLICY") {
            Some(raw) => parse_verification_policy(&raw, threshold)?,
            None => VerificationPolicy::BulkSkip(threshold),
        };

        let returning_hours = parse_or("RETURNING_ACTIVITY_HOURS", 24i64);
        let offset_hours = parse_or("UTC_OFFSET_HOURS", 8i32);
        let utc_offset = offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ConfigError::InvalidValue(format!("UTC_OFFSET_HOURS out of range: {}", offset_hours))
            })?;

        Ok(Self {
            holders_url: non_empty("HOLDERS_URL").unwrap_or_else(|| DEFAULT_HOLDERS_URL.to_string()),
            explorer_api: non_empty("EXPLORER_API")
                .unwrap_or_else(|| DEFAULT_EXPLORER_API.to_string()),
            token_contract: non_empty("TOKEN_CONTRACT")
                .unwrap_or_else(|| DEFAULT_TOKEN_CONTRACT.to_string())
                .to_lowercase(),
            origin_address: non_empty("ORIGIN_ADDRESS").map(|a| a.to_lowercase()),
            store_path: non_empty("STORE_PATH").unwrap_or_else(|| default_store_path.to_string()),
            store_backend,
            report_path: non_empty("REPORT_PATH")
                .unwrap_or_else(|| "holders_report.json".to_string()),
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 30u64).max(1),
            engine: EngineConfig {
                retention_days,
                change_epsilon,
                total_supply,
                watchlist,
                verification_policy,
                returning_after: chrono::Duration::hours(returning_hours.clamp(0, MAX_RETURNING_HOURS)),
                utc_offset,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment is process-wide; serialize the tests that touch it
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "HOLDERS_URL",
        "EXPLORER_API",
        "TOKEN_CONTRACT",
        "STORE_BACKEND",
        "STORE_PATH",
        "RETENTION_DAYS",
        "CHANGE_EPSILON",
        "TOTAL_SUPPLY",
        "WATCHLIST_PATH",
        "VERIFICATION_POLICY",
        "BULK_SKIP_THRESHOLD",
        "ORIGIN_ADDRESS",
        "UTC_OFFSET_HOURS",
        "RETURNING_ACTIVITY_HOURS",
        "REPORT_PATH",
        "REQUEST_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let config = TrackerConfig::from_env().unwrap();

        assert_eq!(config.holders_url, DEFAULT_HOLDERS_URL);
        assert_eq!(config.store_backend, BackendType::Json);
        assert_eq!(config.store_path, "holders_db.json");
        assert_eq!(config.origin_address, None);
        assert_eq!(config.engine.retention_days, 180);
        assert_eq!(config.engine.change_epsilon, 1.0);
        assert_eq!(config.engine.total_supply, None);
        assert_eq!(config.engine.verification_policy, VerificationPolicy::BulkSkip(50));
        assert_eq!(config.engine.utc_offset.local_minus_utc(), 8 * 3600);
        assert_eq!(config.engine.returning_after, chrono::Duration::hours(24));
        assert_eq!(config.explorer_api, DEFAULT_EXPLORER_API);
        assert_eq!(config.token_contract, DEFAULT_TOKEN_CONTRACT);
        assert_eq!(config.report_path, "holders_report.json");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_custom_config() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let dir = tempfile::tempdir().unwrap();
        let watchlist_path = dir.path().join("watchlist.json");
        std::fs::write(&watchlist_path, r#"{"0xABC": "project wallet"}"#).unwrap();

        env::set_var("STORE_BACKEND", "sqlite");
        env::set_var("RETENTION_DAYS", "90");
        env::set_var("TOTAL_SUPPLY", "999,703,067");
        env::set_var("WATCHLIST_PATH", watchlist_path.to_str().unwrap());
        env::set_var("VERIFICATION_POLICY", "bulk-skip");
        env::set_var("BULK_SKIP_THRESHOLD", "10");
        env::set_var("ORIGIN_ADDRESS", "0xA07764097A4DA7F3B61A562CA1F8E6779494748C");

        let config = TrackerConfig::from_env().unwrap();

        assert_eq!(config.store_backend, BackendType::Sqlite);
        assert_eq!(config.store_path, "holders_db.sqlite");
        assert_eq!(config.engine.retention_days, 90);
        assert_eq!(config.engine.total_supply, Some(999_703_067.0));
        assert_eq!(config.engine.watchlist.label("0xabc"), "project wallet");
        assert_eq!(config.engine.verification_policy, VerificationPolicy::BulkSkip(10));
        assert_eq!(
            config.origin_address.as_deref(),
            Some("0xa07764097a4da7f3b61a562ca1f8e6779494748c")
        );

        clear_env();
    }

    #[test]
    fn test_invalid_values_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var("RETENTION_DAYS", "0");
        assert!(matches!(TrackerConfig::from_env(), Err(ConfigError::InvalidValue(_))));
        env::remove_var("RETENTION_DAYS");

        env::set_var("TOTAL_SUPPLY", "-5");
        assert!(matches!(TrackerConfig::from_env(), Err(ConfigError::InvalidValue(_))));
        env::remove_var("TOTAL_SUPPLY");

        env::set_var("VERIFICATION_POLICY", "sometimes");
        assert!(matches!(TrackerConfig::from_env(), Err(ConfigError::InvalidValue(_))));

        clear_env();
    }

    #[test]
    fn test_parse_verification_policy() {
        assert_eq!(parse_verification_policy("Always", 5).unwrap(), VerificationPolicy::Always);
        assert_eq!(parse_verification_policy("never", 5).unwrap(), VerificationPolicy::Never);
        assert_eq!(
            parse_verification_policy("bulk_skip", 5).unwrap(),
            VerificationPolicy::BulkSkip(5)
        );
    }
}
