//! Holder Snapshot - daily tracker run
//!
//! One run:
//! - Fetches the ranked holder list
//! - Scans mint provenance from the origin wallet (when configured)
//! - Merges into the time series store, classifies, persists
//! - Writes the report export for the renderer
//!
//! Usage:
//!   cargo run --release --bin holder_snapshot
//!
//! Environment variables: see `holderflow::config`. `RUST_LOG` controls
//! logging (default: info).

use dotenv::dotenv;
use holderflow::config::{BackendType, TrackerConfig};
use holderflow::persistence::{JsonFileStore, SqliteStore, StoreBackend};
use holderflow::render::{format_balance, format_change, format_percent, ReportExport};
use holderflow::source::{BestInSlotClient, ExplorerClient, HolderSource};
use holderflow::tracker::{ActivityVerifier, MintProvenance, TrackerEngine};
use holderflow::RunError;
use log::{error, info, warn};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

const SUMMARY_TOP_ROWS: usize = 10;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ Run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), RunError> {
    info!("🚀 Holder Snapshot");

    let config = TrackerConfig::from_env()?;
    info!("   ├─ Holders: {}", config.holders_url);
    info!("   ├─ Explorer: {}", config.explorer_api);
    info!("   ├─ Store: {} ({:?})", config.store_path, config.store_backend);
    info!("   ├─ Retention: {} days", config.engine.retention_days);
    info!("   ├─ Verification: {:?}", config.engine.verification_policy);
    info!("   └─ Watchlist: {} labels", config.engine.watchlist.len());

    let backend: Box<dyn StoreBackend> = match config.store_backend {
        BackendType::Json => Box::new(JsonFileStore::new(&config.store_path)),
        BackendType::Sqlite => Box::new(SqliteStore::new(&config.store_path)?),
    };

    let timeout = Duration::from_secs(config.request_timeout_secs);
    let holders = BestInSlotClient::new(&config.holders_url, timeout)?;
    let explorer = ExplorerClient::new(&config.explorer_api, &config.token_contract, timeout)?;

    // Nothing is persisted when the holder list is unavailable
    let records = holders.fetch_holders().await?;
    info!("✅ {} returned {} records", holders.source_name(), records.len());

    let provenance = match config.origin_address.as_deref() {
        Some(origin) => match explorer.fetch_mint_provenance(origin).await {
            Ok(provenance) => provenance,
            Err(e) => {
                warn!("⚠️  Mint provenance scan failed: {} (no MINTED tags this run)", e);
                MintProvenance::new(Some(origin), Vec::new())
            }
        },
        None => {
            info!("ℹ️  ORIGIN_ADDRESS not set; skipping mint provenance scan");
            MintProvenance::default()
        }
    };

    let engine = TrackerEngine::new(config.engine.clone());
    let verifier: &dyn ActivityVerifier = &explorer;
    let (report, summary) = engine
        .run(backend.as_ref(), &records, &provenance, Some(verifier))
        .await?;

    ReportExport::new(&report, chrono::Utc::now()).write_to(Path::new(&config.report_path))?;

    info!("📊 Run summary for {}", report.today);
    info!("   ├─ Holders: {} ({} known before)", summary.holders, summary.known_before);
    info!("   ├─ Created: {}, restarted: {}", summary.created, summary.restarted);
    info!("   ├─ NEW: {}, RETURNING: {}", summary.new, summary.returning);
    info!("   ├─ MINTED: {}", summary.minted);
    info!(
        "   └─ Watchlisted: {}",
        report.count_where(|row| !row.note.is_empty())
    );

    for row in report.rows.iter().take(SUMMARY_TOP_ROWS) {
        info!(
            "   #{:<4} {} {:>16} {:>8} {:>14} {}{}",
            row.rank,
            row.key,
            format_balance(row.balance),
            format_percent(row.percent_of_supply),
            format_change(row.change),
            row.status.temporal.as_str(),
            if row.status.minted { " MINTED" } else { "" }
        );
    }

    Ok(())
}
