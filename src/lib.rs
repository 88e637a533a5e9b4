//! # holderflow
//!
//! Daily holder-list tracker. Each run fetches the ranked holder list, merges
//! it into a per-address daily time series, classifies holders and hands a
//! report to the renderer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   raw records   ┌────────────────────────────┐
//! │ HolderSource │ ──────────────▶ │ TrackerEngine              │
//! └──────────────┘                 │  normalize → merge →       │
//! ┌──────────────┐  provenance /   │  classify → delta → report │
//! │ExplorerClient│ ──────────────▶ └──────┬──────────────┬──────┘
//! └──────────────┘  verification          │ load/save    │ Report
//!                                  ┌──────▼──────┐ ┌─────▼──────┐
//!                                  │StoreBackend │ │ReportExport│
//!                                  └─────────────┘ └────────────┘
//! ```


pub mod config;
pub mod persistence;
pub mod render;
pub mod source;
pub mod tracker;

use crate::config::ConfigError;
use crate::persistence::StoreError;
use crate::source::SourceError;

/// Fatal errors for one snapshot run
#[derive(Debug)]
pub enum RunError {
    Config(ConfigError),
    Store(StoreError),
    Source(SourceError),
    Report(std::io::Error),
}

impl From<ConfigError> for RunError {
    fn from(err: ConfigError) -> Self {
        RunError::Config(err)
    }
}

impl From<StoreError> for RunError {
    fn from(err: StoreError) -> Self {
        RunError::Store(err)
    }
}

impl From<SourceError> for RunError {
    fn from(err: SourceError) -> Self {
        RunError::Source(err)
    }
}

impl From<std::io::Error> for RunError {
    fn from(err: std::io::Error) -> Self {
        RunError::Report(err)
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Config(e) => write!(f, "Configuration error: {}", e),
            RunError::Store(e) => write!(f, "Store error: {}", e),
            RunError::Source(e) => write!(f, "Source error: {}", e),
            RunError::Report(e) => write!(f, "Report write error: {}", e),
        }
    }
}

impl std::error::Error for RunError {}
