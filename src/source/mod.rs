//! External data sources
//!
//! - `holders` - ranked holder list (BestInSlot BRC2.0 API)
//! - `explorer` - Blockscout-style explorer: mint provenance scan and
//!   prior-activity verification for newly seen addresses
//!
//! No retry or backoff here: a failed holder fetch ends the run before the
//! store is touched, and the next scheduled run tries again.

pub mod explorer;
pub mod holders;

pub use explorer::ExplorerClient;
pub use holders::{BestInSlotClient, HolderSource};

/// Browser-like agent; the public endpoints reject empty user agents
pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; holderflow/0.1)";

#[derive(Debug)]
pub enum SourceError {
    Http(reqwest::Error),
    Status(String),
    Decode(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Http(err)
        }
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Http(e) => write!(f, "HTTP error: {}", e),
            SourceError::Status(s) => write!(f, "Unexpected response status: {}", s),
            SourceError::Decode(e) => write!(f, "Response decode error: {}", e),
        }
    }
}

impl std::error::Error for SourceError {}
