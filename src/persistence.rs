//! Store persistence backends
//!
//! Backends move a `StoreDocument` to and from storage; parsing into typed
//! histories happens in the tracker so a corrupted entry never fails a load.
//!
//! - `JsonFileStore` - single pretty-printed JSON document, atomic replace
//! - `SqliteStore` - one row per address, samples as JSON text

use crate::tracker::store::StoreDocument;
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Database(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Serialization(e) => write!(f, "Serialization error: {}", e),
            StoreError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Load/save collaborator for the time series store
pub trait StoreBackend: Send + Sync {
    /// Load the whole document; a missing store is an empty document
    fn load(&self) -> Result<StoreDocument, StoreError>;

    /// Replace the persisted document
    fn save(&self, document: &StoreDocument) -> Result<(), StoreError>;

    /// Backend type for logging
    fn backend_type(&self) -> &'static str;
}

/// Write `contents` next to `path` and rename it into place
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)
}

/// JSON document store: `{"<address>": [{"t": "YYYY-MM-DD", "y": <balance>}, ...]}`
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreBackend for JsonFileStore {
    fn load(&self) -> Result<StoreDocument, StoreError> {
        if !self.path.exists() {
            log::info!("No existing store file found: {}", self.path.display());
            return Ok(StoreDocument::new());
        }

        let json = fs::read_to_string(&self.path)?;
        let document: StoreDocument = serde_json::from_str(&json)?;

        log::debug!("Loaded {} entries from {}", document.len(), self.path.display());
        Ok(document)
    }

    fn save(&self, document: &StoreDocument) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(document)?;
        write_atomic(&self.path, &json)?;

        log::debug!("Saved {} entries to {}", document.len(), self.path.display());
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "JSON"
    }
}

/// Apply WAL journaling and relaxed sync for a single-writer database
fn apply_pragmas(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    Ok(())
}

/// SQLite store, one row per address
///
/// Opens a fresh connection per call; a run only loads and saves once.
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self {
            db_path: db_path.into(),
        };

        if let Some(parent) = store.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = store.open()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS holder_series (
                address TEXT PRIMARY KEY,
                samples TEXT NOT NULL
            )",
            [],
        )?;

        log::info!("✅ SQLite store initialized: {}", store.db_path.display());
        Ok(store)
    }

    fn open(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path)?;
        apply_pragmas(&conn)?;
        Ok(conn)
    }
}

impl StoreBackend for SqliteStore {
    fn load(&self) -> Result<StoreDocument, StoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT address, samples FROM holder_series")?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut document = StoreDocument::new();
        for (address, samples) in rows {
            // Rows not written as JSON come back as a string so the tracker sets them aside
            let value = serde_json::from_str(&samples)
                .unwrap_or_else(|_| serde_json::Value::String(samples));
            document.insert(address, value);
        }

        log::debug!("Loaded {} entries from {}", document.len(), self.db_path.display());
        Ok(document)
    }

    fn save(&self, document: &StoreDocument) -> Result<(), StoreError> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM holder_series", [])?;
        for (address, value) in document {
            let samples = serde_json::to_string(value)?;
            tx.execute(
                "INSERT INTO holder_series (address, samples) VALUES (?1, ?2)",
                params![address, samples],
            )?;
        }

        tx.commit()?;

        log::debug!("✅ Saved {} entries to SQLite", document.len());
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample_document() -> StoreDocument {
        let mut document = StoreDocument::new();
        document.insert(
            "0xa07764097a4da7f3b61a562ca1f8e6779494748c".to_string(),
            json!([{"t": "2024-01-01", "y": 50.0}, {"t": "2024-01-02", "y": 0.0}]),
        );
        document.insert("0xbroken".to_string(), json!([{"t": 17, "y": "x"}]));
        document
    }

    #[test]
    fn test_json_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("db.json"));

        store.save(&sample_document()).unwrap();
        assert_eq!(store.load().unwrap(), sample_document());
        assert!(!dir.path().join("nested").join("db.json.tmp").exists());
    }

    #[test]
    fn test_json_unreadable_file_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_sqlite_round_trip_replaces_rows() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("db.sqlite")).unwrap();

        store.save(&sample_document()).unwrap();
        assert_eq!(store.load().unwrap(), sample_document());

        let mut smaller = StoreDocument::new();
        smaller.insert("0xonly".to_string(), json!([{"t": "2024-05-05", "y": 1.5}]));
        store.save(&smaller).unwrap();
        assert_eq!(store.load().unwrap(), smaller);
    }

    #[test]
    fn test_sqlite_keeps_string_entries_verbatim() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("db.sqlite");
        let store = SqliteStore::new(&db_path).unwrap();

        let mut document = StoreDocument::new();
        document.insert("0xjsonish".to_string(), json!("[]"));
        document.insert("0xtext".to_string(), json!("not a history"));
        store.save(&document).unwrap();
        assert_eq!(store.load().unwrap(), document);

        // Text that is not JSON at all still loads, as a string
        let conn = Connection::open(&db_path).unwrap();
        conn.execute(
            "INSERT INTO holder_series (address, samples) VALUES ('0xraw', '{oops')",
            [],
        )
        .unwrap();
        assert_eq!(store.load().unwrap()["0xraw"], json!("{oops"));
    }

    #[test]
    fn test_sqlite_wal_enabled() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("db.sqlite");
        let _store = SqliteStore::new(&db_path).unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");
    }
}
