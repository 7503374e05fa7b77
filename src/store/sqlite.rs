//! SQLite key-value adapter
//!
//! Maps the `KeyValueStore` contract onto a single `kv_store` table with
//! BLOB key and BLOB value columns. Tuning pragmas are construction
//! parameters, not part of the measurement core.

use std::collections::VecDeque;
use std::path::PathBuf;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{KeyValueStore, Record, ScanIter, StoreError};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS kv_store (\
     key BLOB PRIMARY KEY, \
     value BLOB NOT NULL)";
const PUT_SQL: &str = "INSERT OR REPLACE INTO kv_store (key, value) VALUES (?1, ?2)";
const UPDATE_SQL: &str = "UPDATE kv_store SET value = ?1 WHERE key = ?2";
const GET_SQL: &str = "SELECT value FROM kv_store WHERE key = ?1";
const DELETE_SQL: &str = "DELETE FROM kv_store WHERE key = ?1";
const SCAN_FIRST_SQL: &str = "SELECT key, value FROM kv_store ORDER BY key LIMIT ?1";
const SCAN_NEXT_SQL: &str =
    "SELECT key, value FROM kv_store WHERE key > ?1 ORDER BY key LIMIT ?2";

/// Rows fetched per scan page.
const SCAN_PAGE_SIZE: usize = 256;

/// SQLite `journal_mode` pragma values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    Wal,
    Off,
}

impl JournalMode {
    fn as_pragma(self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Persist => "PERSIST",
            JournalMode::Memory => "MEMORY",
            JournalMode::Wal => "WAL",
            JournalMode::Off => "OFF",
        }
    }
}

/// SQLite `synchronous` pragma values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynchronousMode {
    Off,
    Normal,
    Full,
    Extra,
}

impl SynchronousMode {
    fn as_pragma(self) -> &'static str {
        match self {
            SynchronousMode::Off => "OFF",
            SynchronousMode::Normal => "NORMAL",
            SynchronousMode::Full => "FULL",
            SynchronousMode::Extra => "EXTRA",
        }
    }
}

/// SQLite `temp_store` pragma values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempStore {
    Default,
    File,
    Memory,
}

impl TempStore {
    fn as_pragma(self) -> &'static str {
        match self {
            TempStore::Default => "DEFAULT",
            TempStore::File => "FILE",
            TempStore::Memory => "MEMORY",
        }
    }
}

/// Database path selecting an in-memory database
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Construction parameters for [`SqliteStore`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteOptions {
    /// Database file; `:memory:` opens a private in-memory database
    pub path: PathBuf,
    pub journal_mode: JournalMode,
    pub synchronous: SynchronousMode,
    /// Page cache size (`PRAGMA cache_size`); negative values are KiB
    pub cache_size: i64,
    pub temp_store: TempStore,
    /// Prepared statements kept in the connection cache
    pub statement_cache_capacity: usize,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("kvorb_bench.db"),
            journal_mode: JournalMode::Wal,
            synchronous: SynchronousMode::Normal,
            cache_size: 10_000,
            temp_store: TempStore::Memory,
            statement_cache_capacity: 16,
        }
    }
}

impl SqliteOptions {
    /// Default tuning against a private in-memory database
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(IN_MEMORY_PATH),
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY_PATH
    }

    /// Default tuning against the given database file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// `KeyValueStore` over a single SQLite connection
pub struct SqliteStore {
    conn: Connection,
    journal_mode: String,
}

impl SqliteStore {
    /// Open (or create) the database described by `options` and ensure the
    /// `kv_store` table exists.
    pub fn open(options: &SqliteOptions) -> Result<Self, StoreError> {
        let conn = if options.is_in_memory() {
            Connection::open_in_memory()?
        } else {
            Connection::open(&options.path)?
        };
        conn.set_prepared_statement_cache_capacity(options.statement_cache_capacity);

        let journal_mode: String = conn.pragma_update_and_check(
            None,
            "journal_mode",
            options.journal_mode.as_pragma(),
            |row| row.get(0),
        )?;
        conn.pragma_update(None, "synchronous", options.synchronous.as_pragma())?;
        conn.pragma_update(None, "cache_size", options.cache_size)?;
        conn.pragma_update(None, "temp_store", options.temp_store.as_pragma())?;
        conn.execute_batch(CREATE_TABLE)?;

        info!(
            path = %options.path.display(),
            sqlite_version = rusqlite::version(),
            journal_mode = %journal_mode,
            "opened SQLite key-value store"
        );

        Ok(Self { conn, journal_mode })
    }

    /// Open a private in-memory database with default tuning
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(&SqliteOptions::in_memory())
    }

    /// Journal mode reported by SQLite after applying the options
    pub fn journal_mode(&self) -> &str {
        &self.journal_mode
    }
}

impl KeyValueStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> Option<String> {
        Some(rusqlite::version().to_string())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare_cached(PUT_SQL)?;
        stmt.execute(params![key, value])?;
        Ok(())
    }

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let mut stmt = self.conn.prepare_cached(GET_SQL)?;
        let value = stmt
            .query_row(params![key], |row| row.get::<_, Vec<u8>>(0))
            .optional()?;
        Ok(value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool, StoreError> {
        let mut stmt = self.conn.prepare_cached(DELETE_SQL)?;
        Ok(stmt.execute(params![key])? > 0)
    }

    fn update(&mut self, key: &[u8], value: &[u8]) -> Result<bool, StoreError> {
        let mut stmt = self.conn.prepare_cached(UPDATE_SQL)?;
        Ok(stmt.execute(params![value, key])? > 0)
    }

    fn scan(&mut self) -> Result<ScanIter<'_>, StoreError> {
        Ok(Box::new(SqliteScan::new(&self.conn)))
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("DELETE FROM kv_store")?;
        Ok(())
    }

    fn begin_batch(&mut self) -> Result<(), StoreError> {
        if self.in_batch() {
            return Err(StoreError::Transaction(
                "a batch is already open".to_string(),
            ));
        }
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    fn commit_batch(&mut self) -> Result<(), StoreError> {
        if !self.in_batch() {
            return Err(StoreError::Transaction("no batch to commit".to_string()));
        }
        self.conn.execute_batch("COMMIT")?;
        debug!("committed SQLite batch");
        Ok(())
    }

    fn rollback_batch(&mut self) -> Result<(), StoreError> {
        if !self.in_batch() {
            return Err(StoreError::Transaction(
                "no batch to roll back".to_string(),
            ));
        }
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn in_batch(&self) -> bool {
        !self.conn.is_autocommit()
    }
}

/// Keyset-paginated cursor over `kv_store`.
///
/// Each page is fetched with a fresh bounded query, so no statement stays
/// borrowed between calls to `next`.
struct SqliteScan<'c> {
    conn: &'c Connection,
    page: VecDeque<Record>,
    last_key: Option<Vec<u8>>,
    exhausted: bool,
}

impl<'c> SqliteScan<'c> {
    fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            page: VecDeque::with_capacity(SCAN_PAGE_SIZE),
            last_key: None,
            exhausted: false,
        }
    }

    fn fetch_page(&mut self) -> Result<(), StoreError> {
        let limit = SCAN_PAGE_SIZE as i64;
        let read_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<Record> {
            Ok((row.get(0)?, row.get(1)?))
        };

        let fetched = match &self.last_key {
            None => {
                let mut stmt = self.conn.prepare_cached(SCAN_FIRST_SQL)?;
                let rows = stmt.query_map(params![limit], read_row)?;
                rows.collect::<rusqlite::Result<Vec<Record>>>()?
            }
            Some(last) => {
                let mut stmt = self.conn.prepare_cached(SCAN_NEXT_SQL)?;
                let rows = stmt.query_map(params![last, limit], read_row)?;
                rows.collect::<rusqlite::Result<Vec<Record>>>()?
            }
        };

        if fetched.len() < SCAN_PAGE_SIZE {
            self.exhausted = true;
        }
        if let Some((key, _)) = fetched.last() {
            self.last_key = Some(key.clone());
        }
        self.page.extend(fetched);
        Ok(())
    }
}

impl Iterator for SqliteScan<'_> {
    type Item = Result<Record, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.page.is_empty() && !self.exhausted {
            if let Err(err) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        self.page.pop_front().map(Ok)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => StoreError::Constraint(err.to_string()),
            Some(ErrorCode::DatabaseCorrupt) | Some(ErrorCode::NotADatabase) => {
                StoreError::Corruption(err.to_string())
            }
            Some(ErrorCode::CannotOpen)
            | Some(ErrorCode::DiskFull)
            | Some(ErrorCode::SystemIoFailure)
            | Some(ErrorCode::ReadOnly)
            | Some(ErrorCode::PermissionDenied) => StoreError::Io(err.to_string()),
            _ => StoreError::Backend(err.to_string()),
        }
    }
}
