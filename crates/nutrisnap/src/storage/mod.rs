//! Local key-value store for nutrisnap.
//!
//! The app keeps its state as a handful of JSON documents under well-known
//! keys (see [`keys`]). They live in a single `SQLite` file so writes of
//! several keys can be made atomic.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Well-known storage keys.
pub mod keys {
    /// Nutrition goals (`NutritionGoals` JSON).
    pub const GOALS: &str = "nutrisnap-goals";
    /// Today's foods (JSON array of `FoodItem`).
    pub const TODAY_FOODS: &str = "nutrisnap-today-foods";
    /// History (JSON object of date to `DailyLog`).
    pub const HISTORY: &str = "nutrisnap-history";
    /// The date `TODAY_FOODS` belongs to.
    pub const CURRENT_DATE: &str = "nutrisnap-current-date";
    /// Session token issued by the backend.
    pub const AUTH_TOKEN: &str = "nutrisnap-auth-token";
    /// Signed-in user profile (JSON).
    pub const USER_DATA: &str = "nutrisnap-user-data";
    /// Preferred UI language code.
    pub const LANGUAGE: &str = "nutrisnap-language";
    /// Milliseconds since the epoch of the last successful push.
    pub const LAST_SYNC: &str = "nutrisnap-last-sync";
}

/// `SQLite`-backed key-value store.
///
/// The connection sits behind a mutex so one store can be shared through an
/// `Arc` by the tracker, the auth session and the language settings.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
}

impl Storage {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening local store at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Local store opened at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Open a store only if its file already exists.
    ///
    /// Returns `None` without touching the filesystem when there is no file
    /// at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the existing database cannot be opened.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.is_file() {
            debug!("No local store at {}", path.display());
            return Ok(None);
        }
        Self::open(path).map(Some)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("local store lock poisoned"))
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()?
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        Self::upsert(&conn, key, value)?;
        debug!("Stored {} ({} bytes)", key, value.len());
        Ok(())
    }

    /// Store several values in one transaction.
    ///
    /// Either every value is written or none is.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_items(&self, items: &[(&str, String)]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for (key, value) in items {
            Self::upsert(&tx, key, value)?;
        }
        tx.commit()?;
        debug!("Stored {} keys", items.len());
        Ok(())
    }

    fn upsert(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            r"
            INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Remove `key`.
    ///
    /// Returns `true` if a value was removed, `false` if the key was absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove_item(&self, key: &str) -> Result<bool> {
        let affected = self
            .conn()?
            .execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(affected > 0)
    }

    /// Remove several keys in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove_items(&self, keys: &[&str]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        for key in keys {
            removed += tx.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Read and decode the JSON document stored under `key`.
    ///
    /// A value that does not decode as `T` is logged and treated as absent,
    /// so a corrupt entry never blocks startup.
    ///
    /// # Errors
    ///
    /// Returns an error only if the database operation fails.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_item(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Ignoring malformed value stored under {}: {}", key, e);
                Ok(None)
            }
        }
    }

    /// Encode `value` as JSON and store it under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the database operation fails.
    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set_item(key, &raw)
    }

    /// All stored keys, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// Remove every stored key.
    ///
    /// Returns the number of keys removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear(&self) -> Result<usize> {
        let affected = self.conn()?.execute("DELETE FROM kv", [])?;
        if affected > 0 {
            info!("Cleared {} stored keys", affected);
        }
        Ok(affected)
    }

    /// Get store statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let conn = self.conn()?;
        let total_keys: i64 = conn.query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;

        let newest: Option<String> = conn
            .query_row(
                "SELECT updated_at FROM kv WHERE updated_at != '' ORDER BY updated_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let last_updated = newest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_keys,
            last_updated,
            db_size_bytes,
        })
    }
}

/// Statistics about the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of stored keys.
    pub total_keys: i64,
    /// When any key was last written.
    pub last_updated: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
