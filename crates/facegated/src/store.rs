//! SQLite-backed named caches and key-value entries.
//!
//! Every statement runs on the connection thread owned by
//! `tokio_rusqlite`, so model blobs never occupy a runtime worker.

use chrono::Utc;
use facegate_core::session::{Session, SESSION_KEY};
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use thiserror::Error;
use tokio_rusqlite::Connection;

/// Cache holding the model files.
pub const MODELS_CACHE: &str = "face-api-models";
/// Cache holding the account profile photos.
pub const IMAGES_CACHE: &str = "user-profile-images";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    #[error("stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kv (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS cache_entries (
    cache     TEXT NOT NULL,
    url       TEXT NOT NULL,
    body      BLOB NOT NULL,
    stored_at TEXT NOT NULL,
    PRIMARY KEY (cache, url)
);
";

/// Clone-safe handle to the database.
#[derive(Clone)]
pub struct Store {
    conn: Connection,
}

impl Store {
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).await?;
        tracing::info!(path = %path.display(), "store opened");
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().await?).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|c| Ok(c.execute_batch(SCHEMA)?)).await?;
        Ok(Self { conn })
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        Ok(self
            .conn
            .call(move |c| {
                Ok(c.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |r| r.get(0))
                    .optional()?)
            })
            .await?)
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let (key, value) = (key.to_string(), value.to_string());
        self.conn
            .call(move |c| {
                c.execute(
                    "INSERT INTO kv (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![key, value],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let key = key.to_string();
        Ok(self
            .conn
            .call(move |c| Ok(c.execute("DELETE FROM kv WHERE key = ?1", params![key])? > 0))
            .await?)
    }

    pub fn cache(&self, name: &'static str) -> NamedCache {
        NamedCache { store: self.clone(), name }
    }
}

/// One named cache inside the store, keyed by asset URL.
#[derive(Clone)]
pub struct NamedCache {
    store: Store,
    name: &'static str,
}

impl NamedCache {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn contains(&self, url: &str) -> Result<bool, StoreError> {
        let (name, url) = (self.name, url.to_string());
        Ok(self
            .store
            .conn
            .call(move |c| {
                Ok(c.query_row(
                    "SELECT 1 FROM cache_entries WHERE cache = ?1 AND url = ?2",
                    params![name, url],
                    |_| Ok(()),
                )
                .optional()?
                .is_some())
            })
            .await?)
    }

    pub async fn get(&self, url: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let (name, url) = (self.name, url.to_string());
        Ok(self
            .store
            .conn
            .call(move |c| {
                Ok(c.query_row(
                    "SELECT body FROM cache_entries WHERE cache = ?1 AND url = ?2",
                    params![name, url],
                    |r| r.get(0),
                )
                .optional()?)
            })
            .await?)
    }

    pub async fn put(&self, url: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let (name, url) = (self.name, url.to_string());
        self.store
            .conn
            .call(move |c| {
                c.execute(
                    "INSERT INTO cache_entries (cache, url, body, stored_at) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(cache, url) DO UPDATE SET body = excluded.body, stored_at = excluded.stored_at",
                    params![name, url, body, Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Drop every entry of this cache.
    pub async fn purge(&self) -> Result<usize, StoreError> {
        let name = self.name;
        Ok(self
            .store
            .conn
            .call(move |c| Ok(c.execute("DELETE FROM cache_entries WHERE cache = ?1", params![name])?))
            .await?)
    }
}

/// Owner of the persisted session marker.
///
/// The confirmer is the only writer; the guard and status readers go
/// through [`SessionStore::load`].
#[derive(Clone)]
pub struct SessionStore {
    store: Store,
}

impl SessionStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Current marker; a missing or unreadable entry is anonymous.
    pub async fn load(&self) -> Session {
        match self.store.get(SESSION_KEY).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "discarding malformed session marker");
                Session::anonymous()
            }),
            Ok(None) => Session::anonymous(),
            Err(e) => {
                tracing::warn!(error = %e, "session marker unreadable");
                Session::anonymous()
            }
        }
    }

    pub async fn persist(&self, session: &Session) -> Result<(), StoreError> {
        self.store.set(SESSION_KEY, &serde_json::to_string(session)?).await
    }

    pub async fn clear(&self) -> Result<bool, StoreError> {
        self.store.remove(SESSION_KEY).await
    }
}
