//! Maps app ids onto their SQLite history files.
//!
//! Every app gets its own `<id>.db` under the data directory. Nothing is
//! cached here: each call opens a fresh connection which lives exactly as
//! long as the returned [`EntityStore`].

use std::{io, path::PathBuf, time::Duration};

use rusqlite::{ffi, params};
use tokio::fs;
use tokio_rusqlite::Connection;
use tracing::debug;

use super::{AppId, error::HistoryError};

const DB_EXTENSION: &str = "db";
const SIDECAR_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS records (
    time  INTEGER NOT NULL PRIMARY KEY,
    count INTEGER NOT NULL CHECK (count >= 0)
)";

#[derive(Debug, Clone)]
pub struct StoreRegistry {
    dir: PathBuf,
}

impl StoreRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, app_id: AppId) -> PathBuf {
        self.dir.join(format!("{app_id}.{DB_EXTENSION}"))
    }

    /// Opens the store for `app_id`, creating the directory
    /// and an empty schema if this is the first access
    pub async fn resolve(&self, app_id: AppId) -> Result<EntityStore, HistoryError> {
        fs::create_dir_all(&self.dir).await?;
        self.open(app_id).await
    }

    /// Like [`Self::resolve`] but never provisions a missing store
    pub async fn open_existing(&self, app_id: AppId) -> Result<EntityStore, HistoryError> {
        if !fs::try_exists(self.path_for(app_id)).await? {
            return Err(HistoryError::StoreNotFound(app_id));
        }
        self.open(app_id).await
    }

    async fn open(&self, app_id: AppId) -> Result<EntityStore, HistoryError> {
        let path = self.path_for(app_id);
        debug!(app_id, path = %path.display(), "opening store");

        let conn = Connection::open(&path).await?;
        conn.call(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute(SCHEMA, ())?;
            Ok(())
        })
        .await?;

        Ok(EntityStore { conn })
    }

    /// Deletes the store file for `app_id`.
    /// Callers must have dropped every [`EntityStore`] for it first.
    pub async fn remove(&self, app_id: AppId) -> Result<(), HistoryError> {
        let path = self.path_for(app_id);
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(HistoryError::StoreNotFound(app_id));
            }
            Err(e) => return Err(e.into()),
        }

        for suffix in SIDECAR_SUFFIXES {
            let mut sidecar = path.clone().into_os_string();
            sidecar.push(suffix);
            match fs::remove_file(&sidecar).await {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        }

        debug!(app_id, "removed store");
        Ok(())
    }

    /// App ids that currently have a store on disk, ascending
    pub async fn list(&self) -> Result<Vec<AppId>, HistoryError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DB_EXTENSION) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<AppId>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

/// Open handle on one app's history file.
/// The connection closes when this is dropped.
pub struct EntityStore {
    conn: Connection,
}

/// Result of a single guarded insert
enum Insert {
    Inserted,
    Duplicate,
}

impl EntityStore {
    /// Inserts one row in its own transaction.
    /// Returns `false` if a row already exists at `time_secs`.
    pub async fn insert(&self, time_secs: i64, count: i64) -> Result<bool, HistoryError> {
        let res = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let res = tx.execute(
                    "INSERT INTO records (time, count) VALUES (?1, ?2)",
                    params![time_secs, count],
                );
                match res {
                    Ok(_) => {
                        tx.commit()?;
                        Ok(Insert::Inserted)
                    }
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
                    {
                        // dropping tx rolls back
                        Ok(Insert::Duplicate)
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await?;
        Ok(matches!(res, Insert::Inserted))
    }

    /// Every row as `(unix seconds, count)`, oldest first
    pub async fn rows(&self) -> Result<Vec<(i64, i64)>, HistoryError> {
        Ok(self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT time, count FROM records ORDER BY time")?;
                let rows = stmt
                    .query_map((), |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<(i64, i64)>, _>>()?;
                Ok(rows)
            })
            .await?)
    }

    /// Highest count within `[start, end]`, earliest time on ties
    pub async fn peak(
        &self,
        start_secs: i64,
        end_secs: i64,
    ) -> Result<Option<(i64, i64)>, HistoryError> {
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT time, count FROM records
                     WHERE time BETWEEN ?1 AND ?2
                     ORDER BY count DESC, time ASC
                     LIMIT 1",
                )?;
                let mut rows = stmt.query(params![start_secs, end_secs])?;
                Ok(match rows.next()? {
                    Some(row) => Some((row.get(0)?, row.get(1)?)),
                    None => None,
                })
            })
            .await?)
    }

    /// Deletes every zero count row, returning how many went
    pub async fn delete_zero_counts(&self) -> Result<usize, HistoryError> {
        Ok(self
            .conn
            .call(|conn| {
                let tx = conn.transaction()?;
                let removed = tx.execute("DELETE FROM records WHERE count = 0", ())?;
                tx.commit()?;
                Ok(removed)
            })
            .await?)
    }

    /// Closes the connection, surfacing any error SQLite reports on close
    pub async fn close(self) -> Result<(), HistoryError> {
        Ok(self.conn.close().await?)
    }
}
