use crate::error::{AppError, AppResult};
use log::{error, info, warn};
use rocket::tokio::{task, time};
use rusqlite::{Connection, ErrorCode, Result as SqliteResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const SCHEMA_VERSION: &str = "20250301-1";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS channels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    thumbnail_url TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS videos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    channel_id INTEGER NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
    external_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    thumbnail_url TEXT,
    published_at TEXT,
    caption_text TEXT,
    caption_language TEXT,
    short_summary TEXT,
    detailed_summary TEXT,
    processing_status TEXT NOT NULL DEFAULT 'pending'
        CHECK (processing_status IN ('pending', 'processing', 'completed', 'failed')),
    error_message TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS ix_videos_channel_published ON videos (channel_id, published_at);
CREATE INDEX IF NOT EXISTS ix_videos_status_created ON videos (processing_status, created_at);
";

/// Retry policy for transient datastore failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.pow(attempt)
    }
}

/// Handle to the SQLite datastore. Every operation opens its own short-lived connection
/// on the blocking thread pool, so lock waits never park an async worker.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    retry: RetryPolicy,
}

impl Database {
    /// Open the database at `path`, creating the schema if needed.
    pub async fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        Self::open_with_retry(path, RetryPolicy::default()).await
    }

    pub async fn open_with_retry(path: impl AsRef<Path>, retry: RetryPolicy) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).ok();
        }

        let db = Database { path, retry };
        db.with_connection(init_database).await?;
        info!("Database ready at {}", db.path.display());
        Ok(db)
    }

    fn connect(path: &Path) -> SqliteResult<Connection> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Run `op` on a fresh connection, retrying with exponential backoff on transient failures.
    pub async fn with_connection<T, F>(&self, op: F) -> AppResult<T>
    where
        F: Fn(&Connection) -> SqliteResult<T> + Send + Sync + 'static,
        T: Send + 'static,
    {
        let op = Arc::new(op);
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let path = self.path.clone();
            let run = Arc::clone(&op);
            let result = task::spawn_blocking(move || {
                Self::connect(&path).and_then(|conn| run(&conn))
            })
            .await
            .map_err(|e| AppError::Internal(format!("database task failed: {e}")))?;

            match result {
                Ok(value) => return Ok(value),
                Err(e) if is_transient(&e) && attempt + 1 < attempts => {
                    let wait = self.retry.delay_for(attempt);
                    warn!(
                        "Database operation failed (attempt {}/{attempts}). Retrying in {wait:?}... Error: {e}",
                        attempt + 1
                    );
                    time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    if is_transient(&e) {
                        error!("Database operation failed after {attempts} attempts: {e}");
                    }
                    return Err(e.into());
                }
            }
        }
    }

    pub async fn ping(&self) -> bool {
        self.with_connection(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .map(|v| v == 1)
            .unwrap_or(false)
    }
}

fn init_database(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(SCHEMA)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}

pub fn is_transient(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => matches!(
            err.code,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen
        ),
        _ => false,
    }
}
