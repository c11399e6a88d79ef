use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use rusqlite::Connection;

use crate::errors::{BrewError, Result};

/// Async-safe handle to the brew day database.
///
/// Wraps the connection behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// ties up async worker threads. The recipe, timeline and summary stores all
/// share one handle.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<Connection>>,
}

impl std::fmt::Debug for DbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbHandle").finish_non_exhaustive()
    }
}

impl DbHandle {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database {}", path.display()))?;
        Self::init(conn)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        run_migrations(&conn).context("Failed to run migrations")?;
        Ok(Self {
            inner: Arc::new(std::sync::Mutex::new(conn)),
        })
    }

    /// Run a closure with access to the connection on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| BrewError::Upstream(anyhow::anyhow!("DB lock poisoned: {}", e)))?;
            f(&guard)
        })
        .await
        .map_err(|e| BrewError::Upstream(anyhow::Error::new(e).context("DB task panicked")))?
    }
}

fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS recipes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            status INTEGER NOT NULL DEFAULT 0,
            status_args TEXT NOT NULL DEFAULT '[]',
            body TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS recipe_results (
            recipe_id TEXT PRIMARY KEY,
            hot_wort_vol REAL NOT NULL DEFAULT 0,
            original_sg REAL NOT NULL DEFAULT 0,
            final_sg REAL NOT NULL DEFAULT 0,
            alcohol REAL NOT NULL DEFAULT 0,
            main_ferm_vol REAL NOT NULL DEFAULT 0,
            vol_bb REAL NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS dates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe_id TEXT NOT NULL,
            name TEXT NOT NULL,
            date TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS bool_flags (
            recipe_id TEXT NOT NULL,
            name TEXT NOT NULL,
            value INTEGER NOT NULL,
            UNIQUE(recipe_id, name)
        );

        CREATE TABLE IF NOT EXISTS sg_measurements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe_id TEXT NOT NULL,
            value REAL NOT NULL,
            date TEXT NOT NULL,
            is_final INTEGER NOT NULL DEFAULT 0,
            notes TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS sugar_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe_id TEXT NOT NULL,
            water REAL NOT NULL,
            amount REAL NOT NULL,
            alcohol REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS timelines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe_id TEXT NOT NULL,
            timestamp_ns INTEGER NOT NULL,
            event TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS summaries (
            recipe_id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL,
            evaporation REAL NOT NULL DEFAULT 0,
            efficiency REAL NOT NULL DEFAULT 0,
            rendered TEXT
        );

        CREATE TABLE IF NOT EXISTS summary_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe_id TEXT NOT NULL REFERENCES summaries(recipe_id) ON DELETE CASCADE,
            entry TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_dates_recipe ON dates(recipe_id, name);
        CREATE INDEX IF NOT EXISTS idx_sg_recipe ON sg_measurements(recipe_id);
        CREATE INDEX IF NOT EXISTS idx_timelines_recipe ON timelines(recipe_id);
        CREATE INDEX IF NOT EXISTS idx_summary_entries_recipe ON summary_entries(recipe_id);
        ",
    )
    .context("Failed to create tables")?;
    Ok(())
}
