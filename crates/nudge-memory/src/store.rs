//! SQLite-backed persistent store.
//!
//! - `users`: per-chat species and task
//! - `ongoing`: restart-recovery markers for chats with a live timer

mod ongoing;
mod users;


pub use users::{UserState, DEFAULT_TASK};

use nudge_core::{config::MemoryConfig, error::NudgeError, shellexpand};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Embedded schema migrations, applied in order and recorded in `_migrations`.
const MIGRATIONS: &[(&str, &str)] = &[("001_init", include_str!("../migrations/001_init.sql"))];

/// Persistent store backed by SQLite.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the database at `config.db_path` and bring its schema up to date.
    pub async fn new(config: &MemoryConfig) -> Result<Self, NudgeError> {
        let db_path = shellexpand(&config.db_path);

        if let Some(dir) = Path::new(&db_path).parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| NudgeError::Memory(format!("failed to create data dir: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| NudgeError::Memory(format!("invalid db path {db_path}: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| NudgeError::Memory(format!("failed to open {db_path}: {e}")))?;

        Self::run_migrations(&pool).await?;
        info!("Store initialized at {db_path}");
        Ok(Self { pool })
    }

    /// Row counts: (users, ongoing markers).
    pub async fn stats(&self) -> Result<(i64, i64), NudgeError> {
        let users = self.count("reminder_users").await?;
        let ongoing = self.count("ongoing_processes").await?;
        Ok((users, ongoing))
    }

    async fn count(&self, table: &'static str) -> Result<i64, NudgeError> {
        let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| NudgeError::Memory(format!("count {table} failed: {e}")))?;
        Ok(n)
    }

    /// Apply every migration not yet listed in `_migrations`.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), NudgeError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| NudgeError::Memory(format!("failed to create migrations table: {e}")))?;

        let applied: Vec<(String,)> = sqlx::query_as("SELECT name FROM _migrations")
            .fetch_all(pool)
            .await
            .map_err(|e| NudgeError::Memory(format!("failed to list migrations: {e}")))?;

        for (name, sql) in MIGRATIONS {
            if applied.iter().any(|(done,)| done == name) {
                continue;
            }

            let mut tx = pool
                .begin()
                .await
                .map_err(|e| NudgeError::Memory(format!("migration {name}: {e}")))?;
            sqlx::raw_sql(sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| NudgeError::Memory(format!("migration {name} failed: {e}")))?;
            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(&mut *tx)
                .await
                .map_err(|e| NudgeError::Memory(format!("failed to record {name}: {e}")))?;
            tx.commit()
                .await
                .map_err(|e| NudgeError::Memory(format!("migration {name}: {e}")))?;

            info!("applied migration {name}");
        }
        Ok(())
    }
}
