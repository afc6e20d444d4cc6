//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for members, notifications and status-change
//! requests. Query functions take a `&mut SqliteConnection` so callers can run
//! several of them inside one transaction.

pub mod members;
pub mod notifications;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;

use crate::errors::AppError;

/// Owner of the connection pool; hands out units of work.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a unit of work. Dropping it without `commit` discards every write.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin().await?)
    }
}

/// Current time as stored in the database.
///
/// Fixed-width UTC so that text ordering matches chronological ordering.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cohorts (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS departments (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS members (
            id TEXT PRIMARY KEY,
            nra TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            cohort_id TEXT NOT NULL REFERENCES cohorts(id),
            department_id TEXT REFERENCES departments(id),
            membership_status TEXT NOT NULL
                CHECK (membership_status IN ('active', 'inactive')),
            role TEXT NOT NULL
                CHECK (role IN ('member', 'board', 'alumni', 'advisory_board', 'supervisory_board')),
            inaugurated_on TEXT,
            email TEXT,
            phone TEXT,
            password_hash TEXT,
            login_token TEXT,
            photo TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            target_member_id TEXT NOT NULL REFERENCES members(id),
            from_member_id TEXT NOT NULL REFERENCES members(id),
            type TEXT NOT NULL,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            metadata TEXT,
            pending INTEGER NOT NULL DEFAULT 0,
            accepted INTEGER,
            read_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // The request points at its notification; the notification never points back.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS status_change_requests (
            id TEXT PRIMARY KEY,
            notification_id TEXT NOT NULL UNIQUE REFERENCES notifications(id),
            target_member_id TEXT NOT NULL REFERENCES members(id),
            requested_by_member_id TEXT NOT NULL REFERENCES members(id),
            from_role TEXT NOT NULL,
            to_role TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'accepted', 'rejected')),
            processed_at TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_members_login_token ON members(login_token);
        CREATE INDEX IF NOT EXISTS idx_notifications_target ON notifications(target_member_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_notifications_from ON notifications(from_member_id);
        CREATE INDEX IF NOT EXISTS idx_status_change_requests_target ON status_change_requests(target_member_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
