//! Database access layer
//!
//! SQLite storage for audio preferences (key/value `settings` table) and
//! the history of completed workouts.

pub mod history;
pub mod settings;

pub use history::{HistoryEntry, HistoryStore};
pub use settings::SettingsStore;

use crate::error::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::info;

/// Database file name inside the data folder
pub const DATABASE_FILE: &str = "vfit.db";

pub fn database_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DATABASE_FILE)
}

/// Open (creating if needed) the database at `db_path` and its tables
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_tables(&pool).await?;
    init_settings_defaults(&pool).await?;

    Ok(pool)
}

/// Private in-memory database with the full schema.
///
/// Limited to one connection: every SQLite memory connection is its own
/// database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    create_tables(&pool).await?;
    init_settings_defaults(&pool).await?;

    Ok(pool)
}

async fn create_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workout_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            workout_name TEXT NOT NULL,
            completed_at TIMESTAMP NOT NULL,
            elapsed_seconds INTEGER NOT NULL,
            exercise_count INTEGER NOT NULL,
            equipment TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Make sure every preference has a value.
///
/// Missing keys and NULL values are set to the defaults; stored values are
/// left alone.
pub async fn init_settings_defaults(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, settings::SOUND_MODE_KEY, "voice").await?;
    ensure_setting(pool, settings::VOLUME_KEY, "1.0").await?;
    ensure_setting(pool, settings::EXTRA_TIME_KEY, "0").await?;
    Ok(())
}

async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        WHERE settings.value IS NULL
        "#,
    )
    .bind(key)
    .bind(default_value)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_file_and_defaults() {
        let dir = TempDir::new().unwrap();
        let path = database_path(&dir.path().join("nested"));

        let pool = init_database(&path).await.unwrap();
        assert!(path.exists());

        let mode: Option<String> = settings::get_setting(&pool, settings::SOUND_MODE_KEY)
            .await
            .unwrap();
        assert_eq!(mode.as_deref(), Some("voice"));
    }

    #[tokio::test]
    async fn test_defaults_do_not_overwrite_and_repair_null() {
        let pool = init_memory_database().await.unwrap();
        settings::set_setting(&pool, settings::VOLUME_KEY, 0.25).await.unwrap();
        sqlx::query("UPDATE settings SET value = NULL WHERE key = ?")
            .bind(settings::EXTRA_TIME_KEY)
            .execute(&pool)
            .await
            .unwrap();

        init_settings_defaults(&pool).await.unwrap();

        let volume: Option<f32> = settings::get_setting(&pool, settings::VOLUME_KEY).await.unwrap();
        let extra: Option<u32> = settings::get_setting(&pool, settings::EXTRA_TIME_KEY).await.unwrap();
        assert_eq!(volume, Some(0.25));
        assert_eq!(extra, Some(0));
    }
}
