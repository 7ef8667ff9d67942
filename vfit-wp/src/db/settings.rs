//! Settings database access
//!
//! Audio preferences stored in the `settings` key/value table, and
//! [`SettingsStore`], the cached write-through [`PreferenceStore`] the
//! engine reads on every step activation.

use crate::error::{Error, Result};
use crate::playback::PreferenceStore;
use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};
use vfit_common::prefs::{SoundMode, UserAudioPreferences};

pub const SOUND_MODE_KEY: &str = "sound_mode";
pub const VOLUME_KEY: &str = "volume";
pub const EXTRA_TIME_KEY: &str = "extra_time_seconds";

/// Generic setting getter
///
/// Missing keys and NULL values read as `None`.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value.flatten() {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter (insert or update)
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

/// Read the stored preferences.
///
/// Unreadable values fall back to their defaults.
pub async fn load_preferences(db: &Pool<Sqlite>) -> Result<UserAudioPreferences> {
    let defaults = UserAudioPreferences::default();

    let sound_mode = or_default(get_setting::<SoundMode>(db, SOUND_MODE_KEY).await, defaults.sound_mode)?;
    let volume = or_default(get_setting::<f32>(db, VOLUME_KEY).await, defaults.volume)?;
    let extra = or_default(get_setting::<u32>(db, EXTRA_TIME_KEY).await, defaults.extra_time_seconds)?;

    Ok(UserAudioPreferences::new(sound_mode, volume, extra))
}

fn or_default<T>(value: Result<Option<T>>, default: T) -> Result<T> {
    match value {
        Ok(Some(v)) => Ok(v),
        Ok(None) => Ok(default),
        Err(Error::Config(msg)) => {
            warn!("{}; using default", msg);
            Ok(default)
        }
        Err(e) => Err(e),
    }
}

pub async fn save_preferences(db: &Pool<Sqlite>, prefs: &UserAudioPreferences) -> Result<()> {
    set_setting(db, SOUND_MODE_KEY, prefs.sound_mode.as_str()).await?;
    set_setting(db, VOLUME_KEY, prefs.volume).await?;
    set_setting(db, EXTRA_TIME_KEY, prefs.extra_time_seconds).await?;
    Ok(())
}

/// Preferences cached in memory and written through to SQLite
pub struct SettingsStore {
    db: Pool<Sqlite>,
    cache: watch::Sender<UserAudioPreferences>,
    /// Serialises read-modify-write updates
    write_lock: Mutex<()>,
}

impl SettingsStore {
    pub async fn open(db: Pool<Sqlite>) -> Result<Self> {
        let prefs = load_preferences(&db).await?;
        debug!(
            "Loaded preferences: mode={}, volume={:.2}, extra={}s",
            prefs.sound_mode, prefs.volume, prefs.extra_time_seconds
        );
        let (cache, _) = watch::channel(prefs);

        Ok(Self {
            db,
            cache,
            write_lock: Mutex::new(()),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<UserAudioPreferences> {
        self.cache.subscribe()
    }

    async fn update(&self, f: impl FnOnce(&mut UserAudioPreferences)) -> Result<UserAudioPreferences> {
        let _guard = self.write_lock.lock().await;

        let mut prefs = self.cache.borrow().clone();
        f(&mut prefs);
        save_preferences(&self.db, &prefs).await?;

        self.cache.send_replace(prefs.clone());
        Ok(prefs)
    }
}

#[async_trait]
impl PreferenceStore for SettingsStore {
    fn current(&self) -> UserAudioPreferences {
        self.cache.borrow().clone()
    }

    async fn add_extra_time(&self, seconds: u32) -> Result<UserAudioPreferences> {
        self.update(|p| p.extra_time_seconds = p.extra_time_seconds.saturating_add(seconds))
            .await
    }

    async fn reset_extra_time(&self) -> Result<UserAudioPreferences> {
        self.update(|p| p.extra_time_seconds = 0).await
    }

    async fn set_sound_mode(&self, mode: SoundMode) -> Result<UserAudioPreferences> {
        self.update(|p| p.sound_mode = mode).await
    }

    async fn set_volume(&self, volume: f32) -> Result<UserAudioPreferences> {
        self.update(|p| p.set_volume(volume)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;

    #[tokio::test]
    async fn test_get_and_set_setting() {
        let db = init_memory_database().await.unwrap();

        set_setting(&db, "custom", 42).await.unwrap();
        assert_eq!(get_setting::<u32>(&db, "custom").await.unwrap(), Some(42));
        assert_eq!(get_setting::<u32>(&db, "missing").await.unwrap(), None);

        set_setting(&db, "custom", "not a number").await.unwrap();
        assert!(matches!(
            get_setting::<u32>(&db, "custom").await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_values_fall_back_to_defaults() {
        let db = init_memory_database().await.unwrap();
        set_setting(&db, SOUND_MODE_KEY, "loud").await.unwrap();
        set_setting(&db, VOLUME_KEY, 7.5).await.unwrap();

        let prefs = load_preferences(&db).await.unwrap();
        assert_eq!(prefs.sound_mode, SoundMode::Voice);
        // Stored out-of-range volume is clamped on load
        assert_eq!(prefs.volume, 1.0);
    }

    #[tokio::test]
    async fn test_store_writes_through() {
        let db = init_memory_database().await.unwrap();
        let store = SettingsStore::open(db.clone()).await.unwrap();

        store.set_sound_mode(SoundMode::Beep).await.unwrap();
        store.set_volume(0.4).await.unwrap();
        store.add_extra_time(10).await.unwrap();
        let prefs = store.add_extra_time(10).await.unwrap();
        assert_eq!(prefs.extra_time_seconds, 20);
        assert_eq!(store.current(), prefs);

        // A second store over the same database sees the writes
        let reopened = SettingsStore::open(db).await.unwrap();
        let stored = reopened.current();
        assert_eq!(stored.sound_mode, SoundMode::Beep);
        assert!((stored.volume - 0.4).abs() < 1e-6);
        assert_eq!(stored.extra_time_seconds, 20);

        let prefs = reopened.reset_extra_time().await.unwrap();
        assert_eq!(prefs.extra_time_seconds, 0);
    }
}
