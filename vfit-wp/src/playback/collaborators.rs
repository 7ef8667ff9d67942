//! Collaborators the playback engine hands work to
//!
//! Preferences are read on every step activation and written when the user
//! adds time. Finished workouts go to a completion reporter. The SQLite
//! implementations live in [`crate::db`].

use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::watch;
use vfit_common::events::CompletionSummary;
use vfit_common::prefs::{SoundMode, UserAudioPreferences};

/// Read-mostly store of the user's audio preferences
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Cached value; never blocks
    fn current(&self) -> UserAudioPreferences;

    /// Add to the standing extra time given to every exercise step
    async fn add_extra_time(&self, seconds: u32) -> Result<UserAudioPreferences>;

    async fn reset_extra_time(&self) -> Result<UserAudioPreferences>;

    async fn set_sound_mode(&self, mode: SoundMode) -> Result<UserAudioPreferences>;

    /// Volume is clamped to 0.0-1.0
    async fn set_volume(&self, volume: f32) -> Result<UserAudioPreferences>;
}

/// Receives the summary of every completed workout
#[async_trait]
pub trait CompletionReporter: Send + Sync {
    async fn record(&self, summary: &CompletionSummary) -> Result<()>;
}

/// Preferences held in memory only (headless runs and tests)
pub struct InMemoryPreferences {
    value: watch::Sender<UserAudioPreferences>,
}

impl InMemoryPreferences {
    pub fn new(initial: UserAudioPreferences) -> Self {
        let (value, _) = watch::channel(initial);
        Self { value }
    }

    /// Observe every change
    pub fn subscribe(&self) -> watch::Receiver<UserAudioPreferences> {
        self.value.subscribe()
    }

    fn update(&self, f: impl FnOnce(&mut UserAudioPreferences)) -> UserAudioPreferences {
        self.value.send_modify(f);
        self.value.borrow().clone()
    }
}

impl Default for InMemoryPreferences {
    fn default() -> Self {
        Self::new(UserAudioPreferences::default())
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferences {
    fn current(&self) -> UserAudioPreferences {
        self.value.borrow().clone()
    }

    async fn add_extra_time(&self, seconds: u32) -> Result<UserAudioPreferences> {
        Ok(self.update(|p| p.extra_time_seconds = p.extra_time_seconds.saturating_add(seconds)))
    }

    async fn reset_extra_time(&self) -> Result<UserAudioPreferences> {
        Ok(self.update(|p| p.extra_time_seconds = 0))
    }

    async fn set_sound_mode(&self, mode: SoundMode) -> Result<UserAudioPreferences> {
        Ok(self.update(|p| p.sound_mode = mode))
    }

    async fn set_volume(&self, volume: f32) -> Result<UserAudioPreferences> {
        Ok(self.update(|p| p.set_volume(volume)))
    }
}

/// Drops summaries
pub struct NoopReporter;

#[async_trait]
impl CompletionReporter for NoopReporter {
    async fn record(&self, _summary: &CompletionSummary) -> Result<()> {
        Ok(())
    }
}
