//! User audio preferences
//!
//! Read-mostly values owned by a preference store; the player reads them
//! at every step activation and writes `extra_time_seconds` when the user
//! asks for more time.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How cues are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundMode {
    /// Cloud text-to-speech, falling back to on-device synthesis
    #[default]
    Voice,
    /// On-device synthesis only
    Synth,
    /// Tones only
    Beep,
    /// Pre-recorded clips referenced by the workout
    Clips,
    /// Silent
    None,
}

impl SoundMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoundMode::Voice => "voice",
            SoundMode::Synth => "synth",
            SoundMode::Beep => "beep",
            SoundMode::Clips => "clips",
            SoundMode::None => "none",
        }
    }

    /// Modes that speak text aloud
    pub fn speaks(&self) -> bool {
        matches!(self, SoundMode::Voice | SoundMode::Synth)
    }
}

impl fmt::Display for SoundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SoundMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "voice" => Ok(SoundMode::Voice),
            "synth" => Ok(SoundMode::Synth),
            "beep" | "bip" => Ok(SoundMode::Beep),
            "clips" | "beppe" => Ok(SoundMode::Clips),
            "none" | "off" => Ok(SoundMode::None),
            other => Err(Error::InvalidInput(format!("Unknown sound mode: {}", other))),
        }
    }
}

/// Audio-related preferences of the current user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAudioPreferences {
    pub sound_mode: SoundMode,
    /// Output volume (0.0-1.0)
    pub volume: f32,
    /// Standing extra seconds added to every exercise step
    pub extra_time_seconds: u32,
}

impl UserAudioPreferences {
    pub fn new(sound_mode: SoundMode, volume: f32, extra_time_seconds: u32) -> Self {
        Self {
            sound_mode,
            volume: clamp_volume(volume),
            extra_time_seconds,
        }
    }

    pub fn with_sound_mode(mut self, mode: SoundMode) -> Self {
        self.sound_mode = mode;
        self
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = clamp_volume(volume);
    }
}

impl Default for UserAudioPreferences {
    fn default() -> Self {
        Self {
            sound_mode: SoundMode::Voice,
            volume: 1.0,
            extra_time_seconds: 0,
        }
    }
}

/// Clamp a volume to 0.0-1.0; NaN is treated as silence
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}
