//! Playback-related type definitions
//!
//! Supporting enums for session status, step kinds, countdown styling and
//! fired cues.

use serde::{Deserialize, Serialize};

/// Playback session status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// No workout running (sequence may be loaded)
    #[default]
    Idle,
    /// Countdown running
    Running,
    /// Countdown frozen
    Paused,
    /// Sequence exhausted, summary available
    Finished,
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackStatus::Idle => write!(f, "idle"),
            PlaybackStatus::Running => write!(f, "running"),
            PlaybackStatus::Paused => write!(f, "paused"),
            PlaybackStatus::Finished => write!(f, "finished"),
        }
    }
}

/// Kind of a sequence step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Fixed-duration interstitial ("REST", "Good Job", ...)
    Label,
    WarmUpExercise,
    WorkExercise,
}

impl StepKind {
    pub fn is_label(&self) -> bool {
        matches!(self, StepKind::Label)
    }
}

/// Visual escalation of the countdown as it nears zero
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    #[default]
    Normal,
    /// Next step is being previewed
    Notice,
    Warning,
    Critical,
}

/// A countdown threshold that fired, as reported to observers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CueFiredKind {
    /// "N seconds remaining" announcement
    TimeRemaining { seconds: u32 },
    /// Next step preview
    Preview,
    /// Countdown styling escalated
    Warning { level: WarningLevel },
    /// Spoken "five, four, three, two, one"
    FinalCountdown,
}
