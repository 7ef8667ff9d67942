//! Event types for the vfit event system
//!
//! Provides the shared `PlayerEvent` definitions and the `EventBus` that
//! fans them out to the API's SSE stream, the CLI and tests.

mod playback_types;
mod shared_types;

pub use playback_types::{CueFiredKind, PlaybackStatus, StepKind, WarningLevel};
pub use shared_types::{
    BlockPosition, CompletionSummary, EquipmentEntry, ProgressSnapshot, StepPreview,
};

use crate::prefs::UserAudioPreferences;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Workout player events
///
/// Events are broadcast via EventBus and serialized as-is for SSE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// A workout sequence was built and playback began
    WorkoutStarted {
        session_id: Uuid,
        workout_name: String,
        total_steps: usize,
        start_index: usize,
        timestamp: DateTime<Utc>,
    },

    /// A step became current (start, advance, skip)
    StepStarted {
        session_id: Uuid,
        snapshot: ProgressSnapshot,
        timestamp: DateTime<Utc>,
    },

    /// The displayed countdown changed
    ///
    /// Emitted at most once per displayed second, plus on pause/resume and
    /// added time.
    Progress {
        session_id: Uuid,
        snapshot: ProgressSnapshot,
        timestamp: DateTime<Utc>,
    },

    /// Playback status changed (Running ↔ Paused, → Finished, → Idle)
    PlaybackStateChanged {
        old_state: PlaybackStatus,
        new_state: PlaybackStatus,
        timestamp: DateTime<Utc>,
    },

    /// A countdown threshold fired for the current step
    CueFired {
        session_id: Uuid,
        step_index: usize,
        threshold: u32,
        cue: CueFiredKind,
        timestamp: DateTime<Utc>,
    },

    /// The upcoming step is being previewed
    PreviewShown {
        session_id: Uuid,
        step_index: usize,
        /// None when the current step is the last one
        next: Option<StepPreview>,
        timestamp: DateTime<Utc>,
    },

    /// Sequence exhausted
    WorkoutCompleted {
        session_id: Uuid,
        summary: CompletionSummary,
        timestamp: DateTime<Utc>,
    },

    /// User left the workout before the end
    WorkoutExited {
        session_id: Uuid,
        step_index: usize,
        timestamp: DateTime<Utc>,
    },

    /// Stored audio preferences changed
    PreferencesChanged {
        preferences: UserAudioPreferences,
        timestamp: DateTime<Utc>,
    },
}

impl PlayerEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::WorkoutStarted { .. } => "WorkoutStarted",
            PlayerEvent::StepStarted { .. } => "StepStarted",
            PlayerEvent::Progress { .. } => "Progress",
            PlayerEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            PlayerEvent::CueFired { .. } => "CueFired",
            PlayerEvent::PreviewShown { .. } => "PreviewShown",
            PlayerEvent::WorkoutCompleted { .. } => "WorkoutCompleted",
            PlayerEvent::WorkoutExited { .. } => "WorkoutExited",
            PlayerEvent::PreferencesChanged { .. } => "PreferencesChanged",
        }
    }

    /// Snapshot carried by the event, if any
    pub fn snapshot(&self) -> Option<&ProgressSnapshot> {
        match self {
            PlayerEvent::StepStarted { snapshot, .. } | PlayerEvent::Progress { snapshot, .. } => {
                Some(snapshot)
            }
            _ => None,
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over a tokio broadcast channel. Slow subscribers lag and
/// lose the oldest events; the player never blocks on observers.
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use vfit_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
