//! Shared player state
//!
//! Read side of the playback engine: the latest status and progress
//! snapshot, plus the event bus observers subscribe to. Only the engine
//! task writes here.

use tokio::sync::{broadcast, RwLock};
use vfit_common::events::{EventBus, PlaybackStatus, PlayerEvent, ProgressSnapshot};

/// Shared state accessible by all components
///
/// Uses RwLock for concurrent read access with rare writes
pub struct SharedState {
    /// Current playback status
    pub status: RwLock<PlaybackStatus>,

    /// Latest progress snapshot (None before the first workout starts)
    pub snapshot: RwLock<Option<ProgressSnapshot>>,

    /// Event broadcaster for SSE, CLI and tests
    pub events: EventBus,
}

impl SharedState {
    pub fn new(event_capacity: usize) -> Self {
        Self {
            status: RwLock::new(PlaybackStatus::Idle),
            snapshot: RwLock::new(None),
            events: EventBus::new(event_capacity),
        }
    }

    /// Broadcast an event to all listeners
    pub fn broadcast_event(&self, event: PlayerEvent) {
        self.events.emit_lossy(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub async fn get_status(&self) -> PlaybackStatus {
        *self.status.read().await
    }

    pub async fn set_status(&self, status: PlaybackStatus) {
        *self.status.write().await = status;
    }

    pub async fn get_snapshot(&self) -> Option<ProgressSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Store `snapshot` and mirror its status
    pub async fn set_snapshot(&self, snapshot: ProgressSnapshot) {
        *self.status.write().await = snapshot.status;
        *self.snapshot.write().await = Some(snapshot);
    }

    pub async fn clear_snapshot(&self) {
        *self.snapshot.write().await = None;
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vfit_common::events::{StepKind, WarningLevel};

    fn snapshot(status: PlaybackStatus) -> ProgressSnapshot {
        ProgressSnapshot {
            status,
            current_index: 2,
            total_steps: 10,
            remaining_seconds: 17,
            duration_seconds: 30,
            step_kind: StepKind::WorkExercise,
            position: None,
            display_name: "Squat".to_string(),
            image_ref: None,
            reps: None,
            equipment: None,
            warning: WarningLevel::Normal,
            preview_active: false,
            percent_complete: 30,
        }
    }

    #[tokio::test]
    async fn test_default_is_idle() {
        let state = SharedState::default();
        assert_eq!(state.get_status().await, PlaybackStatus::Idle);
        assert!(state.get_snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_updates_status() {
        let state = SharedState::default();

        state.set_snapshot(snapshot(PlaybackStatus::Paused)).await;

        assert_eq!(state.get_status().await, PlaybackStatus::Paused);
        assert_eq!(state.get_snapshot().await.unwrap().remaining_seconds, 17);

        state.clear_snapshot().await;
        assert!(state.get_snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let state = SharedState::default();
        let mut rx = state.subscribe_events();

        state.broadcast_event(PlayerEvent::PlaybackStateChanged {
            old_state: PlaybackStatus::Running,
            new_state: PlaybackStatus::Paused,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "PlaybackStateChanged");
    }
}
