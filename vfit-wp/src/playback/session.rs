//! Playback session
//!
//! All mutable state of one workout run, owned by the controller.

use crate::countdown::Countdown;
use crate::sequence::Step;
use tokio::time::Instant;
use uuid::Uuid;
use vfit_common::events::{PlaybackStatus, WarningLevel};

#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub id: Uuid,
    pub workout_name: String,
    /// Built once, never mutated during playback
    pub sequence: Vec<Step>,
    /// `sequence.len()` once finished
    pub current_index: usize,
    pub status: PlaybackStatus,
    /// Countdown of the current step activation
    pub countdown: Option<Countdown>,
    /// Seconds the current step was activated with, extra time included
    pub step_duration: u32,
    pub preview_shown: bool,
    pub warning: WarningLevel,
    /// Activation counter value of the current step
    pub activation: u64,
    pub started_at: Option<Instant>,
}

impl PlaybackSession {
    pub fn new(workout_name: impl Into<String>, sequence: Vec<Step>) -> Self {
        let step_duration = sequence.first().map(|s| s.duration_secs).unwrap_or(0);
        Self {
            id: Uuid::new_v4(),
            workout_name: workout_name.into(),
            sequence,
            current_index: 0,
            status: PlaybackStatus::Idle,
            countdown: None,
            step_duration,
            preview_shown: false,
            warning: WarningLevel::Normal,
            activation: 0,
            started_at: None,
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.sequence.get(self.current_index)
    }

    pub fn next_step(&self) -> Option<&Step> {
        self.sequence.get(self.current_index + 1)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, PlaybackStatus::Running | PlaybackStatus::Paused)
    }

    pub fn is_finished(&self) -> bool {
        self.status == PlaybackStatus::Finished
    }

    /// Seconds shown for the current step
    pub fn remaining_secs(&self, now: Instant) -> u32 {
        match &self.countdown {
            Some(countdown) => countdown.displayed_seconds(now),
            None if self.is_finished() => 0,
            None => self.step_duration,
        }
    }

    /// Rounded `(current_index + 1) / len` in percent
    pub fn percent_complete(&self) -> u8 {
        if self.sequence.is_empty() {
            return 0;
        }
        if self.is_finished() {
            return 100;
        }
        let done = (self.current_index + 1) as f64 / self.sequence.len() as f64;
        (done * 100.0).round().min(100.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> PlaybackSession {
        PlaybackSession::new(
            "W",
            vec![Step::label("A", 10), Step::label("B", 20), Step::label("C", 30)],
        )
    }

    #[test]
    fn test_new_session_is_idle_at_first_step() {
        let session = session();
        assert_eq!(session.status, PlaybackStatus::Idle);
        assert_eq!(session.current_step().unwrap().name, "A");
        assert_eq!(session.next_step().unwrap().name, "B");
        assert_eq!(session.remaining_secs(Instant::now()), 10);
        assert!(!session.is_active());
    }

    #[test]
    fn test_percent_complete() {
        let mut session = session();
        assert_eq!(session.percent_complete(), 33);
        session.current_index = 1;
        assert_eq!(session.percent_complete(), 67);
        session.current_index = 3;
        session.status = PlaybackStatus::Finished;
        assert_eq!(session.percent_complete(), 100);
        assert_eq!(session.remaining_secs(Instant::now()), 0);
    }
}
