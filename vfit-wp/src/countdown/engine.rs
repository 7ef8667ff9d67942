//! Deadline-based countdown
//!
//! The remaining time is always derived from an absolute deadline, never
//! from counting ticks, so late or skipped polls cannot make the countdown
//! drift. Thresholds use a crossed-at-or-below rule: a rule fires on the
//! first evaluation whose displayed value is at or below its threshold
//! while the previous displayed value was above it. Each rule fires at
//! most once per activation.

use super::cues::{CueRule, CueSchedule};
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use tokio::time::Instant;
use vfit_common::time::ceil_seconds;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Running { deadline: Instant },
    Paused { remaining: Duration },
    Completed,
}

/// Result of one countdown evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tick {
    /// Seconds shown to the user (rounded up)
    pub displayed: u32,
    /// Displayed value differs from the previous evaluation
    pub changed: bool,
    /// Rules that fired, in descending threshold order
    pub fired: Vec<CueRule>,
    /// The countdown reached zero on this evaluation
    pub completed: bool,
}

/// Countdown for one step activation
#[derive(Debug, Clone)]
pub struct Countdown {
    phase: Phase,
    total_secs: u32,
    last_displayed: u32,
    fired: HashSet<CueRule>,
}

impl Countdown {
    /// Start counting down `duration_secs` (at least one second) from `now`.
    pub fn start(duration_secs: u32, now: Instant) -> Self {
        let secs = duration_secs.max(1);
        Self {
            phase: Phase::Running {
                deadline: now + Duration::from_secs(u64::from(secs)),
            },
            total_secs: secs,
            // One above the start value so a threshold equal to the
            // duration counts as crossed on the first evaluation
            last_displayed: secs.saturating_add(1),
            fired: HashSet::new(),
        }
    }

    /// Total seconds of this activation, added time included
    pub fn total_secs(&self) -> u32 {
        self.total_secs
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        match self.phase {
            Phase::Running { deadline } => deadline.saturating_duration_since(now),
            Phase::Paused { remaining } => remaining,
            Phase::Completed => Duration::ZERO,
        }
    }

    pub fn displayed_seconds(&self, now: Instant) -> u32 {
        ceil_seconds(self.remaining(now))
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.phase, Phase::Paused { .. })
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.phase, Phase::Completed)
    }

    /// Thresholds that already fired during this activation
    pub fn fired_thresholds(&self) -> BTreeSet<u32> {
        self.fired.iter().map(|r| r.threshold).collect()
    }

    /// Evaluate the countdown at `now`.
    ///
    /// Paused and completed countdowns report their value without firing
    /// anything. Completion is reported exactly once.
    pub fn tick(&mut self, now: Instant, schedule: &CueSchedule) -> Tick {
        let displayed = self.displayed_seconds(now);
        let mut tick = Tick {
            displayed,
            ..Tick::default()
        };

        if !self.is_running() {
            return tick;
        }

        if displayed != self.last_displayed {
            tick.changed = true;
            for rule in schedule.rules() {
                let crossed = displayed <= rule.threshold && self.last_displayed > rule.threshold;
                if crossed && rule.applies_to(self.total_secs) && self.fired.insert(*rule) {
                    tick.fired.push(*rule);
                }
            }
            self.last_displayed = displayed;
        }

        if displayed == 0 {
            self.phase = Phase::Completed;
            tick.completed = true;
        }

        tick
    }

    /// Freeze the countdown, returning the captured remaining time.
    pub fn pause(&mut self, now: Instant) -> Option<Duration> {
        match self.phase {
            Phase::Running { deadline } => {
                let remaining = deadline.saturating_duration_since(now);
                self.phase = Phase::Paused { remaining };
                Some(remaining)
            }
            _ => None,
        }
    }

    /// Continue from the captured remaining time.
    ///
    /// If nothing usable was captured, resumes from the last displayed
    /// value. Returns false when the countdown was not paused.
    pub fn resume(&mut self, now: Instant) -> bool {
        let Phase::Paused { remaining } = self.phase else {
            return false;
        };

        let remaining = if remaining.is_zero() {
            Duration::from_secs(u64::from(self.last_displayed.min(self.total_secs)))
        } else {
            remaining
        };

        self.phase = Phase::Running {
            deadline: now + remaining,
        };
        true
    }

    /// Extend the current activation by `secs`.
    ///
    /// Thresholds that already fired stay fired; thresholds above the old
    /// remaining time become crossable again if they never fired.
    pub fn add_time(&mut self, secs: u32, _now: Instant) -> bool {
        let extra = Duration::from_secs(u64::from(secs));
        match &mut self.phase {
            Phase::Running { deadline } => *deadline += extra,
            Phase::Paused { remaining } => *remaining += extra,
            Phase::Completed => return false,
        }
        self.total_secs = self.total_secs.saturating_add(secs);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countdown::cues::CueEffect;

    fn at(start: Instant, millis: u64) -> Instant {
        start + Duration::from_millis(millis)
    }

    fn thresholds(tick: &Tick) -> Vec<u32> {
        tick.fired.iter().map(|r| r.threshold).collect()
    }

    #[test]
    fn test_displayed_value_rounds_up() {
        let start = Instant::now();
        let countdown = Countdown::start(30, start);
        assert_eq!(countdown.displayed_seconds(start), 30);
        assert_eq!(countdown.displayed_seconds(at(start, 1)), 30);
        assert_eq!(countdown.displayed_seconds(at(start, 1000)), 29);
        assert_eq!(countdown.displayed_seconds(at(start, 29_999)), 1);
        assert_eq!(countdown.displayed_seconds(at(start, 30_000)), 0);
    }

    #[test]
    fn test_zero_duration_clamped_to_one_second() {
        let start = Instant::now();
        let countdown = Countdown::start(0, start);
        assert_eq!(countdown.total_secs(), 1);
        assert_eq!(countdown.displayed_seconds(start), 1);
    }

    #[test]
    fn test_thresholds_fire_once_in_order() {
        let schedule = CueSchedule::standard();
        let start = Instant::now();
        let mut countdown = Countdown::start(90, start);

        let first = countdown.tick(start, &schedule);
        assert!(first.changed);
        assert!(first.fired.is_empty());

        let mut fired = Vec::new();
        let mut completed = 0;
        for ms in (200..=90_000).step_by(200) {
            let tick = countdown.tick(at(start, ms), &schedule);
            fired.extend(thresholds(&tick));
            if tick.completed {
                completed += 1;
            }
        }

        assert_eq!(fired, vec![60, 30, 10, 6, 5, 3]);
        assert_eq!(completed, 1);
        assert!(countdown.is_completed());
    }

    #[test]
    fn test_short_step_skips_long_announcements() {
        let schedule = CueSchedule::standard();
        let start = Instant::now();
        let mut countdown = Countdown::start(30, start);

        let mut fired = Vec::new();
        for ms in (0..=30_000).step_by(200) {
            fired.extend(thresholds(&countdown.tick(at(start, ms), &schedule)));
        }
        // 30 does not exceed 30, so no "thirty seconds" announcement
        assert_eq!(fired, vec![10, 6, 5, 3]);
    }

    #[test]
    fn test_threshold_equal_to_duration_fires_at_start() {
        let schedule = CueSchedule::standard();
        let start = Instant::now();
        let mut countdown = Countdown::start(5, start);

        let tick = countdown.tick(start, &schedule);
        let effects: Vec<CueEffect> = tick.fired.iter().map(|r| r.effect).collect();
        // 10 and 6 were never displayed above their threshold, so only 5 fires
        assert_eq!(effects, vec![CueEffect::FinalCountdown]);
    }

    #[test]
    fn test_skipped_seconds_still_fire_in_descending_order() {
        let schedule = CueSchedule::standard();
        let start = Instant::now();
        let mut countdown = Countdown::start(20, start);
        countdown.tick(start, &schedule);

        // poll stalls from 20s to 2s remaining
        let tick = countdown.tick(at(start, 18_000), &schedule);
        assert_eq!(thresholds(&tick), vec![10, 6, 5, 3]);
        assert!(!tick.completed);
    }

    #[test]
    fn test_long_stall_completes_after_firing() {
        let schedule = CueSchedule::standard();
        let start = Instant::now();
        let mut countdown = Countdown::start(8, start);
        countdown.tick(start, &schedule);

        let tick = countdown.tick(at(start, 60_000), &schedule);
        assert_eq!(thresholds(&tick), vec![6, 5, 3]);
        assert!(tick.completed);

        let again = countdown.tick(at(start, 61_000), &schedule);
        assert!(!again.completed);
        assert!(again.fired.is_empty());
    }

    #[test]
    fn test_pause_freezes_and_resume_preserves_remaining() {
        let schedule = CueSchedule::standard();
        let start = Instant::now();
        let mut countdown = Countdown::start(30, start);

        let captured = countdown.pause(at(start, 12_300)).unwrap();
        assert_eq!(captured, Duration::from_millis(17_700));
        assert!(countdown.pause(at(start, 12_400)).is_none());

        // time passing while paused changes nothing
        let tick = countdown.tick(at(start, 500_000), &schedule);
        assert_eq!(tick.displayed, 18);
        assert!(!tick.completed);

        assert!(countdown.resume(at(start, 500_000)));
        assert!(!countdown.resume(at(start, 500_000)));
        assert_eq!(countdown.remaining(at(start, 500_000)), Duration::from_millis(17_700));
        assert_eq!(countdown.remaining(at(start, 517_700)), Duration::ZERO);
    }

    #[test]
    fn test_resume_without_captured_time_uses_last_displayed() {
        let schedule = CueSchedule::standard();
        let start = Instant::now();
        let mut countdown = Countdown::start(10, start);
        countdown.tick(at(start, 9_500), &schedule);

        countdown.pause(at(start, 10_000));
        assert!(countdown.resume(at(start, 20_000)));
        assert_eq!(countdown.displayed_seconds(at(start, 20_000)), 1);
    }

    #[test]
    fn test_add_time_while_running_and_paused() {
        let start = Instant::now();
        let mut countdown = Countdown::start(30, start);

        countdown.add_time(10, at(start, 5_000));
        assert_eq!(countdown.displayed_seconds(at(start, 5_000)), 35);
        assert_eq!(countdown.total_secs(), 40);

        countdown.pause(at(start, 10_000));
        countdown.add_time(10, at(start, 10_000));
        assert_eq!(countdown.displayed_seconds(at(start, 99_000)), 40);
    }

    #[test]
    fn test_added_time_does_not_refire_thresholds() {
        let schedule = CueSchedule::standard();
        let start = Instant::now();
        let mut countdown = Countdown::start(12, start);
        countdown.tick(start, &schedule);

        let tick = countdown.tick(at(start, 2_000), &schedule);
        assert_eq!(thresholds(&tick), vec![10]);

        countdown.add_time(10, at(start, 2_000));
        let mut fired = Vec::new();
        for ms in (2_200..=22_000).step_by(200) {
            fired.extend(thresholds(&countdown.tick(at(start, ms), &schedule)));
        }
        assert_eq!(fired, vec![6, 5, 3]);
        assert_eq!(countdown.fired_thresholds().into_iter().collect::<Vec<_>>(), vec![3, 5, 6, 10]);
    }
}
