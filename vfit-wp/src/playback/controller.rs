//! Playback controller
//!
//! Synchronous state machine over a [`PlaybackSession`]. Every operation
//! takes the current time and user preferences and returns the [`Effect`]s
//! the engine must carry out; nothing here sleeps, spawns or does I/O.
//!
//! **Step activation** (start, advance, skip) always:
//! - bumps the activation counter, so audio from the previous step goes stale
//! - resets the preview flag and warning level
//! - starts a fresh countdown at the step's full duration (plus standing
//!   extra time for exercise steps)

use super::effects::Effect;
use super::session::PlaybackSession;
use crate::audio::{AudioCue, CuePreview};
use crate::countdown::{Countdown, CueEffect, CueRule, CueSchedule};
use crate::error::{Error, Result};
use crate::sequence::{
    build_sequence_with_labels, start_points, validate_sequence, BlockStartPoint, LabelSet, Step,
};
use chrono::Utc;
use std::collections::HashSet;
use tokio::time::Instant;
use tracing::{debug, info};
use vfit_common::events::{
    CompletionSummary, EquipmentEntry, PlaybackStatus, PlayerEvent, ProgressSnapshot, StepPreview,
    WarningLevel,
};
use vfit_common::{UserAudioPreferences, WorkoutDefinition};

pub struct PlaybackController {
    schedule: CueSchedule,
    labels: LabelSet,
    session: Option<PlaybackSession>,
    activations: u64,
}

impl PlaybackController {
    pub fn new(schedule: CueSchedule) -> Self {
        Self {
            schedule,
            labels: LabelSet::default(),
            session: None,
            activations: 0,
        }
    }

    pub fn with_labels(mut self, labels: LabelSet) -> Self {
        self.labels = labels;
        self
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.session
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(PlaybackStatus::Idle)
    }

    /// Latest activation id; audio tagged with an older id is stale
    pub fn activation(&self) -> u64 {
        self.activations
    }

    pub fn snapshot(&self, now: Instant) -> Option<ProgressSnapshot> {
        self.session.as_ref().and_then(|s| snapshot_of(s, now))
    }

    fn prepare(&self, workout: &WorkoutDefinition, include_warmup: bool) -> Result<PlaybackSession> {
        let sequence = build_sequence_with_labels(workout, include_warmup, &self.labels);
        validate_sequence(&workout.name, &sequence)?;
        Ok(PlaybackSession::new(workout.name.clone(), sequence))
    }

    fn ensure_not_active(&self) -> Result<()> {
        if self.session.as_ref().is_some_and(|s| s.is_active()) {
            return Err(Error::InvalidState(
                "a workout is already in progress".to_string(),
            ));
        }
        Ok(())
    }

    fn active_session_mut(&mut self) -> Result<&mut PlaybackSession> {
        match self.session.as_mut() {
            Some(session) if session.is_active() => Ok(session),
            Some(session) => Err(Error::InvalidState(format!(
                "workout is {}",
                session.status
            ))),
            None => Err(Error::InvalidState("no workout in progress".to_string())),
        }
    }

    /// Build and validate the sequence without starting it.
    ///
    /// Returns the selectable start points. Nothing changes on error.
    pub fn load(&mut self, workout: &WorkoutDefinition, include_warmup: bool) -> Result<Vec<BlockStartPoint>> {
        self.ensure_not_active()?;
        let session = self.prepare(workout, include_warmup)?;
        let points = start_points(&session.sequence);

        info!(
            "Loaded workout '{}': {} steps, {} blocks",
            session.workout_name,
            session.len(),
            points.len()
        );
        self.session = Some(session);
        Ok(points)
    }

    /// Choose the first step of a loaded, not yet started workout
    pub fn jump_to_start_point(&mut self, index: usize) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::InvalidState("no workout loaded".to_string()))?;

        if session.status != PlaybackStatus::Idle {
            return Err(Error::InvalidState(
                "start point can only be chosen before the workout starts".to_string(),
            ));
        }
        let Some(step) = session.sequence.get(index) else {
            return Err(Error::StepOutOfRange {
                index,
                len: session.len(),
            });
        };

        session.step_duration = step.duration_secs;
        session.current_index = index;
        debug!("Start point set to step {} ({})", index, session.sequence[index].name);
        Ok(())
    }

    /// Start the loaded workout at its current index
    pub fn start(&mut self, now: Instant, prefs: &UserAudioPreferences) -> Result<Vec<Effect>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::InvalidState("no workout loaded".to_string()))?;
        if session.status != PlaybackStatus::Idle {
            return Err(Error::InvalidState(format!(
                "cannot start a workout that is {}",
                session.status
            )));
        }

        session.status = PlaybackStatus::Running;
        session.started_at = Some(now);
        info!(
            "Starting workout '{}' at step {}/{}",
            session.workout_name,
            session.current_index + 1,
            session.len()
        );

        let mut effects = vec![
            Effect::Emit(PlayerEvent::WorkoutStarted {
                session_id: session.id,
                workout_name: session.workout_name.clone(),
                total_steps: session.len(),
                start_index: session.current_index,
                timestamp: Utc::now(),
            }),
            state_changed(PlaybackStatus::Idle, PlaybackStatus::Running),
        ];

        let clips = clip_refs(&session.sequence);
        if !clips.is_empty() {
            effects.push(Effect::Preload(clips));
        }

        effects.extend(self.activate(now, prefs));
        Ok(effects)
    }

    /// Build the sequence and start at `start_index`.
    ///
    /// An empty or malformed workout is refused and leaves the controller
    /// untouched.
    pub fn start_workout(
        &mut self,
        workout: &WorkoutDefinition,
        include_warmup: bool,
        start_index: usize,
        now: Instant,
        prefs: &UserAudioPreferences,
    ) -> Result<Vec<Effect>> {
        self.ensure_not_active()?;
        let mut session = self.prepare(workout, include_warmup)?;

        let Some(step) = session.sequence.get(start_index) else {
            return Err(Error::StepOutOfRange {
                index: start_index,
                len: session.len(),
            });
        };
        session.step_duration = step.duration_secs;
        session.current_index = start_index;

        self.session = Some(session);
        self.start(now, prefs)
    }

    /// Evaluate the countdown; advances the step when it reaches zero
    pub fn tick(&mut self, now: Instant, prefs: &UserAudioPreferences) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if session.status != PlaybackStatus::Running {
            return Vec::new();
        }
        let Some(countdown) = session.countdown.as_mut() else {
            return Vec::new();
        };

        let tick = countdown.tick(now, &self.schedule);
        let mut effects = Vec::new();
        apply_rules(session, &tick.fired, &mut effects);

        if tick.completed {
            effects.extend(self.on_step_advance(now, prefs));
        } else if tick.changed {
            effects.extend(progress(session, now));
        }
        effects
    }

    /// The current step's countdown reached zero
    pub fn on_step_advance(&mut self, now: Instant, prefs: &UserAudioPreferences) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        let next_index = session.current_index + 1;
        let transition = AudioCue::Transition {
            clip: session
                .sequence
                .get(next_index)
                .and_then(|s| s.transition_clip.clone()),
        };
        session.countdown = None;

        if next_index >= session.len() {
            self.activations += 1;
            session.activation = self.activations;
            session.status = PlaybackStatus::Finished;
            session.current_index = session.len();
            session.preview_shown = false;
            session.warning = WarningLevel::Normal;

            let summary = completion_summary(session, now);
            info!(
                "Workout '{}' finished: {} exercises in {}s",
                summary.workout_name, summary.exercise_count, summary.elapsed_seconds
            );

            return vec![
                Effect::Cue {
                    activation: self.activations,
                    cue: transition,
                },
                state_changed(PlaybackStatus::Running, PlaybackStatus::Finished),
                Effect::Emit(PlayerEvent::WorkoutCompleted {
                    session_id: session.id,
                    summary: summary.clone(),
                    timestamp: Utc::now(),
                }),
                Effect::RecordCompletion(summary),
            ];
        }

        session.current_index = next_index;
        let mut effects = self.activate(now, prefs);
        effects.insert(
            0,
            Effect::Cue {
                activation: self.activations,
                cue: transition,
            },
        );
        effects
    }

    pub fn pause(&mut self, now: Instant) -> Result<Vec<Effect>> {
        let session = self.active_session_mut()?;
        if session.status == PlaybackStatus::Paused {
            return Ok(Vec::new());
        }

        if let Some(countdown) = session.countdown.as_mut() {
            if let Some(remaining) = countdown.pause(now) {
                debug!("Paused with {:?} remaining", remaining);
            }
        }
        session.status = PlaybackStatus::Paused;

        let mut effects = vec![state_changed(PlaybackStatus::Running, PlaybackStatus::Paused)];
        effects.extend(progress(session, now));
        Ok(effects)
    }

    pub fn resume(&mut self, now: Instant) -> Result<Vec<Effect>> {
        let session = self.active_session_mut()?;
        if session.status == PlaybackStatus::Running {
            return Ok(Vec::new());
        }

        if let Some(countdown) = session.countdown.as_mut() {
            countdown.resume(now);
        }
        session.status = PlaybackStatus::Running;

        let mut effects = vec![state_changed(PlaybackStatus::Paused, PlaybackStatus::Running)];
        effects.extend(progress(session, now));
        Ok(effects)
    }

    pub fn toggle_pause(&mut self, now: Instant) -> Result<Vec<Effect>> {
        match self.status() {
            PlaybackStatus::Paused => self.resume(now),
            _ => self.pause(now),
        }
    }

    /// Move to the next step; a no-op on the last step
    pub fn skip_next(&mut self, now: Instant, prefs: &UserAudioPreferences) -> Result<Vec<Effect>> {
        let session = self.active_session_mut()?;
        let target = session.current_index + 1;
        if target >= session.len() {
            debug!("Skip next ignored on the last step");
            return Ok(Vec::new());
        }
        Ok(self.jump(target, now, prefs))
    }

    /// Move to the previous step; a no-op on the first step
    pub fn skip_previous(&mut self, now: Instant, prefs: &UserAudioPreferences) -> Result<Vec<Effect>> {
        let session = self.active_session_mut()?;
        let Some(target) = session.current_index.checked_sub(1) else {
            debug!("Skip previous ignored on the first step");
            return Ok(Vec::new());
        };
        Ok(self.jump(target, now, prefs))
    }

    /// Extend the current step and store the seconds as standing extra time
    pub fn add_extra_time(&mut self, seconds: u32, now: Instant) -> Result<Vec<Effect>> {
        let session = self.active_session_mut()?;
        if seconds == 0 {
            return Ok(Vec::new());
        }

        if let Some(countdown) = session.countdown.as_mut() {
            countdown.add_time(seconds, now);
            session.step_duration = countdown.total_secs();
        }
        debug!("Added {}s to step {}", seconds, session.current_index);

        let mut effects: Vec<Effect> = progress(session, now).into_iter().collect();
        effects.push(Effect::PersistExtraTime(seconds));
        Ok(effects)
    }

    /// Leave the workout. Discards the session; a no-op without one.
    pub fn exit(&mut self) -> Vec<Effect> {
        let Some(session) = self.session.take() else {
            return Vec::new();
        };
        self.activations += 1;

        if session.is_finished() {
            return Vec::new();
        }

        info!(
            "Exited workout '{}' at step {}",
            session.workout_name, session.current_index
        );
        let mut effects = vec![Effect::Emit(PlayerEvent::WorkoutExited {
            session_id: session.id,
            step_index: session.current_index,
            timestamp: Utc::now(),
        })];
        if session.status != PlaybackStatus::Idle {
            effects.push(state_changed(session.status, PlaybackStatus::Idle));
        }
        effects
    }

    fn jump(&mut self, index: usize, now: Instant, prefs: &UserAudioPreferences) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(session) = self.session.as_mut() {
            if session.status == PlaybackStatus::Paused {
                session.status = PlaybackStatus::Running;
                effects.push(state_changed(PlaybackStatus::Paused, PlaybackStatus::Running));
            }
            session.current_index = index;
        }
        effects.extend(self.activate(now, prefs));
        effects
    }

    /// Start the countdown for the current step
    fn activate(&mut self, now: Instant, prefs: &UserAudioPreferences) -> Vec<Effect> {
        self.activations += 1;
        let activation = self.activations;
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let Some(step) = session.sequence.get(session.current_index) else {
            return Vec::new();
        };

        let extra = if step.is_label() {
            0
        } else {
            prefs.extra_time_seconds
        };
        let duration = step.duration_secs.saturating_add(extra).max(1);
        let name = step.name.clone();

        session.activation = activation;
        session.preview_shown = false;
        session.warning = WarningLevel::Normal;
        session.step_duration = duration;

        let mut countdown = Countdown::start(duration, now);
        let first = countdown.tick(now, &self.schedule);
        session.countdown = Some(countdown);

        debug!(
            "Step {}/{} '{}' for {}s (activation {})",
            session.current_index + 1,
            session.len(),
            name,
            duration,
            activation
        );

        let mut effects = Vec::new();
        if let Some(snapshot) = snapshot_of(session, now) {
            effects.push(Effect::Emit(PlayerEvent::StepStarted {
                session_id: session.id,
                snapshot,
                timestamp: Utc::now(),
            }));
        }
        effects.push(Effect::Cue {
            activation,
            cue: AudioCue::StepStarted { name },
        });

        // Short steps cross thresholds at activation
        if !first.fired.is_empty() {
            apply_rules(session, &first.fired, &mut effects);
            effects.extend(progress(session, now));
        }
        effects
    }
}

/// Turn fired cue rules into session changes and effects
fn apply_rules(session: &mut PlaybackSession, rules: &[CueRule], effects: &mut Vec<Effect>) {
    let activation = session.activation;

    for rule in rules {
        effects.push(Effect::Emit(PlayerEvent::CueFired {
            session_id: session.id,
            step_index: session.current_index,
            threshold: rule.threshold,
            cue: rule.fired_kind(),
            timestamp: Utc::now(),
        }));

        match rule.effect {
            CueEffect::TimeRemaining => effects.push(Effect::Cue {
                activation,
                cue: AudioCue::TimeRemaining {
                    seconds: rule.threshold,
                },
            }),
            CueEffect::Preview => {
                if session.preview_shown {
                    continue;
                }
                session.preview_shown = true;
                session.warning = session.warning.max(WarningLevel::Notice);

                let next_index = session.current_index + 1;
                let next = session.sequence.get(next_index);
                effects.push(Effect::Emit(PlayerEvent::PreviewShown {
                    session_id: session.id,
                    step_index: session.current_index,
                    next: next.map(|step| StepPreview {
                        index: next_index,
                        name: step.name.clone(),
                        image_ref: step.image_ref.clone(),
                        info: step.info_line(),
                    }),
                    timestamp: Utc::now(),
                }));
                effects.push(Effect::Cue {
                    activation,
                    cue: AudioCue::Preview {
                        next: next.map(|step| CuePreview {
                            name: step.name.clone(),
                            clip: step.main_clip.clone(),
                        }),
                    },
                });
            }
            CueEffect::Warning(level) => session.warning = session.warning.max(level),
            CueEffect::FinalCountdown => effects.push(Effect::Cue {
                activation,
                cue: AudioCue::FinalCountdown,
            }),
        }
    }
}

fn state_changed(old_state: PlaybackStatus, new_state: PlaybackStatus) -> Effect {
    Effect::Emit(PlayerEvent::PlaybackStateChanged {
        old_state,
        new_state,
        timestamp: Utc::now(),
    })
}

fn progress(session: &PlaybackSession, now: Instant) -> Option<Effect> {
    snapshot_of(session, now).map(|snapshot| {
        Effect::Emit(PlayerEvent::Progress {
            session_id: session.id,
            snapshot,
            timestamp: Utc::now(),
        })
    })
}

fn snapshot_of(session: &PlaybackSession, now: Instant) -> Option<ProgressSnapshot> {
    let index = session.current_index.min(session.len().checked_sub(1)?);
    let step = session.sequence.get(index)?;

    // During the preview the display shows the upcoming step
    let shown = if session.preview_shown {
        session.sequence.get(index + 1).unwrap_or(step)
    } else {
        step
    };

    Some(ProgressSnapshot {
        status: session.status,
        current_index: session.current_index,
        total_steps: session.len(),
        remaining_seconds: session.remaining_secs(now),
        duration_seconds: session.step_duration,
        step_kind: step.kind,
        position: step.position,
        display_name: shown.name.clone(),
        image_ref: shown.image_ref.clone(),
        reps: shown.reps.clone(),
        equipment: shown.equipment.clone(),
        warning: session.warning,
        preview_active: session.preview_shown,
        percent_complete: session.percent_complete(),
    })
}

fn completion_summary(session: &PlaybackSession, now: Instant) -> CompletionSummary {
    let elapsed_seconds = session
        .started_at
        .map(|started| now.saturating_duration_since(started).as_secs())
        .unwrap_or(0);

    let exercises: Vec<&Step> = session
        .sequence
        .iter()
        .filter(|s| s.counts_as_exercise())
        .collect();

    let mut seen = HashSet::new();
    let exercises_with_equipment = exercises
        .iter()
        .filter_map(|step| {
            let equipment = step.equipment.as_ref()?;
            Some(EquipmentEntry {
                name: step.name.clone(),
                equipment: equipment.clone(),
            })
        })
        .filter(|entry| seen.insert(entry.clone()))
        .collect();

    CompletionSummary {
        workout_name: session.workout_name.clone(),
        elapsed_seconds,
        exercise_count: exercises.len(),
        exercises_with_equipment,
    }
}

/// Clip references of a sequence, first-seen order
fn clip_refs(sequence: &[Step]) -> Vec<String> {
    let mut seen = HashSet::new();
    sequence
        .iter()
        .flat_map(|s| s.main_clip.iter().chain(s.transition_clip.iter()))
        .filter(|clip| seen.insert(clip.as_str()))
        .cloned()
        .collect()
}
