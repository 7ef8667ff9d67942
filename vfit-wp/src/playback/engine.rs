//! Playback engine
//!
//! Actor task owning the [`PlaybackController`]. Commands arrive on one
//! mpsc queue and the countdown is polled by an interval tick; both are
//! handled in the same `select!` loop, so state transitions never overlap.
//!
//! Effects returned by the controller are carried out right after each
//! transition:
//! - events are broadcast through [`SharedState`]
//! - audio cues are spawned and never awaited by the loop
//! - preference and history writes are spawned onto a `JoinSet` that is
//!   drained before the actor exits, so `shutdown()` never drops them
//!
//! The current activation id is published on a `watch` channel; cue tasks
//! hold an [`ActivationGuard`] on it and go quiet once their step is over.

use super::collaborators::{CompletionReporter, PreferenceStore};
use super::controller::PlaybackController;
use super::effects::Effect;
use crate::audio::{ActivationGuard, AudioCue, AudioRouter};
use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::sequence::BlockStartPoint;
use crate::state::SharedState;
use chrono::Utc;
use futures::FutureExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vfit_common::events::{PlayerEvent, ProgressSnapshot};
use vfit_common::prefs::{SoundMode, UserAudioPreferences};
use vfit_common::WorkoutDefinition;

const COMMAND_QUEUE_DEPTH: usize = 32;

/// Longest shutdown waits for pending storage writes
const WRITE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything the engine talks to besides the controller
#[derive(Clone)]
pub struct EngineDeps {
    pub router: Arc<AudioRouter>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub reporter: Arc<dyn CompletionReporter>,
}

enum Command {
    StartWorkout {
        workout: WorkoutDefinition,
        include_warmup: bool,
        start_index: usize,
        reply: oneshot::Sender<Result<()>>,
    },
    Load {
        workout: WorkoutDefinition,
        include_warmup: bool,
        reply: oneshot::Sender<Result<Vec<BlockStartPoint>>>,
    },
    JumpToStartPoint {
        index: usize,
        reply: oneshot::Sender<Result<()>>,
    },
    Start {
        reply: oneshot::Sender<Result<()>>,
    },
    Pause {
        reply: oneshot::Sender<Result<()>>,
    },
    Resume {
        reply: oneshot::Sender<Result<()>>,
    },
    TogglePause {
        reply: oneshot::Sender<Result<()>>,
    },
    SkipNext {
        reply: oneshot::Sender<Result<()>>,
    },
    SkipPrevious {
        reply: oneshot::Sender<Result<()>>,
    },
    AddExtraTime {
        seconds: u32,
        reply: oneshot::Sender<Result<()>>,
    },
    Exit {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<Option<ProgressSnapshot>>,
    },
}

/// Cloneable handle to the playback actor
#[derive(Clone)]
pub struct PlaybackEngine {
    commands: mpsc::Sender<Command>,
    state: Arc<SharedState>,
    deps: EngineDeps,
    activation: watch::Receiver<u64>,
    gesture_seen: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PlaybackEngine {
    /// Start the actor task
    pub fn spawn(config: &PlayerConfig, deps: EngineDeps) -> Self {
        let state = Arc::new(SharedState::new(config.playback.event_capacity));
        let (commands, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (activation_tx, activation) = watch::channel(0);
        let cancel = CancellationToken::new();

        let actor = EngineTask {
            controller: PlaybackController::new(config.cues.schedule()),
            deps: deps.clone(),
            state: Arc::clone(&state),
            activation: activation_tx,
            writes: JoinSet::new(),
        };
        let tick = config.playback.tick_interval();
        let task = tokio::spawn(actor.run(rx, tick, cancel.clone()));

        info!("Playback engine started (tick {:?})", tick);

        Self {
            commands,
            state,
            deps,
            activation,
            gesture_seen: Arc::new(AtomicBool::new(false)),
            cancel,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// Current activation id
    pub fn activation(&self) -> watch::Receiver<u64> {
        self.activation.clone()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PlayerEvent> {
        self.state.subscribe_events()
    }

    /// The user interacted with the player; unlocks on-device speech once
    pub fn user_gesture(&self) {
        if self.gesture_seen.swap(true, Ordering::SeqCst) {
            return;
        }
        let router = Arc::clone(&self.deps.router);
        tokio::spawn(async move {
            router.on_user_gesture().await;
        });
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| Error::EngineStopped)?;
        rx.await.map_err(|_| Error::EngineStopped)
    }

    async fn interact<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        self.user_gesture();
        self.request(command).await
    }

    /// Build the workout's sequence and start playing at `start_index`
    pub async fn start_workout(
        &self,
        workout: WorkoutDefinition,
        include_warmup: bool,
        start_index: usize,
    ) -> Result<()> {
        self.interact(|reply| Command::StartWorkout {
            workout,
            include_warmup,
            start_index,
            reply,
        })
        .await?
    }

    /// Build the sequence without starting; returns the start points
    pub async fn load(&self, workout: WorkoutDefinition, include_warmup: bool) -> Result<Vec<BlockStartPoint>> {
        self.interact(|reply| Command::Load {
            workout,
            include_warmup,
            reply,
        })
        .await?
    }

    pub async fn jump_to_start_point(&self, index: usize) -> Result<()> {
        self.interact(|reply| Command::JumpToStartPoint { index, reply })
            .await?
    }

    pub async fn start(&self) -> Result<()> {
        self.interact(|reply| Command::Start { reply }).await?
    }

    pub async fn pause(&self) -> Result<()> {
        self.interact(|reply| Command::Pause { reply }).await?
    }

    pub async fn resume(&self) -> Result<()> {
        self.interact(|reply| Command::Resume { reply }).await?
    }

    pub async fn toggle_pause(&self) -> Result<()> {
        self.interact(|reply| Command::TogglePause { reply }).await?
    }

    pub async fn skip_next(&self) -> Result<()> {
        self.interact(|reply| Command::SkipNext { reply }).await?
    }

    pub async fn skip_previous(&self) -> Result<()> {
        self.interact(|reply| Command::SkipPrevious { reply }).await?
    }

    pub async fn add_extra_time(&self, seconds: u32) -> Result<()> {
        self.interact(|reply| Command::AddExtraTime { seconds, reply })
            .await?
    }

    pub async fn exit(&self) -> Result<()> {
        self.interact(|reply| Command::Exit { reply }).await
    }

    /// Fresh snapshot computed by the actor
    pub async fn snapshot(&self) -> Result<Option<ProgressSnapshot>> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub fn preferences(&self) -> UserAudioPreferences {
        self.deps.preferences.current()
    }

    pub async fn set_sound_mode(&self, mode: SoundMode) -> Result<UserAudioPreferences> {
        let prefs = self.deps.preferences.set_sound_mode(mode).await?;
        self.announce_preferences(&prefs);
        Ok(prefs)
    }

    pub async fn set_volume(&self, volume: f32) -> Result<UserAudioPreferences> {
        let prefs = self.deps.preferences.set_volume(volume).await?;
        self.announce_preferences(&prefs);
        Ok(prefs)
    }

    pub async fn reset_extra_time(&self) -> Result<UserAudioPreferences> {
        let prefs = self.deps.preferences.reset_extra_time().await?;
        self.announce_preferences(&prefs);
        Ok(prefs)
    }

    fn announce_preferences(&self, prefs: &UserAudioPreferences) {
        self.state.broadcast_event(PlayerEvent::PreferencesChanged {
            preferences: prefs.clone(),
            timestamp: Utc::now(),
        });
    }

    /// Stop the actor and wait for it to exit, pending writes included
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Playback engine task failed: {}", e);
            }
        }
    }
}

struct EngineTask {
    controller: PlaybackController,
    deps: EngineDeps,
    state: Arc<SharedState>,
    activation: watch::Sender<u64>,
    /// Preference and history writes still in flight
    writes: JoinSet<()>,
}

impl EngineTask {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>, tick: Duration, cancel: CancellationToken) {
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                command = rx.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = ticker.tick() => {
                    let prefs = self.deps.preferences.current();
                    let effects = self.controller.tick(Instant::now(), &prefs);
                    if !effects.is_empty() {
                        self.apply(effects).await;
                    }
                }
            }
        }

        let effects = self.controller.exit();
        self.apply(effects).await;
        self.deps.router.stop();
        self.drain_writes().await;
        info!("Playback engine stopped");
    }

    async fn drain_writes(&mut self) {
        if self.writes.is_empty() {
            return;
        }
        debug!("Waiting for {} pending writes", self.writes.len());

        let drain = async {
            while let Some(result) = self.writes.join_next().await {
                if let Err(e) = result {
                    warn!("Storage write task failed: {}", e);
                }
            }
        };
        if tokio::time::timeout(WRITE_DRAIN_TIMEOUT, drain).await.is_err() {
            warn!("Pending writes did not finish within {:?}", WRITE_DRAIN_TIMEOUT);
        }
    }

    /// Collect writes that already finished
    fn reap_writes(&mut self) {
        while let Some(Some(result)) = self.writes.join_next().now_or_never() {
            if let Err(e) = result {
                warn!("Storage write task failed: {}", e);
            }
        }
    }

    async fn handle(&mut self, command: Command) {
        let now = Instant::now();
        let prefs = self.deps.preferences.current();

        match command {
            Command::StartWorkout {
                workout,
                include_warmup,
                start_index,
                reply,
            } => {
                let result = self
                    .controller
                    .start_workout(&workout, include_warmup, start_index, now, &prefs);
                let _ = reply.send(self.settle(result).await);
            }
            Command::Load {
                workout,
                include_warmup,
                reply,
            } => {
                let result = self.controller.load(&workout, include_warmup);
                self.publish().await;
                let _ = reply.send(result);
            }
            Command::JumpToStartPoint { index, reply } => {
                let result = self.controller.jump_to_start_point(index);
                self.publish().await;
                let _ = reply.send(result);
            }
            Command::Start { reply } => {
                let result = self.controller.start(now, &prefs);
                let _ = reply.send(self.settle(result).await);
            }
            Command::Pause { reply } => {
                let result = self.controller.pause(now);
                let _ = reply.send(self.settle(result).await);
            }
            Command::Resume { reply } => {
                let result = self.controller.resume(now);
                let _ = reply.send(self.settle(result).await);
            }
            Command::TogglePause { reply } => {
                let result = self.controller.toggle_pause(now);
                let _ = reply.send(self.settle(result).await);
            }
            Command::SkipNext { reply } => {
                let result = self.controller.skip_next(now, &prefs);
                let _ = reply.send(self.settle(result).await);
            }
            Command::SkipPrevious { reply } => {
                let result = self.controller.skip_previous(now, &prefs);
                let _ = reply.send(self.settle(result).await);
            }
            Command::AddExtraTime { seconds, reply } => {
                let result = self.controller.add_extra_time(seconds, now);
                let _ = reply.send(self.settle(result).await);
            }
            Command::Exit { reply } => {
                let effects = self.controller.exit();
                self.deps.router.stop();
                self.apply(effects).await;
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.controller.snapshot(now));
            }
        }
    }

    async fn settle(&mut self, result: Result<Vec<Effect>>) -> Result<()> {
        match result {
            Ok(effects) => {
                self.apply(effects).await;
                Ok(())
            }
            Err(e) => {
                debug!("Command rejected: {}", e);
                Err(e)
            }
        }
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        self.activation.send_replace(self.controller.activation());
        self.reap_writes();

        let prefs = self.deps.preferences.current();
        let mut cues: Vec<(u64, AudioCue)> = Vec::new();

        for effect in effects {
            match effect {
                Effect::Emit(event) => self.state.broadcast_event(event),
                Effect::Cue { activation, cue } => cues.push((activation, cue)),
                Effect::PersistExtraTime(seconds) => self.persist_extra_time(seconds),
                Effect::RecordCompletion(summary) => {
                    let reporter = Arc::clone(&self.deps.reporter);
                    self.writes.spawn(async move {
                        if let Err(e) = reporter.record(&summary).await {
                            warn!("Failed to record completed workout: {}", e);
                        }
                    });
                }
                Effect::Preload(clips) => {
                    if prefs.sound_mode == SoundMode::Clips {
                        let router = Arc::clone(&self.deps.router);
                        tokio::spawn(async move {
                            router.preload(&clips).await;
                        });
                    }
                }
            }
        }

        if !cues.is_empty() {
            self.spawn_cues(cues, prefs);
        }

        self.publish().await;
    }

    /// Play one transition's cues in order, dropping any that went stale
    fn spawn_cues(&self, cues: Vec<(u64, AudioCue)>, prefs: UserAudioPreferences) {
        let router = Arc::clone(&self.deps.router);
        let current = self.activation.subscribe();

        tokio::spawn(async move {
            for (activation, cue) in cues {
                let guard = ActivationGuard::new(activation, current.clone());
                if !guard.is_current() {
                    debug!("Dropping stale {} cue", cue.name());
                    continue;
                }
                router.play_cue(cue, &prefs, &guard).await;
            }
        });
    }

    fn persist_extra_time(&mut self, seconds: u32) {
        let store = Arc::clone(&self.deps.preferences);
        let state = Arc::clone(&self.state);

        self.writes.spawn(async move {
            match store.add_extra_time(seconds).await {
                Ok(preferences) => {
                    debug!("Standing extra time now {}s", preferences.extra_time_seconds);
                    state.broadcast_event(PlayerEvent::PreferencesChanged {
                        preferences,
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => warn!("Failed to store extra time: {}", e),
            }
        });
    }

    async fn publish(&self) {
        match self.controller.snapshot(Instant::now()) {
            Some(snapshot) => self.state.set_snapshot(snapshot).await,
            None => {
                self.state.clear_snapshot().await;
                self.state.set_status(self.controller.status()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioBackends, AudioChannel, NullSink};
    use crate::playback::collaborators::{InMemoryPreferences, NoopReporter};
    use vfit_common::events::PlaybackStatus;
    use vfit_common::ExerciseRow;

    fn engine() -> PlaybackEngine {
        let config = PlayerConfig::default();
        let channel = Arc::new(AudioChannel::new(Arc::new(NullSink::new(config.audio.sample_rate))));
        let router = Arc::new(AudioRouter::new(channel, AudioBackends::default(), &config));
        PlaybackEngine::spawn(
            &config,
            EngineDeps {
                router,
                preferences: Arc::new(InMemoryPreferences::default()),
                reporter: Arc::new(NoopReporter),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_empty_before_start() {
        let engine = engine();
        assert!(engine.snapshot().await.unwrap().is_none());
        assert_eq!(engine.state().get_status().await, PlaybackStatus::Idle);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_fail_after_shutdown() {
        let engine = engine();
        engine.shutdown().await;

        assert!(matches!(engine.pause().await, Err(Error::EngineStopped)));
        assert!(matches!(engine.snapshot().await, Err(Error::EngineStopped)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_mirrors_controller() {
        let engine = engine();
        let workout = WorkoutDefinition::new(
            "W",
            vec![ExerciseRow::new("Squat", Some("A"), Some(30))],
        );

        engine.start_workout(workout, false, 0).await.unwrap();
        assert_eq!(engine.state().get_status().await, PlaybackStatus::Running);

        engine.pause().await.unwrap();
        let snapshot = engine.state().get_snapshot().await.unwrap();
        assert_eq!(snapshot.status, PlaybackStatus::Paused);
        assert_eq!(snapshot.display_name, "Squat");

        engine.exit().await.unwrap();
        assert_eq!(engine.state().get_status().await, PlaybackStatus::Idle);
        assert!(engine.state().get_snapshot().await.is_none());
        engine.shutdown().await;
    }
}
