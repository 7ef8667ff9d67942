//! Shared fixtures for vfit-wp integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use vfit_common::events::{CompletionSummary, PlayerEvent};
use vfit_common::{ExerciseRow, SoundMode, UserAudioPreferences, WorkoutDefinition};
use vfit_wp::audio::{AudioBackends, AudioChannel, AudioRouter, NullSink, SpeechBackend};
use vfit_wp::playback::{CompletionReporter, EngineDeps, InMemoryPreferences, PlaybackEngine};
use vfit_wp::{Error, PlayerConfig, Result};

// ============================================================================
// Workout fixtures
// ============================================================================

pub fn row(name: &str, block: &str, duration: u32) -> ExerciseRow {
    ExerciseRow::new(name, Some(block), Some(duration))
}

pub fn workout(name: &str, rows: Vec<ExerciseRow>) -> WorkoutDefinition {
    WorkoutDefinition::new(name, rows)
}

/// One block, one 30 s exercise, one round
pub fn single_exercise(duration: u32) -> WorkoutDefinition {
    workout("Single", vec![row("Squat", "A", duration)])
}

/// Two blocks of two rounds, one exercise each
pub fn two_blocks() -> WorkoutDefinition {
    let mut swing = row("Swing", "A", 40);
    swing.rounds = Some(2);
    swing.equipment = Some("Kettlebell".to_string());
    let mut plank = row("Plank", "B", 45);
    plank.rounds = Some(2);
    workout("Two blocks", vec![swing, plank])
}

// ============================================================================
// Audio doubles
// ============================================================================

/// One recorded utterance
#[derive(Debug, Clone)]
pub struct Spoken {
    pub text: String,
    pub lang: String,
    pub at: Duration,
}

/// Speech backend that records what it is asked to say.
///
/// Each utterance takes `delay`; with `fail` set it errors after the delay.
pub struct RecordingSpeech {
    name: &'static str,
    fail: bool,
    delay: Duration,
    started: Instant,
    spoken: Mutex<Vec<Spoken>>,
    primed: AtomicUsize,
}

impl RecordingSpeech {
    pub fn new(name: &'static str) -> Arc<Self> {
        Self::build(name, false, Duration::ZERO)
    }

    pub fn failing(name: &'static str, delay: Duration) -> Arc<Self> {
        Self::build(name, true, delay)
    }

    pub fn slow(name: &'static str, delay: Duration) -> Arc<Self> {
        Self::build(name, false, delay)
    }

    fn build(name: &'static str, fail: bool, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail,
            delay,
            started: Instant::now(),
            spoken: Mutex::new(Vec::new()),
            primed: AtomicUsize::new(0),
        })
    }

    pub fn spoken(&self) -> Vec<Spoken> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.spoken().into_iter().map(|s| s.text).collect()
    }

    pub fn count(&self, text: &str) -> usize {
        self.spoken().iter().filter(|s| s.text == text).count()
    }

    pub fn prime_count(&self) -> usize {
        self.primed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechBackend for RecordingSpeech {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn speak(&self, text: &str, lang: &str, _volume: f32) -> Result<()> {
        self.spoken.lock().unwrap().push(Spoken {
            text: text.to_string(),
            lang: lang.to_string(),
            at: self.started.elapsed(),
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(Error::Speech(format!("{} unavailable", self.name)));
        }
        Ok(())
    }

    async fn prime(&self) {
        self.primed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Completion reporter that keeps every summary
#[derive(Default)]
pub struct RecordingReporter {
    summaries: Mutex<Vec<CompletionSummary>>,
    delay: Duration,
}

impl RecordingReporter {
    /// Reporter whose writes take `delay` to land
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Default::default()
        })
    }

    pub fn summaries(&self) -> Vec<CompletionSummary> {
        self.summaries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionReporter for RecordingReporter {
    async fn record(&self, summary: &CompletionSummary) -> Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(())
    }
}

// ============================================================================
// Player harness
// ============================================================================

/// Engine wired to recording doubles, silent output and in-memory prefs
pub struct TestPlayer {
    pub engine: PlaybackEngine,
    pub preferences: Arc<InMemoryPreferences>,
    pub reporter: Arc<RecordingReporter>,
    pub events: broadcast::Receiver<PlayerEvent>,
}

impl TestPlayer {
    /// Player with only a synthesizer backend
    pub fn new(mode: SoundMode, synth: Arc<RecordingSpeech>) -> Self {
        Self::with_backends(
            mode,
            AudioBackends {
                synth: Some(synth as Arc<dyn SpeechBackend>),
                ..Default::default()
            },
        )
    }

    pub fn with_backends(mode: SoundMode, backends: AudioBackends) -> Self {
        Self::build(mode, backends, Arc::new(RecordingReporter::default()))
    }

    /// Silent player whose completion reports go to `reporter`
    pub fn with_reporter(reporter: Arc<RecordingReporter>) -> Self {
        Self::build(SoundMode::None, AudioBackends::default(), reporter)
    }

    fn build(mode: SoundMode, backends: AudioBackends, reporter: Arc<RecordingReporter>) -> Self {
        let config = PlayerConfig::default();
        let channel = Arc::new(AudioChannel::new(Arc::new(NullSink::new(config.audio.sample_rate))));
        let router = Arc::new(AudioRouter::new(channel, backends, &config));

        let preferences = Arc::new(InMemoryPreferences::new(
            UserAudioPreferences::default().with_sound_mode(mode),
        ));

        let engine = PlaybackEngine::spawn(
            &config,
            EngineDeps {
                router,
                preferences: preferences.clone(),
                reporter: reporter.clone(),
            },
        );
        let events = engine.subscribe();

        Self {
            engine,
            preferences,
            reporter,
            events,
        }
    }

    /// Events broadcast since the last call
    pub fn drain(&mut self) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        events
    }
}

/// Let time pass (paused clock) and spawned tasks run
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
    tokio::task::yield_now().await;
}

pub fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

pub fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// Names of the steps started, in order
pub fn started_steps(events: &[PlayerEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::StepStarted { snapshot, .. } => Some(snapshot.display_name.clone()),
            _ => None,
        })
        .collect()
}

pub fn completion(events: &[PlayerEvent]) -> Option<CompletionSummary> {
    events.iter().find_map(|e| match e {
        PlayerEvent::WorkoutCompleted { summary, .. } => Some(summary.clone()),
        _ => None,
    })
}
