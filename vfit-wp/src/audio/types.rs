//! Audio data types

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Decoded, interleaved f32 audio
#[derive(Debug, Clone, PartialEq)]
pub struct PcmClip {
    pub samples: Arc<Vec<f32>>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// Silent clip of the given length
    pub fn silence(duration: Duration, sample_rate: u32) -> Self {
        let frames = (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize;
        Self::new(vec![0.0; frames], sample_rate, 1)
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }

    /// Copy of the clip scaled by `gain`, hard-clipped to [-1, 1]
    pub fn with_gain(&self, gain: f32) -> Self {
        if (gain - 1.0).abs() < f32::EPSILON {
            return self.clone();
        }
        let samples = self
            .samples
            .iter()
            .map(|s| (s * gain).clamp(-1.0, 1.0))
            .collect();
        Self::new(samples, self.sample_rate, self.channels)
    }
}

/// Next step as announced by a preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuePreview {
    pub name: String,
    /// Pre-recorded clip naming the exercise
    pub clip: Option<String>,
}

/// Semantic audio cue produced by the playback controller.
///
/// How a cue sounds (speech, clip, tone or nothing) depends on the sound
/// mode and is decided by the audio router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCue {
    /// A step became current
    StepStarted { name: String },
    /// "N seconds remaining"
    TimeRemaining { seconds: u32 },
    /// "five, four, three, two, one"
    FinalCountdown,
    /// Upcoming step preview; `None` when the current step is the last
    Preview { next: Option<CuePreview> },
    /// Countdown reached zero and the sequence advances
    Transition { clip: Option<String> },
}

impl AudioCue {
    pub fn name(&self) -> &'static str {
        match self {
            AudioCue::StepStarted { .. } => "step_started",
            AudioCue::TimeRemaining { .. } => "time_remaining",
            AudioCue::FinalCountdown => "final_countdown",
            AudioCue::Preview { .. } => "preview",
            AudioCue::Transition { .. } => "transition",
        }
    }
}

/// Ties a cue to the step activation that produced it.
///
/// Multi-part announcements check the guard between parts so a stale
/// preview does not keep talking over the next step.
#[derive(Debug, Clone)]
pub struct ActivationGuard {
    id: u64,
    current: watch::Receiver<u64>,
}

impl ActivationGuard {
    pub fn new(id: u64, current: watch::Receiver<u64>) -> Self {
        Self { id, current }
    }

    /// Guard that never goes stale
    pub fn detached() -> Self {
        let (_tx, rx) = watch::channel(0);
        Self { id: 0, current: rx }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        *self.current.borrow() == self.id
    }
}
