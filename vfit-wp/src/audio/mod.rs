//! Audio cues
//!
//! The playback controller emits semantic [`AudioCue`]s; [`AudioRouter`]
//! turns them into sound according to the user's [`SoundMode`]:
//!
//! - **voice**: cloud speech, falling back to the on-device synthesizer
//! - **synth**: on-device synthesizer only
//! - **clips**: pre-recorded clips
//! - **beep**: generated tones at previews and transitions
//! - **none**: silent
//!
//! Audio never blocks or fails playback. Every failure is logged and the
//! cue degrades to silence.

pub mod clips;
pub mod cloud;
pub mod decode;
pub mod lang;
pub mod output;
pub mod resampler;
pub mod synth;
pub mod tones;
pub mod types;

pub use output::{AudioChannel, AudioSink, NullSink};
pub use tones::{ToneBank, ToneKind};
pub use types::{ActivationGuard, AudioCue, CuePreview, PcmClip};

use crate::config::{ClipConfig, CueConfig, PhraseConfig, PlayerConfig};
use crate::error::Result;
use async_trait::async_trait;
use clips::ClipLibrary;
use cloud::{CloudSpeech, HttpSpeechService};
use lang::detect_lang;
use std::sync::Arc;
use synth::{CommandSpeechEngine, SynthSpeech};
use tracing::{debug, info, warn};
use vfit_common::{SoundMode, UserAudioPreferences};

/// Something that can say a sentence out loud
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Speak `text` and resolve when done.
    async fn speak(&self, text: &str, lang: &str, volume: f32) -> Result<()>;

    /// Prepare for low-latency speech after the first user gesture
    async fn prime(&self) {}
}

/// Ordered speech backends; each failure falls through to the next
#[derive(Clone, Default)]
pub struct FallbackChain {
    backends: Vec<Arc<dyn SpeechBackend>>,
}

impl FallbackChain {
    pub fn new(backends: Vec<Arc<dyn SpeechBackend>>) -> Self {
        Self { backends }
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Speak with the first backend that succeeds.
    ///
    /// Returns the name of that backend, or `None` when every backend
    /// failed and the text was dropped.
    pub async fn speak(&self, text: &str, lang: &str, volume: f32) -> Option<&'static str> {
        for (i, backend) in self.backends.iter().enumerate() {
            match backend.speak(text, lang, volume).await {
                Ok(()) => return Some(backend.name()),
                Err(e) => {
                    warn!("{} speech failed for \"{}\": {}", backend.name(), text, e);
                    if let Some(next) = self.backends.get(i + 1) {
                        info!("Falling back to {} speech", next.name());
                    }
                }
            }
        }
        None
    }
}

/// Optional backends the router is assembled from
#[derive(Clone, Default)]
pub struct AudioBackends {
    pub cloud: Option<Arc<dyn SpeechBackend>>,
    pub synth: Option<Arc<dyn SpeechBackend>>,
    pub clips: Option<Arc<ClipLibrary>>,
}

/// Maps cues to sound for the active sound mode
pub struct AudioRouter {
    channel: Arc<AudioChannel>,
    voice: FallbackChain,
    synth_only: FallbackChain,
    synth: Option<Arc<dyn SpeechBackend>>,
    clips: Option<Arc<ClipLibrary>>,
    tones: ToneBank,
    clip_refs: ClipConfig,
    phrases: PhraseConfig,
    thresholds: CueConfig,
}

impl AudioRouter {
    pub fn new(channel: Arc<AudioChannel>, backends: AudioBackends, config: &PlayerConfig) -> Self {
        let voice = FallbackChain::new(
            backends
                .cloud
                .iter()
                .chain(backends.synth.iter())
                .cloned()
                .collect(),
        );
        let synth_only = FallbackChain::new(backends.synth.iter().cloned().collect());
        let tones = ToneBank::new(&config.audio.tones, channel.sample_rate());

        Self {
            channel,
            voice,
            synth_only,
            synth: backends.synth,
            clips: backends.clips,
            tones,
            clip_refs: config.audio.clips.clone(),
            phrases: config.phrases.clone(),
            thresholds: config.cues.clone(),
        }
    }

    /// Router with the HTTP speech service, the local synthesizer and the
    /// clip library, all playing through `sink`.
    pub fn from_config(config: &PlayerConfig, sink: Arc<dyn AudioSink>) -> Result<Self> {
        let channel = Arc::new(AudioChannel::new(sink));
        let audio = &config.audio;

        let service = HttpSpeechService::new(audio.tts_url.clone(), audio.tts_timeout())?;
        let cloud: Arc<dyn SpeechBackend> =
            Arc::new(CloudSpeech::new(Arc::new(service), Arc::clone(&channel), audio));

        let engine = Arc::new(CommandSpeechEngine::new(&audio.synth));
        let synth: Arc<dyn SpeechBackend> = Arc::new(SynthSpeech::new(engine, &audio.synth));

        let client = reqwest::Client::builder().build()?;
        let clips = Arc::new(ClipLibrary::new(
            client,
            Arc::clone(&channel),
            audio.clips.cache_dir.clone(),
        ));

        info!(
            "Audio router ready (sink: {}, {} Hz)",
            channel.sink_name(),
            channel.sample_rate()
        );

        Ok(Self::new(
            channel,
            AudioBackends {
                cloud: Some(cloud),
                synth: Some(synth),
                clips: Some(clips),
            },
            config,
        ))
    }

    pub fn channel(&self) -> &Arc<AudioChannel> {
        &self.channel
    }

    fn chain_for(&self, mode: SoundMode) -> Option<&FallbackChain> {
        match mode {
            SoundMode::Voice => Some(&self.voice),
            SoundMode::Synth => Some(&self.synth_only),
            _ => None,
        }
    }

    /// Speak `text` in the given mode; silent for non-speaking modes
    pub async fn speak(&self, text: &str, lang: &str, prefs: &UserAudioPreferences) -> Option<&'static str> {
        let chain = self.chain_for(prefs.sound_mode)?;
        chain.speak(text, lang, prefs.volume).await
    }

    /// Render one cue.
    ///
    /// `guard` is checked between the parts of a multi-part announcement;
    /// once the step it belongs to is no longer current the rest is dropped.
    pub async fn play_cue(&self, cue: AudioCue, prefs: &UserAudioPreferences, guard: &ActivationGuard) {
        debug!("Audio cue {} ({})", cue.name(), prefs.sound_mode);

        match prefs.sound_mode {
            SoundMode::None => {}
            SoundMode::Voice | SoundMode::Synth => self.speak_cue(cue, prefs, guard).await,
            SoundMode::Clips => self.clip_cue(cue, prefs, guard).await,
            SoundMode::Beep => match cue {
                AudioCue::Preview { .. } => self.play_tone(ToneKind::Beep, prefs.volume).await,
                AudioCue::Transition { .. } => self.play_tone(ToneKind::Transition, prefs.volume).await,
                _ => {}
            },
        }
    }

    async fn speak_cue(&self, cue: AudioCue, prefs: &UserAudioPreferences, guard: &ActivationGuard) {
        match cue {
            AudioCue::StepStarted { name } => {
                self.speak(&name, detect_lang(&name), prefs).await;
            }
            AudioCue::TimeRemaining { seconds } => {
                let text = self.phrases.time_remaining_text(seconds);
                self.speak(&text, &self.phrases.lang, prefs).await;
            }
            AudioCue::FinalCountdown => {
                self.speak(&self.phrases.final_countdown, &self.phrases.lang, prefs)
                    .await;
            }
            AudioCue::Preview { next: Some(next) } => {
                self.speak(&self.phrases.next_exercise, &self.phrases.lang, prefs)
                    .await;
                if guard.is_current() {
                    self.speak(&next.name, detect_lang(&next.name), prefs).await;
                } else {
                    debug!("Preview of {} is stale; not announcing", next.name);
                }
            }
            AudioCue::Preview { next: None } | AudioCue::Transition { .. } => {}
        }
    }

    async fn clip_cue(&self, cue: AudioCue, prefs: &UserAudioPreferences, guard: &ActivationGuard) {
        let Some(library) = &self.clips else {
            return;
        };

        let references: Vec<String> = match cue {
            AudioCue::TimeRemaining { seconds } if seconds == self.thresholds.long_remaining => {
                self.clip_refs.sixty_seconds.iter().cloned().collect()
            }
            AudioCue::TimeRemaining { seconds } if seconds == self.thresholds.medium_remaining => {
                self.clip_refs.thirty_seconds.iter().cloned().collect()
            }
            AudioCue::FinalCountdown => self.clip_refs.final_countdown.iter().cloned().collect(),
            AudioCue::Preview { next: Some(next) } => self
                .clip_refs
                .next_exercise
                .iter()
                .cloned()
                .chain(next.clip)
                .collect(),
            AudioCue::Transition { clip } => clip.into_iter().collect(),
            _ => Vec::new(),
        };

        if !references.is_empty() {
            library
                .play_sequence(&references, prefs.volume, || guard.is_current())
                .await;
        }
    }

    pub async fn play_tone(&self, kind: ToneKind, volume: f32) {
        if let Err(e) = self.channel.play(self.tones.get(kind), volume).await {
            warn!("Failed to play {:?} tone: {}", kind, e);
        }
    }

    /// First user interaction: unlock on-device speech
    pub async fn on_user_gesture(&self) {
        if let Some(synth) = &self.synth {
            synth.prime().await;
        }
    }

    /// Fetch the clips a workout will need ahead of time
    pub async fn preload(&self, workout_clips: &[String]) {
        let Some(library) = &self.clips else {
            return;
        };

        let references: Vec<String> = [
            &self.clip_refs.sixty_seconds,
            &self.clip_refs.thirty_seconds,
            &self.clip_refs.final_countdown,
            &self.clip_refs.next_exercise,
        ]
        .into_iter()
        .flatten()
        .cloned()
        .chain(workout_clips.iter().cloned())
        .collect();

        debug!("Preloading {} clips", references.len());
        library.preload(&references).await;
    }

    /// Interrupt whatever is playing
    pub fn stop(&self) {
        self.channel.stop();
    }
}
