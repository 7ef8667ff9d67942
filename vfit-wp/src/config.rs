//! vfit-wp specific configuration
//!
//! Every field has a compiled default, so a missing or partial TOML file
//! still yields a working player.

use crate::countdown::cues::CueSchedule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Workout player configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub audio: AudioConfig,
    pub cues: CueConfig,
    pub phrases: PhraseConfig,
    pub playback: PlaybackConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

impl PlayerConfig {
    /// Load from the resolved config file (CLI → env → platform → defaults)
    pub fn load(cli_path: Option<&Path>) -> crate::Result<Self> {
        let path = vfit_common::config::resolve_config_file(
            cli_path,
            vfit_common::config::CONFIG_ENV_VAR,
        );
        Ok(vfit_common::config::load_toml_or_default(path.as_deref())?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Cloud text-to-speech endpoint
    pub tts_url: String,
    pub tts_timeout_ms: u64,
    /// Retries after the first attempt
    pub tts_retries: u32,
    /// Linear backoff base; attempt N waits `base * (N + 1)`
    pub tts_backoff_ms: u64,
    /// Gain applied to cloud speech on top of the user volume
    pub voice_gain: f32,
    /// Cloud voice per language tag
    pub cloud_voices: BTreeMap<String, String>,
    pub synth: SynthConfig,
    pub clips: ClipConfig,
    pub tones: ToneConfig,
    /// Sample rate of the headless sink
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let mut cloud_voices = BTreeMap::new();
        cloud_voices.insert("it-IT".to_string(), "it-IT-Wavenet-C".to_string());
        cloud_voices.insert("en-US".to_string(), "en-US-Wavenet-D".to_string());

        Self {
            tts_url: "https://google-tts-server.onrender.com/speak".to_string(),
            tts_timeout_ms: 9000,
            tts_retries: 2,
            tts_backoff_ms: 350,
            voice_gain: 2.5,
            cloud_voices,
            synth: SynthConfig::default(),
            clips: ClipConfig::default(),
            tones: ToneConfig::default(),
            sample_rate: 44100,
        }
    }
}

impl AudioConfig {
    pub fn tts_timeout(&self) -> Duration {
        Duration::from_millis(self.tts_timeout_ms)
    }

    pub fn tts_backoff(&self) -> Duration {
        Duration::from_millis(self.tts_backoff_ms)
    }
}

/// On-device synthesis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Local TTS program
    pub command: String,
    /// Arguments; `{voice}`, `{volume}` and `{text}` are substituted
    pub args: Vec<String>,
    /// Arguments that make the program list its voices
    pub list_voices_args: Vec<String>,
    /// Preferred voice names per language, best first
    pub preferred_voices: BTreeMap<String, Vec<String>>,
    /// Longest wait for the synthesizer's first event
    pub watchdog_ms: u64,
    /// Longest an utterance may run once started; the process is killed after
    pub max_utterance_ms: u64,
    /// How long to wait for the voice list to become available
    pub voice_wait_ms: u64,
    pub prime_watchdog_ms: u64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        let mut preferred_voices = BTreeMap::new();
        preferred_voices.insert(
            "it-IT".to_string(),
            vec![
                "Siri Voice 4".to_string(),
                "Siri Voice 3".to_string(),
                "Google italiano".to_string(),
                "Microsoft Elsa".to_string(),
                "Microsoft Lucia".to_string(),
            ],
        );
        preferred_voices.insert(
            "en-US".to_string(),
            vec![
                "Siri Voice 3".to_string(),
                "Siri Voice 2".to_string(),
                "Google US English".to_string(),
                "Microsoft Aria".to_string(),
                "Microsoft Jenny".to_string(),
            ],
        );

        Self {
            command: "espeak-ng".to_string(),
            args: vec![
                "-v".to_string(),
                "{voice}".to_string(),
                "-a".to_string(),
                "{volume}".to_string(),
                "{text}".to_string(),
            ],
            list_voices_args: vec!["--voices".to_string()],
            preferred_voices,
            watchdog_ms: 3000,
            max_utterance_ms: 6000,
            voice_wait_ms: 1500,
            prime_watchdog_ms: 250,
        }
    }
}

/// Pre-recorded clip references for the clips sound mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipConfig {
    pub sixty_seconds: Option<String>,
    pub thirty_seconds: Option<String>,
    pub final_countdown: Option<String>,
    pub next_exercise: Option<String>,
    /// Directory caching downloaded clips; memory only when unset
    pub cache_dir: Option<PathBuf>,
}

impl Default for ClipConfig {
    fn default() -> Self {
        let base = "https://github.com/tommyv-spec/workout-audio/raw/refs/heads/main/docs";
        Self {
            sixty_seconds: Some(format!("{}/mancano%2060%20secondi.mp3", base)),
            thirty_seconds: Some(format!("{}/mancano%2030%20secondi.mp3", base)),
            final_countdown: Some(format!("{}/count%20down%20pi%C3%B9%20veloce.MP3", base)),
            next_exercise: Some(format!("{}/Prossimo%20esercizio.MP3", base)),
            cache_dir: None,
        }
    }
}

/// Generated tone settings for the beep sound mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    pub beep_hz: f32,
    pub beep_ms: u64,
    /// Rising two-note transition tone
    pub transition_low_hz: f32,
    pub transition_high_hz: f32,
    pub transition_note_ms: u64,
    pub amplitude: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            beep_hz: 880.0,
            beep_ms: 150,
            transition_low_hz: 660.0,
            transition_high_hz: 990.0,
            transition_note_ms: 120,
            amplitude: 0.5,
        }
    }
}

/// Countdown thresholds in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CueConfig {
    pub long_remaining: u32,
    pub medium_remaining: u32,
    pub preview: u32,
    pub warning: u32,
    pub final_countdown: u32,
    pub critical: u32,
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            long_remaining: 60,
            medium_remaining: 30,
            preview: 10,
            warning: 6,
            final_countdown: 5,
            critical: 3,
        }
    }
}

impl CueConfig {
    pub fn schedule(&self) -> CueSchedule {
        CueSchedule::from_config(self)
    }
}

/// Spoken texts and the language each is spoken in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhraseConfig {
    pub lang: String,
    /// Announcement per remaining-seconds threshold
    pub time_remaining: BTreeMap<String, String>,
    /// Used for thresholds without an entry; `{seconds}` is substituted
    pub time_remaining_fallback: String,
    pub final_countdown: String,
    pub next_exercise: String,
}

impl Default for PhraseConfig {
    fn default() -> Self {
        let mut time_remaining = BTreeMap::new();
        time_remaining.insert("60".to_string(), "mancano sessanta secondi".to_string());
        time_remaining.insert("30".to_string(), "mancano trenta secondi".to_string());

        Self {
            lang: "it-IT".to_string(),
            time_remaining,
            time_remaining_fallback: "mancano {seconds} secondi".to_string(),
            final_countdown: "cinque, quattro, tre, due, uno".to_string(),
            next_exercise: "prossimo esercizio:".to_string(),
        }
    }
}

impl PhraseConfig {
    pub fn time_remaining_text(&self, seconds: u32) -> String {
        self.time_remaining
            .get(&seconds.to_string())
            .cloned()
            .unwrap_or_else(|| {
                self.time_remaining_fallback
                    .replace("{seconds}", &seconds.to_string())
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Countdown polling interval
    pub tick_interval_ms: u64,
    pub event_capacity: usize,
    /// Seconds added by the "+" control
    pub add_time_step: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 200,
            event_capacity: 1000,
            add_time_step: 10,
        }
    }
}

impl PlaybackConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(10))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 5810,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Explicit database file; `<data folder>/vfit.db` when unset
    pub path: Option<PathBuf>,
}
