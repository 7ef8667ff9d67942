//! On-device speech synthesis
//!
//! [`SpeechEngine`] abstracts a local synthesizer that reports progress
//! through [`UtteranceEvent`]s. [`SynthSpeech`] drives it the way the player
//! needs: wait briefly for the voice list, pick and lock one voice per
//! language, cancel whatever is queued, then speak under a watchdog that
//! gives up if the engine never starts and a ceiling on how long a started
//! utterance may run.

use super::lang::{lang_matches, ENGLISH, ITALIAN};
use super::SpeechBackend;
use crate::config::SynthConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Poll interval while waiting for the voice list
const VOICE_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    pub name: String,
    pub lang: String,
}

impl VoiceInfo {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub voice: Option<VoiceInfo>,
    /// 0.0 - 1.0
    pub volume: f32,
}

/// Progress of one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceEvent {
    Started,
    Finished,
    /// Cancelled before it finished
    Interrupted,
    Failed(String),
}

#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Voices known to the engine; empty while still loading
    async fn voices(&self) -> Vec<VoiceInfo>;

    /// Drop the utterance in progress and anything queued
    fn cancel(&self);

    /// Queue an utterance. Progress is reported on the returned receiver;
    /// an engine may also never report anything.
    fn speak(&self, utterance: Utterance) -> Result<mpsc::Receiver<UtteranceEvent>>;
}

/// Pick a voice for `lang`.
///
/// Order: a Google voice for the locale, then the preference list, then
/// any voice for the locale, then any voice at all.
pub fn pick_voice(voices: &[VoiceInfo], lang: &str, preferred: &[String]) -> Option<VoiceInfo> {
    let for_lang: Vec<&VoiceInfo> = voices.iter().filter(|v| lang_matches(&v.lang, lang)).collect();

    for_lang
        .iter()
        .find(|v| v.name.to_lowercase().contains("google"))
        .copied()
        .or_else(|| {
            preferred.iter().find_map(|wanted| {
                for_lang
                    .iter()
                    .find(|v| v.name.contains(wanted.as_str()))
                    .copied()
            })
        })
        .or_else(|| for_lang.first().copied())
        .or_else(|| voices.first())
        .cloned()
}

/// Synth-mode speech backend
pub struct SynthSpeech {
    engine: std::sync::Arc<dyn SpeechEngine>,
    preferred: BTreeMap<String, Vec<String>>,
    locked: Mutex<HashMap<String, VoiceInfo>>,
    watchdog: Duration,
    max_utterance: Duration,
    voice_wait: Duration,
    prime_watchdog: Duration,
    primed: AtomicBool,
}

impl SynthSpeech {
    pub fn new(engine: std::sync::Arc<dyn SpeechEngine>, config: &SynthConfig) -> Self {
        Self {
            engine,
            preferred: config.preferred_voices.clone(),
            locked: Mutex::new(HashMap::new()),
            watchdog: Duration::from_millis(config.watchdog_ms),
            max_utterance: Duration::from_millis(config.max_utterance_ms),
            voice_wait: Duration::from_millis(config.voice_wait_ms),
            prime_watchdog: Duration::from_millis(config.prime_watchdog_ms),
            primed: AtomicBool::new(false),
        }
    }

    /// Poll the engine until it lists voices or the wait runs out
    async fn wait_for_voices(&self) -> Vec<VoiceInfo> {
        let deadline = tokio::time::Instant::now() + self.voice_wait;
        loop {
            let voices = self.engine.voices().await;
            if !voices.is_empty() || tokio::time::Instant::now() >= deadline {
                return voices;
            }
            tokio::time::sleep(VOICE_POLL_INTERVAL).await;
        }
    }

    /// Voice for `lang`; the first choice is kept for the session
    fn voice_for(&self, voices: &[VoiceInfo], lang: &str) -> Option<VoiceInfo> {
        let mut locked = self.locked.lock().ok()?;
        if let Some(voice) = locked.get(lang) {
            return Some(voice.clone());
        }

        let preferred = self.preferred.get(lang).map(Vec::as_slice).unwrap_or(&[]);
        let voice = pick_voice(voices, lang, preferred)?;
        info!("Synth voice for {}: {} ({})", lang, voice.name, voice.lang);
        locked.insert(lang.to_string(), voice.clone());
        Some(voice)
    }

    pub fn locked_voice(&self, lang: &str) -> Option<VoiceInfo> {
        self.locked.lock().ok()?.get(lang).cloned()
    }

    async fn say(&self, text: &str, lang: &str, volume: f32, watchdog: Duration) -> Result<()> {
        let voices = self.wait_for_voices().await;
        let voice = self.voice_for(&voices, lang);

        self.engine.cancel();
        let utterance = Utterance {
            text: text.to_string(),
            lang: voice.as_ref().map(|v| v.lang.clone()).unwrap_or_else(|| lang.to_string()),
            voice,
            volume: volume.clamp(0.0, 1.0),
        };
        let mut events = self.engine.speak(utterance)?;

        match tokio::time::timeout(watchdog, events.recv()).await {
            Err(_) => {
                debug!("Synth did not start within {:?}; giving up", watchdog);
                self.engine.cancel();
                return Ok(());
            }
            Ok(None) => return Ok(()),
            Ok(Some(event)) => {
                if let Some(result) = settle(event) {
                    return result;
                }
            }
        }

        let finish = async {
            while let Some(event) = events.recv().await {
                if let Some(result) = settle(event) {
                    return result;
                }
            }
            Ok(())
        };

        match tokio::time::timeout(self.max_utterance, finish).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Synth utterance still running after {:?}; cancelling", self.max_utterance);
                self.engine.cancel();
                Ok(())
            }
        }
    }

    /// Speak a silent utterance once, so later speech starts promptly
    pub async fn prime_once(&self) {
        if self.primed.swap(true, Ordering::SeqCst) {
            return;
        }

        let voices = self.wait_for_voices().await;
        for lang in [ITALIAN, ENGLISH] {
            let _ = self.voice_for(&voices, lang);
        }

        if let Err(e) = self.say(" ", ENGLISH, 0.0, self.prime_watchdog).await {
            debug!("Synth priming failed: {}", e);
        }
    }

    pub fn is_primed(&self) -> bool {
        self.primed.load(Ordering::SeqCst)
    }
}

/// Final outcome for terminal events; `None` keeps waiting
fn settle(event: UtteranceEvent) -> Option<Result<()>> {
    match event {
        UtteranceEvent::Started => None,
        UtteranceEvent::Finished | UtteranceEvent::Interrupted => Some(Ok(())),
        UtteranceEvent::Failed(reason) => Some(Err(Error::Speech(reason))),
    }
}

#[async_trait]
impl SpeechBackend for SynthSpeech {
    fn name(&self) -> &'static str {
        "synth"
    }

    async fn speak(&self, text: &str, lang: &str, volume: f32) -> Result<()> {
        self.say(text, lang, volume, self.watchdog).await
    }

    async fn prime(&self) {
        self.prime_once().await;
    }
}

/// Speech engine backed by a local program such as `espeak-ng`
pub struct CommandSpeechEngine {
    command: String,
    args: Vec<String>,
    list_voices_args: Vec<String>,
    voices: tokio::sync::OnceCell<Vec<VoiceInfo>>,
    current: Mutex<Option<CancellationToken>>,
}

impl CommandSpeechEngine {
    pub fn new(config: &SynthConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            list_voices_args: config.list_voices_args.clone(),
            voices: tokio::sync::OnceCell::new(),
            current: Mutex::new(None),
        }
    }

    fn build_args(&self, utterance: &Utterance) -> Vec<String> {
        let voice = utterance
            .voice
            .as_ref()
            .map(|v| v.name.clone())
            .unwrap_or_else(|| utterance.lang.clone());
        let volume = ((utterance.volume * 100.0).round() as u32).to_string();

        self.args
            .iter()
            .map(|arg| {
                arg.replace("{voice}", &voice)
                    .replace("{volume}", &volume)
                    .replace("{text}", &utterance.text)
            })
            .collect()
    }

    async fn list_voices(&self) -> Vec<VoiceInfo> {
        match Command::new(&self.command)
            .args(&self.list_voices_args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                parse_voice_list(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                warn!("{} voice listing exited with {}", self.command, output.status);
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to run {}: {}", self.command, e);
                Vec::new()
            }
        }
    }
}

/// Parse `espeak-ng --voices` output.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  it              --/M      Italian            roa/it
/// ```
pub fn parse_voice_list(output: &str) -> Vec<VoiceInfo> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [_priority, lang, _gender, name, ..] => Some(VoiceInfo::new(*name, *lang)),
                _ => None,
            }
        })
        .collect()
}

#[async_trait]
impl SpeechEngine for CommandSpeechEngine {
    async fn voices(&self) -> Vec<VoiceInfo> {
        self.voices
            .get_or_init(|| self.list_voices())
            .await
            .clone()
    }

    fn cancel(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(token) = current.take() {
                token.cancel();
            }
        }
    }

    fn speak(&self, utterance: Utterance) -> Result<mpsc::Receiver<UtteranceEvent>> {
        let mut child = Command::new(&self.command)
            .args(self.build_args(&utterance))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Speech(format!("Failed to start {}: {}", self.command, e)))?;

        let token = CancellationToken::new();
        if let Ok(mut current) = self.current.lock() {
            if let Some(previous) = current.replace(token.clone()) {
                previous.cancel();
            }
        }

        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            // Only a process that is still running has started speaking
            if let Ok(None) = child.try_wait() {
                let _ = tx.send(UtteranceEvent::Started).await;
            }

            let status = tokio::select! {
                status = child.wait() => Some(status),
                _ = token.cancelled() => None,
            };

            let event = match status {
                Some(Ok(status)) if status.success() => UtteranceEvent::Finished,
                Some(Ok(status)) => UtteranceEvent::Failed(format!("synthesizer exited with {}", status)),
                Some(Err(e)) => UtteranceEvent::Failed(e.to_string()),
                None => {
                    let _ = child.kill().await;
                    UtteranceEvent::Interrupted
                }
            };
            let _ = tx.send(event).await;
        });

        Ok(rx)
    }
}
