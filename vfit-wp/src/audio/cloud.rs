//! Cloud text-to-speech backend
//!
//! Posts `{text, lang, voice}` to the TTS server, decodes the returned
//! audio and plays it through the shared channel with a gain boost.
//! Each attempt is bounded by a timeout; failed attempts are retried with
//! a linear backoff.

use super::decode::decode_for_output;
use super::output::AudioChannel;
use super::lang::{lang_matches, ENGLISH};
use super::SpeechBackend;
use crate::config::AudioConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Body of a synthesis request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub lang: String,
    pub voice: String,
}

/// Something that turns text into encoded audio
#[async_trait]
pub trait SpeechService: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>>;
}

/// TTS server reached over HTTP
pub struct HttpSpeechService {
    client: reqwest::Client,
    url: String,
}

impl HttpSpeechService {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SpeechService for HttpSpeechService {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        let response = self.client.post(&self.url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let details = response
                .text()
                .await
                .unwrap_or_else(|_| "No error details".to_string());
            return Err(Error::Speech(format!("TTS server error {}: {}", status, details)));
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(Error::Speech("TTS server returned empty audio".to_string()));
        }

        Ok(body.to_vec())
    }
}

/// Voice-mode speech: cloud synthesis played through the shared channel
pub struct CloudSpeech {
    service: Arc<dyn SpeechService>,
    channel: Arc<AudioChannel>,
    voices: BTreeMap<String, String>,
    attempt_timeout: Duration,
    retries: u32,
    backoff: Duration,
    gain: f32,
}

impl CloudSpeech {
    pub fn new(service: Arc<dyn SpeechService>, channel: Arc<AudioChannel>, config: &AudioConfig) -> Self {
        Self {
            service,
            channel,
            voices: config.cloud_voices.clone(),
            attempt_timeout: config.tts_timeout(),
            retries: config.tts_retries,
            backoff: config.tts_backoff(),
            gain: config.voice_gain,
        }
    }

    /// Cloud voice for a language, falling back to the English voice
    pub fn voice_for(&self, lang: &str) -> String {
        self.voices
            .get(lang)
            .or_else(|| {
                self.voices
                    .iter()
                    .find(|(tag, _)| lang_matches(tag, super::lang::primary_subtag(lang)))
                    .map(|(_, voice)| voice)
            })
            .or_else(|| self.voices.get(ENGLISH))
            .cloned()
            .unwrap_or_default()
    }

    /// Fetch synthesized audio, retrying failed attempts
    pub async fn fetch(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        let mut last_error = None;

        for attempt in 0..=self.retries {
            match tokio::time::timeout(self.attempt_timeout, self.service.synthesize(request)).await {
                Ok(Ok(audio)) => return Ok(audio),
                Ok(Err(e)) => {
                    warn!("Cloud TTS attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
                Err(_) => {
                    warn!(
                        "Cloud TTS attempt {} timed out after {:?}",
                        attempt + 1,
                        self.attempt_timeout
                    );
                    last_error = Some(Error::Speech("TTS request timed out".to_string()));
                }
            }

            if attempt < self.retries {
                tokio::time::sleep(self.backoff * (attempt + 1)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Speech("TTS request not attempted".to_string())))
    }
}

#[async_trait]
impl SpeechBackend for CloudSpeech {
    fn name(&self) -> &'static str {
        "cloud"
    }

    async fn speak(&self, text: &str, lang: &str, volume: f32) -> Result<()> {
        let request = SynthesisRequest {
            text: text.to_string(),
            lang: lang.to_string(),
            voice: self.voice_for(lang),
        };
        debug!("Cloud TTS: \"{}\" ({}, {})", request.text, request.lang, request.voice);

        let audio = self.fetch(&request).await?;
        let rate = self.channel.sample_rate();
        let clip = tokio::task::spawn_blocking(move || decode_for_output(audio, Some("mp3"), rate))
            .await
            .map_err(|e| Error::Internal(format!("Decode task failed: {}", e)))??;

        self.channel.play(clip, volume * self.gain).await?;
        Ok(())
    }
}
