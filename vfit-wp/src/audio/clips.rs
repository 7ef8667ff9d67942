//! Pre-recorded clips
//!
//! Clips are referenced by URL or local path. They are fetched once,
//! decoded at the output rate and kept in memory; downloads can also be
//! cached on disk.

use super::decode::{decode_for_output, extension_hint};
use super::output::AudioChannel;
use super::types::PcmClip;
use crate::error::{Error, Result};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct ClipLibrary {
    client: reqwest::Client,
    channel: Arc<AudioChannel>,
    cache: Mutex<HashMap<String, PcmClip>>,
    cache_dir: Option<PathBuf>,
}

impl ClipLibrary {
    pub fn new(client: reqwest::Client, channel: Arc<AudioChannel>, cache_dir: Option<PathBuf>) -> Self {
        Self {
            client,
            channel,
            cache: Mutex::new(HashMap::new()),
            cache_dir,
        }
    }

    /// Decoded clip for `reference`, fetching it on first use
    pub async fn load(&self, reference: &str) -> Result<PcmClip> {
        if let Some(clip) = self.cache.lock().await.get(reference) {
            return Ok(clip.clone());
        }

        let data = self.fetch(reference).await?;
        let hint = extension_hint(reference);
        let rate = self.channel.sample_rate();
        let clip = tokio::task::spawn_blocking(move || decode_for_output(data, hint.as_deref(), rate))
            .await
            .map_err(|e| Error::Internal(format!("Decode task failed: {}", e)))??;

        self.cache
            .lock()
            .await
            .insert(reference.to_string(), clip.clone());
        Ok(clip)
    }

    pub async fn is_cached(&self, reference: &str) -> bool {
        self.cache.lock().await.contains_key(reference)
    }

    async fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        if !is_remote(reference) {
            return Ok(tokio::fs::read(reference).await?);
        }

        let cached_file = self.cache_dir.as_ref().map(|dir| dir.join(cache_file_name(reference)));
        if let Some(path) = &cached_file {
            if let Ok(data) = tokio::fs::read(path).await {
                debug!("Clip cache hit: {}", path.display());
                return Ok(data);
            }
        }

        debug!("Downloading clip {}", reference);
        let response = self.client.get(reference).send().await?.error_for_status()?;
        let data = response.bytes().await?.to_vec();

        if let Some(path) = &cached_file {
            if let Some(parent) = path.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    warn!("Failed to create clip cache folder {}: {}", parent.display(), e);
                }
            }
            if let Err(e) = tokio::fs::write(path, &data).await {
                warn!("Failed to cache clip at {}: {}", path.display(), e);
            }
        }

        Ok(data)
    }

    /// Play one clip; `Ok(false)` when it was interrupted
    pub async fn play(&self, reference: &str, volume: f32) -> Result<bool> {
        let clip = self.load(reference).await?;
        self.channel.play(clip, volume).await
    }

    /// Play clips back to back.
    ///
    /// A clip that fails to load is skipped. Stops when `still_current`
    /// turns false or a clip is interrupted.
    pub async fn play_sequence<F>(&self, references: &[String], volume: f32, still_current: F)
    where
        F: Fn() -> bool,
    {
        for reference in references {
            if !still_current() {
                return;
            }
            match self.play(reference, volume).await {
                Ok(true) => {}
                Ok(false) => return,
                Err(e) => warn!("Skipping clip {}: {}", reference, e),
            }
        }
    }

    /// Fetch and decode clips ahead of time
    pub async fn preload(&self, references: &[String]) {
        for reference in references {
            if let Err(e) = self.load(reference).await {
                warn!("Failed to preload clip {}: {}", reference, e);
            }
        }
    }
}

fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

fn cache_file_name(reference: &str) -> String {
    let mut hasher = DefaultHasher::new();
    reference.hash(&mut hasher);
    match extension_hint(reference) {
        Some(ext) => format!("{:016x}.{}", hasher.finish(), ext),
        None => format!("{:016x}", hasher.finish()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output::NullSink;
    use std::time::Duration;

    fn wav_bytes(frames: usize, sample_rate: u32) -> Vec<u8> {
        let data_len = (frames * 2) as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.extend(std::iter::repeat(0u8).take(frames * 2));
        out
    }

    fn library() -> ClipLibrary {
        let channel = Arc::new(AudioChannel::new(Arc::new(NullSink::new(8000))));
        ClipLibrary::new(reqwest::Client::new(), channel, None)
    }

    #[tokio::test]
    async fn test_loads_and_caches_local_clip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beep.wav");
        std::fs::write(&path, wav_bytes(800, 8000)).unwrap();
        let reference = path.to_string_lossy().to_string();

        let library = library();
        let clip = library.load(&reference).await.unwrap();
        assert_eq!(clip.duration(), Duration::from_millis(100));
        assert!(library.is_cached(&reference).await);

        // Served from memory once the file is gone
        std::fs::remove_file(&path).unwrap();
        assert!(library.load(&reference).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_clip_is_error() {
        let library = library();
        assert!(library.load("/nonexistent/clip.mp3").await.is_err());
    }

    #[tokio::test]
    async fn test_sequence_skips_broken_clip() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.wav");
        std::fs::write(&good, wav_bytes(80, 8000)).unwrap();

        let library = library();
        let references = vec![
            "/nonexistent/missing.wav".to_string(),
            good.to_string_lossy().to_string(),
        ];
        library.play_sequence(&references, 1.0, || true).await;

        assert!(library.is_cached(&references[1]).await);
    }

    #[tokio::test]
    async fn test_unusable_cache_folder_still_returns_clip() {
        let body = wav_bytes(800, 8000);
        let app = axum::Router::new().route(
            "/clip.wav",
            axum::routing::get(move || {
                let body = body.clone();
                async move { body }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // A regular file where the cache folder should be
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-folder");
        std::fs::write(&blocker, b"x").unwrap();

        let channel = Arc::new(AudioChannel::new(Arc::new(NullSink::new(8000))));
        let library = ClipLibrary::new(reqwest::Client::new(), channel, Some(blocker.join("clips")));
        let reference = format!("http://{}/clip.wav", addr);

        let clip = library.load(&reference).await.unwrap();
        assert_eq!(clip.duration(), Duration::from_millis(100));
        assert!(blocker.is_file());
    }

    #[test]
    fn test_cache_file_name_keeps_extension() {
        let name = cache_file_name("https://example.com/a/Prossimo%20esercizio.MP3");
        assert!(name.ends_with(".mp3"));
        assert_ne!(name, cache_file_name("https://example.com/b.mp3"));
    }
}
