//! Audio output
//!
//! An [`AudioSink`] renders one clip at a time. The [`AudioChannel`] in
//! front of it is the single shared output of the player: starting a new
//! clip cancels the one in flight, and volume/gain are applied there.
//!
//! Sinks must stop their clip when the `play` future is dropped; that is
//! how the channel interrupts playback.

use super::types::PcmClip;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

#[async_trait]
pub trait AudioSink: Send + Sync {
    fn name(&self) -> &str;

    /// Rate clips should be delivered at
    fn sample_rate(&self) -> u32;

    /// Play `clip`, resolving when it finished.
    async fn play(&self, clip: PcmClip) -> Result<()>;
}

/// Headless sink: takes as long as the clip would, produces no sound.
#[derive(Debug, Clone)]
pub struct NullSink {
    sample_rate: u32,
}

impl NullSink {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

#[async_trait]
impl AudioSink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn play(&self, clip: PcmClip) -> Result<()> {
        trace!("Null sink playing {:?} of audio", clip.duration());
        tokio::time::sleep(clip.duration()).await;
        Ok(())
    }
}

/// Single shared output channel with cancel-and-replace semantics
pub struct AudioChannel {
    sink: Arc<dyn AudioSink>,
    current: Mutex<Option<(u64, CancellationToken)>>,
    next_id: AtomicU64,
}

impl AudioChannel {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self {
            sink,
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sink.sample_rate()
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    /// Play `clip` scaled by `gain`, replacing whatever is playing.
    ///
    /// Returns `Ok(true)` when the clip played to the end and `Ok(false)`
    /// when a later `play` or `stop` interrupted it.
    pub async fn play(&self, clip: PcmClip, gain: f32) -> Result<bool> {
        let clip = clip.with_gain(gain);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        {
            let mut current = self
                .current
                .lock()
                .map_err(|_| Error::Internal("audio channel lock poisoned".to_string()))?;
            if let Some((previous, previous_token)) = current.replace((id, token.clone())) {
                debug!("Interrupting clip {} for clip {}", previous, id);
                previous_token.cancel();
            }
        }

        let outcome = tokio::select! {
            result = self.sink.play(clip) => result.map(|_| true),
            _ = token.cancelled() => Ok(false),
        };

        if let Ok(mut current) = self.current.lock() {
            if matches!(current.as_ref(), Some((current_id, _)) if *current_id == id) {
                *current = None;
            }
        }

        outcome
    }

    /// Interrupt the clip in flight, if any
    pub fn stop(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some((_, token)) = current.take() {
                token.cancel();
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.current.lock().map(|c| c.is_some()).unwrap_or(false)
    }
}

#[cfg(feature = "device-output")]
pub use device::CpalSink;

#[cfg(feature = "device-output")]
mod device {
    //! System audio device output using cpal
    //!
    //! cpal streams are not `Send`, so each clip is rendered on its own
    //! short-lived thread that owns the stream.

    use super::{AudioSink, PcmClip};
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tracing::{info, warn};

    pub struct CpalSink {
        device_name: Option<String>,
        sample_rate: u32,
        channels: u16,
    }

    impl CpalSink {
        /// Open the named output device, or the default one
        pub fn open(device_name: Option<String>) -> Result<Self> {
            let device = find_device(device_name.as_deref())?;
            let config = device
                .default_output_config()
                .map_err(|e| Error::Audio(format!("Failed to get device config: {}", e)))?;

            let sink = Self {
                device_name,
                sample_rate: config.sample_rate().0,
                channels: config.channels(),
            };
            info!(
                "Audio device opened: {} Hz, {} channels",
                sink.sample_rate, sink.channels
            );
            Ok(sink)
        }
    }

    fn find_device(name: Option<&str>) -> Result<cpal::Device> {
        let host = cpal::default_host();
        match name {
            Some(wanted) => host
                .output_devices()
                .map_err(|e| Error::Audio(format!("Failed to enumerate devices: {}", e)))?
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| Error::Audio(format!("Audio device not found: {}", wanted))),
            None => host
                .default_output_device()
                .ok_or_else(|| Error::Audio("No default output device".to_string())),
        }
    }

    /// Sets the stop flag when the `play` future is dropped
    struct StopOnDrop(Arc<AtomicBool>);

    impl Drop for StopOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::Relaxed);
        }
    }

    #[async_trait]
    impl AudioSink for CpalSink {
        fn name(&self) -> &str {
            "cpal"
        }

        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        async fn play(&self, clip: PcmClip) -> Result<()> {
            let stop = Arc::new(AtomicBool::new(false));
            let _guard = StopOnDrop(Arc::clone(&stop));
            let (done_tx, done_rx) = oneshot::channel();
            let device_name = self.device_name.clone();
            let channels = self.channels;
            let sample_rate = self.sample_rate;

            std::thread::spawn(move || {
                let result = render(device_name, sample_rate, channels, clip, stop);
                let _ = done_tx.send(result);
            });

            done_rx
                .await
                .map_err(|_| Error::Audio("Audio thread exited unexpectedly".to_string()))?
        }
    }

    fn render(
        device_name: Option<String>,
        sample_rate: u32,
        channels: u16,
        clip: PcmClip,
        stop: Arc<AtomicBool>,
    ) -> Result<()> {
        let device = find_device(device_name.as_deref())?;
        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let frames = clip.frames();
        let position = Arc::new(AtomicUsize::new(0));
        let cursor = Arc::clone(&position);
        let out_channels = usize::from(channels);
        let in_channels = usize::from(clip.channels);
        let samples = Arc::clone(&clip.samples);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut frame = cursor.load(Ordering::Relaxed);
                    for out in data.chunks_mut(out_channels) {
                        for (ch, sample) in out.iter_mut().enumerate() {
                            *sample = if frame < frames {
                                samples[frame * in_channels + ch.min(in_channels - 1)]
                            } else {
                                0.0
                            };
                        }
                        frame += 1;
                    }
                    cursor.store(frame, Ordering::Relaxed);
                },
                |err| warn!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| Error::Audio(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| Error::Audio(format!("Failed to start stream: {}", e)))?;

        while position.load(Ordering::Relaxed) < frames && !stop.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(10));
        }

        Ok(())
    }
}
