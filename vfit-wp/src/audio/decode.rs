//! Audio decoder using symphonia
//!
//! Decodes speech returned by the cloud TTS service and pre-recorded clips
//! (MP3, WAV, Vorbis) from memory into interleaved f32 PCM, then converts
//! them to the output sink's sample rate.

use super::resampler::Resampler;
use super::types::PcmClip;
use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decode an in-memory audio file.
///
/// `extension` is an optional format hint ("mp3", "wav"); the content is
/// probed either way.
pub fn decode_bytes(data: Vec<u8>, extension: Option<&str>) -> Result<PcmClip> {
    if data.is_empty() {
        return Err(Error::Decode("Empty audio payload".to_string()));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

    let track_id = track.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(e) => {
                warn!("Decode error: {}", e);
                continue;
            }
        }
    }

    if samples.is_empty() || sample_rate == 0 || channels == 0 {
        return Err(Error::Decode("No audio frames decoded".to_string()));
    }

    debug!(
        "Decoded {} frames at {} Hz ({} channels)",
        samples.len() / usize::from(channels),
        sample_rate,
        channels
    );

    Ok(PcmClip::new(samples, sample_rate, channels))
}

/// Decode and convert to `target_rate`.
pub fn decode_for_output(data: Vec<u8>, extension: Option<&str>, target_rate: u32) -> Result<PcmClip> {
    let clip = decode_bytes(data, extension)?;
    if clip.sample_rate == target_rate {
        return Ok(clip);
    }

    let resampled = Resampler::resample(&clip.samples, clip.sample_rate, target_rate, clip.channels)?;
    Ok(PcmClip::new(resampled, target_rate, clip.channels))
}

/// Extension of a clip reference, used as a format hint
pub fn extension_hint(reference: &str) -> Option<String> {
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    let file = path.rsplit('/').next().unwrap_or(path);
    file.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5)
}
