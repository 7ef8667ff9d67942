//! Audio resampling using rubato
//!
//! Converts decoded speech and clips to the output sink's sample rate.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Whole-clip resampler
pub struct Resampler;

impl Resampler {
    /// Resample interleaved audio from `input_rate` to `output_rate`.
    ///
    /// Returns a copy unchanged when the rates already match.
    pub fn resample(
        input: &[f32],
        input_rate: u32,
        output_rate: u32,
        channels: u16,
    ) -> Result<Vec<f32>> {
        if input_rate == output_rate || input.is_empty() {
            return Ok(input.to_vec());
        }
        if input_rate == 0 || output_rate == 0 || channels == 0 {
            return Err(Error::Decode(format!(
                "Cannot resample {} Hz -> {} Hz with {} channels",
                input_rate, output_rate, channels
            )));
        }

        debug!(
            "Resampling from {}Hz to {}Hz ({} channels)",
            input_rate, output_rate, channels
        );

        let planar_input = Self::deinterleave(input, channels);
        let input_frames = planar_input[0].len();

        let mut resampler = FastFixedIn::<f32>::new(
            f64::from(output_rate) / f64::from(input_rate),
            1.0,
            PolynomialDegree::Septic,
            input_frames,
            usize::from(channels),
        )
        .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

        let planar_output = resampler
            .process(&planar_input, None)
            .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

        Ok(Self::interleave(planar_output))
    }

    /// `[L, R, L, R, ...]` → `[[L, L, ...], [R, R, ...]]`
    fn deinterleave(samples: &[f32], channels: u16) -> Vec<Vec<f32>> {
        let num_channels = usize::from(channels);
        let num_frames = samples.len() / num_channels;
        let mut planar = vec![Vec::with_capacity(num_frames); num_channels];

        for frame in samples.chunks_exact(num_channels) {
            for (ch, sample) in frame.iter().enumerate() {
                planar[ch].push(*sample);
            }
        }

        planar
    }

    /// `[[L, L, ...], [R, R, ...]]` → `[L, R, L, R, ...]`
    fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
        let Some(first) = planar.first() else {
            return Vec::new();
        };
        let num_frames = first.len();
        let mut interleaved = Vec::with_capacity(num_frames * planar.len());

        for frame_idx in 0..num_frames {
            for channel in &planar {
                interleaved.push(channel[frame_idx]);
            }
        }

        interleaved
    }
}
