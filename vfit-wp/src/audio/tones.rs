//! Generated tones for the beep sound mode

use super::types::PcmClip;
use crate::config::ToneConfig;
use std::f32::consts::TAU;

/// Edge fade so tones start and stop without clicks
const FADE_MS: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneKind {
    /// Short tone at a step boundary (preview)
    Beep,
    /// Rising two-note tone when the countdown reaches zero
    Transition,
}

/// Pre-rendered tones at the output sample rate
#[derive(Debug, Clone)]
pub struct ToneBank {
    beep: PcmClip,
    transition: PcmClip,
}

impl ToneBank {
    pub fn new(config: &ToneConfig, sample_rate: u32) -> Self {
        let beep = sine(config.beep_hz, config.beep_ms, sample_rate, config.amplitude);

        let mut transition = sine(
            config.transition_low_hz,
            config.transition_note_ms,
            sample_rate,
            config.amplitude,
        );
        transition.extend(sine(
            config.transition_high_hz,
            config.transition_note_ms,
            sample_rate,
            config.amplitude,
        ));

        Self {
            beep: PcmClip::new(beep, sample_rate, 1),
            transition: PcmClip::new(transition, sample_rate, 1),
        }
    }

    pub fn get(&self, kind: ToneKind) -> PcmClip {
        match kind {
            ToneKind::Beep => self.beep.clone(),
            ToneKind::Transition => self.transition.clone(),
        }
    }
}

fn sine(freq: f32, duration_ms: u64, sample_rate: u32, amplitude: f32) -> Vec<f32> {
    let rate = sample_rate as f32;
    let frames = (duration_ms as f32 * rate / 1000.0) as usize;
    let fade_frames = ((FADE_MS * rate / 1000.0) as usize).clamp(1, frames.max(1));

    (0..frames)
        .map(|i| {
            let envelope = if i < fade_frames {
                i as f32 / fade_frames as f32
            } else if i >= frames - fade_frames {
                (frames - i) as f32 / fade_frames as f32
            } else {
                1.0
            };
            (TAU * freq * i as f32 / rate).sin() * amplitude * envelope
        })
        .collect()
}
