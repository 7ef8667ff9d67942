//! Side effects requested by the controller
//!
//! The controller never performs I/O. Each transition returns the effects
//! the engine should carry out, in order.

use crate::audio::AudioCue;
use vfit_common::events::{CompletionSummary, PlayerEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Broadcast an event to observers
    Emit(PlayerEvent),
    /// Render an audio cue; `activation` identifies the step it belongs to
    Cue { activation: u64, cue: AudioCue },
    /// Store added seconds as standing extra time
    PersistExtraTime(u32),
    /// Hand the finished workout to the completion reporter
    RecordCompletion(CompletionSummary),
    /// Fetch clips the workout references ahead of time
    Preload(Vec<String>),
}

impl Effect {
    pub fn event(&self) -> Option<&PlayerEvent> {
        match self {
            Effect::Emit(event) => Some(event),
            _ => None,
        }
    }

    pub fn cue(&self) -> Option<&AudioCue> {
        match self {
            Effect::Cue { cue, .. } => Some(cue),
            _ => None,
        }
    }
}
