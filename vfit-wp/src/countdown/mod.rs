//! Step countdown and threshold cues

pub mod cues;
pub mod engine;

pub use cues::{Applicability, CueEffect, CueRule, CueSchedule};
pub use engine::{Countdown, Tick};
