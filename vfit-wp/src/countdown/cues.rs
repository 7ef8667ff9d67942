//! Countdown cue schedule
//!
//! A table of thresholds (seconds remaining) and what happens when the
//! displayed countdown crosses each of them. Rules are kept sorted by
//! descending threshold so simultaneous crossings fire in countdown order.

use crate::config::CueConfig;
use vfit_common::events::{CueFiredKind, WarningLevel};

/// What a threshold crossing triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CueEffect {
    /// "N seconds remaining" announcement (N = threshold)
    TimeRemaining,
    /// Show and announce the next step
    Preview,
    /// Escalate the countdown styling
    Warning(WarningLevel),
    /// "five, four, three, two, one"
    FinalCountdown,
}

/// When a rule applies to a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Applicability {
    Always,
    /// Only for steps whose total duration is longer than the threshold
    DurationExceeds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CueRule {
    pub threshold: u32,
    pub applies: Applicability,
    pub effect: CueEffect,
}

impl CueRule {
    pub const fn new(threshold: u32, applies: Applicability, effect: CueEffect) -> Self {
        Self {
            threshold,
            applies,
            effect,
        }
    }

    pub fn applies_to(&self, total_secs: u32) -> bool {
        match self.applies {
            Applicability::Always => true,
            Applicability::DurationExceeds => total_secs > self.threshold,
        }
    }

    /// Observer-facing description of this rule firing
    pub fn fired_kind(&self) -> CueFiredKind {
        match self.effect {
            CueEffect::TimeRemaining => CueFiredKind::TimeRemaining {
                seconds: self.threshold,
            },
            CueEffect::Preview => CueFiredKind::Preview,
            CueEffect::Warning(level) => CueFiredKind::Warning { level },
            CueEffect::FinalCountdown => CueFiredKind::FinalCountdown,
        }
    }
}

/// Ordered set of cue rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueSchedule {
    rules: Vec<CueRule>,
}

impl CueSchedule {
    pub fn new(mut rules: Vec<CueRule>) -> Self {
        rules.sort_by(|a, b| b.threshold.cmp(&a.threshold));
        Self { rules }
    }

    /// 60/30 announcements, 10 preview, 6 warning, 5 final countdown,
    /// 3 critical
    pub fn standard() -> Self {
        Self::from_config(&CueConfig::default())
    }

    pub fn from_config(config: &CueConfig) -> Self {
        use Applicability::*;

        Self::new(vec![
            CueRule::new(config.long_remaining, DurationExceeds, CueEffect::TimeRemaining),
            CueRule::new(config.medium_remaining, DurationExceeds, CueEffect::TimeRemaining),
            CueRule::new(config.preview, Always, CueEffect::Preview),
            CueRule::new(config.warning, Always, CueEffect::Warning(WarningLevel::Warning)),
            CueRule::new(config.final_countdown, Always, CueEffect::FinalCountdown),
            CueRule::new(config.critical, Always, CueEffect::Warning(WarningLevel::Critical)),
        ])
    }

    /// An empty schedule: the countdown only reports completion
    pub fn silent() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn rules(&self) -> &[CueRule] {
        &self.rules
    }
}

impl Default for CueSchedule {
    fn default() -> Self {
        Self::standard()
    }
}
