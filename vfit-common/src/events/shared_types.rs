//! Shared progress and summary DTOs
//!
//! Carried inside events and returned by the player's query endpoints.

use super::playback_types::{PlaybackStatus, StepKind, WarningLevel};
use serde::{Deserialize, Serialize};

/// Position of a work step inside its block
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockPosition {
    /// 1-based block number
    pub block_number: u32,
    pub total_blocks: u32,
    /// 1-based round number
    pub round_number: u32,
    pub total_rounds: u32,
    /// 1-based exercise index within the block
    pub exercise_index: u32,
    pub total_exercises: u32,
}

/// Everything a UI needs to render the current step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressSnapshot {
    pub status: PlaybackStatus,
    pub current_index: usize,
    pub total_steps: usize,
    pub remaining_seconds: u32,
    /// Duration the current step was activated with (extra time included)
    pub duration_seconds: u32,
    pub step_kind: StepKind,
    /// Present for work exercises only
    pub position: Option<BlockPosition>,
    /// Name shown on screen; switches to the next step during the preview
    pub display_name: String,
    pub image_ref: Option<String>,
    pub reps: Option<String>,
    pub equipment: Option<String>,
    pub warning: WarningLevel,
    pub preview_active: bool,
    /// Rounded `(current_index + 1) / total_steps` in percent
    pub percent_complete: u8,
}

/// Summary of a preview shown ahead of the next step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepPreview {
    pub index: usize,
    pub name: String,
    pub image_ref: Option<String>,
    pub info: String,
}

/// Exercise that needs a piece of equipment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EquipmentEntry {
    pub name: String,
    pub equipment: String,
}

/// Summary produced when a workout finishes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionSummary {
    pub workout_name: String,
    pub elapsed_seconds: u64,
    pub exercise_count: usize,
    pub exercises_with_equipment: Vec<EquipmentEntry>,
}
