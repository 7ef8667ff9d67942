//! Sequence builder
//!
//! Layout of a built sequence:
//!
//! ```text
//! Warm-up, one warm-up step per distinct exercise, Are you ready?   (optional)
//! block 1: round 1 exercises, round 2 exercises, ...
//! REST
//! block 2: ...
//! Good Job
//! ```
//!
//! Rows without a block label and block-marker rows never become steps.
//! The builder is pure: the same workout always yields the same sequence.

use super::Step;
use crate::error::{Error, Result};
use std::collections::HashSet;
use vfit_common::events::{BlockPosition, StepKind};
use vfit_common::{ExerciseRow, WorkoutDefinition};

pub const WARMUP_LABEL_SECS: u32 = 5;
pub const READY_LABEL_SECS: u32 = 15;
pub const REST_LABEL_SECS: u32 = 60;
pub const FINISH_LABEL_SECS: u32 = 20;
pub const WARMUP_STEP_SECS: u32 = 25;
pub const DEFAULT_WORK_SECS: u32 = 30;

/// Rows this short are spreadsheet separators, not exercises
const MARKER_MAX_SECS: u32 = 5;

/// Names of the interstitial label steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    pub warmup: String,
    pub ready: String,
    pub rest: String,
    pub finish: String,
}

impl Default for LabelSet {
    fn default() -> Self {
        Self {
            warmup: "Warm-up".to_string(),
            ready: "Are you ready?".to_string(),
            rest: "REST".to_string(),
            finish: "Good Job".to_string(),
        }
    }
}

/// Build the step sequence for `workout` with the default label names.
///
/// Returns an empty sequence when the workout has no eligible exercise.
pub fn build_sequence(workout: &WorkoutDefinition, include_warmup: bool) -> Vec<Step> {
    build_sequence_with_labels(workout, include_warmup, &LabelSet::default())
}

pub fn build_sequence_with_labels(
    workout: &WorkoutDefinition,
    include_warmup: bool,
    labels: &LabelSet,
) -> Vec<Step> {
    let eligible: Vec<&ExerciseRow> = workout
        .exercises
        .iter()
        .filter(|row| row.block.is_some() && !is_block_marker(row))
        .collect();

    if eligible.is_empty() {
        return Vec::new();
    }

    let mut steps = Vec::new();

    if include_warmup {
        steps.push(Step::label(&labels.warmup, WARMUP_LABEL_SECS));

        let mut seen = HashSet::new();
        for row in &eligible {
            if seen.insert(row.name.as_str()) {
                steps.push(exercise_step(row, StepKind::WarmUpExercise, WARMUP_STEP_SECS, None));
            }
        }

        steps.push(Step::label(&labels.ready, READY_LABEL_SECS));
    }

    let blocks = group_by_block(&eligible);
    let total_blocks = blocks.len() as u32;

    for (block_idx, (_, rows)) in blocks.iter().enumerate() {
        // Rounds come from the block's first row
        let total_rounds = rows[0].rounds.unwrap_or(1).max(1);
        let total_exercises = rows.len() as u32;

        for round in 1..=total_rounds {
            for (exercise_idx, row) in rows.iter().enumerate() {
                let position = BlockPosition {
                    block_number: block_idx as u32 + 1,
                    total_blocks,
                    round_number: round,
                    total_rounds,
                    exercise_index: exercise_idx as u32 + 1,
                    total_exercises,
                };
                let duration = row.duration.unwrap_or(DEFAULT_WORK_SECS);
                steps.push(exercise_step(row, StepKind::WorkExercise, duration, Some(position)));
            }
        }

        if block_idx + 1 < blocks.len() {
            steps.push(Step::label(&labels.rest, REST_LABEL_SECS));
        }
    }

    steps.push(Step::label(&labels.finish, FINISH_LABEL_SECS));
    steps
}

/// Reject sequences the countdown cannot play.
pub fn validate_sequence(workout_name: &str, steps: &[Step]) -> Result<()> {
    if steps.is_empty() {
        return Err(Error::EmptyWorkout(workout_name.to_string()));
    }

    if let Some((index, step)) = steps.iter().enumerate().find(|(_, s)| s.duration_secs == 0) {
        return Err(Error::InvalidWorkout(format!(
            "step {} ('{}') has zero duration",
            index, step.name
        )));
    }

    Ok(())
}

/// Spreadsheet separator rows: named after the block, carrying the word
/// "block"/"blocco", or only a few seconds long.
pub fn is_block_marker(row: &ExerciseRow) -> bool {
    let name = row.name.trim().to_lowercase();

    if name.contains("block") || name.contains("blocco") {
        return true;
    }

    if let Some(block) = &row.block {
        if name == block.trim().to_lowercase() {
            return true;
        }
    }

    matches!(row.duration, Some(d) if d <= MARKER_MAX_SECS)
}

/// Group rows by block label, blocks in first-seen order
fn group_by_block<'a>(rows: &[&'a ExerciseRow]) -> Vec<(&'a str, Vec<&'a ExerciseRow>)> {
    let mut groups: Vec<(&'a str, Vec<&'a ExerciseRow>)> = Vec::new();

    for row in rows {
        let Some(label) = row.block.as_deref() else {
            continue;
        };
        match groups.iter_mut().find(|(existing, _)| *existing == label) {
            Some((_, members)) => members.push(row),
            None => groups.push((label, vec![row])),
        }
    }

    groups
}

fn exercise_step(
    row: &ExerciseRow,
    kind: StepKind,
    duration_secs: u32,
    position: Option<BlockPosition>,
) -> Step {
    Step {
        kind,
        name: row.name.clone(),
        duration_secs,
        image_ref: row.image_ref.clone(),
        reps: row.reps.clone(),
        equipment: row.equipment.clone(),
        block_label: row.block.clone(),
        position,
        main_clip: row.main_clip.clone(),
        transition_clip: row.transition_clip.clone(),
    }
}
