//! Workout sequence construction
//!
//! Turns a spreadsheet-shaped [`WorkoutDefinition`](vfit_common::WorkoutDefinition)
//! into the flat list of timed steps the player walks through.

pub mod builder;
pub mod start_points;

pub use builder::{build_sequence, build_sequence_with_labels, validate_sequence, LabelSet};
pub use start_points::{start_points, BlockStartPoint, ExerciseStartPoint, RoundStartPoint};

use serde::Serialize;
use vfit_common::events::{BlockPosition, StepKind};
use vfit_common::workout::is_instruction_name;

/// One timed unit of a workout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub kind: StepKind,
    pub name: String,
    /// Base duration; standing extra time is added at activation
    pub duration_secs: u32,
    pub image_ref: Option<String>,
    pub reps: Option<String>,
    pub equipment: Option<String>,
    pub block_label: Option<String>,
    /// Present for work exercises only
    pub position: Option<BlockPosition>,
    pub main_clip: Option<String>,
    pub transition_clip: Option<String>,
}

impl Step {
    pub fn label(name: impl Into<String>, duration_secs: u32) -> Self {
        Self {
            kind: StepKind::Label,
            name: name.into(),
            duration_secs,
            image_ref: None,
            reps: None,
            equipment: None,
            block_label: None,
            position: None,
            main_clip: None,
            transition_clip: None,
        }
    }

    pub fn is_label(&self) -> bool {
        self.kind.is_label()
    }

    /// Counted in completion summaries
    pub fn counts_as_exercise(&self) -> bool {
        !self.is_label() && !is_instruction_name(&self.name)
    }

    /// Caption shown under the exercise name, e.g. `KETTLEBELL | 12 REPS | 45S`
    pub fn info_line(&self) -> String {
        let mut parts = Vec::new();
        if let Some(equipment) = &self.equipment {
            parts.push(equipment.clone());
        }
        if let Some(reps) = &self.reps {
            parts.push(format!("{} reps", reps));
        }
        if !self.is_label() {
            parts.push(format!("{}s", self.duration_secs));
        }
        parts.join(" | ").to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_line() {
        let mut step = Step::label("Squat", 45);
        step.kind = StepKind::WorkExercise;
        step.equipment = Some("Kettlebell".into());
        step.reps = Some("12".into());
        assert_eq!(step.info_line(), "KETTLEBELL | 12 REPS | 45S");

        assert_eq!(Step::label("REST", 60).info_line(), "");
    }

    #[test]
    fn test_counts_as_exercise() {
        let mut step = Step::label("Istruzioni", 20);
        assert!(!step.counts_as_exercise());
        step.kind = StepKind::WorkExercise;
        assert!(!step.counts_as_exercise());
        step.name = "Burpee".into();
        assert!(step.counts_as_exercise());
    }
}
