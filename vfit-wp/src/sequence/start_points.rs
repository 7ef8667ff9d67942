//! Start point selection
//!
//! Lets a user begin a workout at a specific block, round or exercise
//! instead of the first step. Indices point into the built sequence and
//! are fed to `PlaybackController::jump_to_start_point`.

use super::Step;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExerciseStartPoint {
    pub name: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundStartPoint {
    pub round_number: u32,
    pub first_index: usize,
    pub exercises: Vec<ExerciseStartPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockStartPoint {
    pub block_number: u32,
    pub block_label: String,
    pub first_index: usize,
    pub rounds: Vec<RoundStartPoint>,
}

/// Collect the selectable start points of a sequence
pub fn start_points(steps: &[Step]) -> Vec<BlockStartPoint> {
    let mut blocks: Vec<BlockStartPoint> = Vec::new();

    for (index, step) in steps.iter().enumerate() {
        let Some(pos) = step.position else {
            continue;
        };

        let new_block = blocks.last().map_or(true, |b| b.block_number != pos.block_number);
        if new_block {
            blocks.push(BlockStartPoint {
                block_number: pos.block_number,
                block_label: step.block_label.clone().unwrap_or_default(),
                first_index: index,
                rounds: Vec::new(),
            });
        }
        let Some(block) = blocks.last_mut() else {
            continue;
        };

        let new_round = block
            .rounds
            .last()
            .map_or(true, |r| r.round_number != pos.round_number);
        if new_round {
            block.rounds.push(RoundStartPoint {
                round_number: pos.round_number,
                first_index: index,
                exercises: Vec::new(),
            });
        }
        if let Some(round) = block.rounds.last_mut() {
            round.exercises.push(ExerciseStartPoint {
                name: step.name.clone(),
                index,
            });
        }
    }

    blocks
}
