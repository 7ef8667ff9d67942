//! Catalog → sequence → start points

mod helpers;

use helpers::*;
use vfit_common::events::StepKind;
use vfit_common::WorkoutCatalog;
use vfit_wp::sequence::{build_sequence, start_points, validate_sequence};

const CATALOG: &str = r#"{
    "Lunedi": [
        {"name": "Blocco A", "block": "A", "duration": ""},
        {"name": "Swing", "block": "A", "rounds": "2", "reps": 12, "duration": "40", "tipoDiPeso": "Kettlebell"},
        {"name": "Plank", "block": "B", "rounds": 2, "duration": 45},
        {"name": "Note", "block": "", "duration": 30}
    ]
}"#;

#[test]
fn test_two_blocks_numbering_from_catalog() {
    let catalog = WorkoutCatalog::from_json_str(CATALOG).unwrap();
    let workout = catalog.require("lunedi").unwrap();
    let steps = build_sequence(workout, true);

    let names: Vec<&str> = steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Warm-up",
            "Swing",
            "Plank",
            "Are you ready?",
            "Swing",
            "Swing",
            "REST",
            "Plank",
            "Plank",
            "Good Job",
        ]
    );

    let work: Vec<_> = steps
        .iter()
        .filter(|s| s.kind == StepKind::WorkExercise)
        .map(|s| {
            let p = s.position.unwrap();
            (p.block_number, p.total_blocks, p.round_number, p.total_rounds)
        })
        .collect();
    assert_eq!(work, vec![(1, 2, 1, 2), (1, 2, 2, 2), (2, 2, 1, 2), (2, 2, 2, 2)]);

    assert_eq!(steps[4].equipment.as_deref(), Some("Kettlebell"));
    assert_eq!(steps[4].reps.as_deref(), Some("12"));
    assert_eq!(steps[4].duration_secs, 40);
    assert_eq!(steps[1].duration_secs, 25);
    assert!(validate_sequence(&workout.name, &steps).is_ok());
}

#[test]
fn test_start_points_index_into_sequence() {
    let steps = build_sequence(&two_blocks(), false);
    let blocks = start_points(&steps);

    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].first_index, 0);
    assert_eq!(blocks[0].rounds[1].first_index, 1);
    // REST sits between the blocks
    assert_eq!(blocks[1].first_index, 3);
    assert_eq!(steps[blocks[1].first_index].name, "Plank");
}

#[test]
fn test_sequence_is_deterministic() {
    let workout = two_blocks();
    assert_eq!(build_sequence(&workout, true), build_sequence(&workout, true));
}

#[test]
fn test_workout_without_blocks_is_rejected() {
    let workout = workout("Loose", vec![vfit_common::ExerciseRow::new("Squat", None, Some(30))]);
    let steps = build_sequence(&workout, true);
    assert!(steps.is_empty());
    assert!(matches!(
        validate_sequence(&workout.name, &steps),
        Err(vfit_wp::Error::EmptyWorkout(_))
    ));
}
