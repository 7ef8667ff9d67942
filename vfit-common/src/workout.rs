//! Workout definition model
//!
//! A workout is an ordered list of exercise rows as exported from the
//! coaching spreadsheet. Exports are loose about types: numbers arrive as
//! JSON numbers or numeric strings, blank cells arrive as empty strings,
//! and column names use the spreadsheet's own keys. Deserialization here
//! accepts all of that so the rest of the system sees clean `Option`s.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// One spreadsheet row describing an exercise (or a block marker).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExerciseRow {
    #[serde(default, deserialize_with = "de_text")]
    pub name: String,

    /// Block label; rows sharing a label form one block
    #[serde(default, deserialize_with = "de_opt_text")]
    pub block: Option<String>,

    #[serde(default, deserialize_with = "de_opt_u32")]
    pub rounds: Option<u32>,

    /// Repetition hint, numeric ("12") or free text ("8-12")
    #[serde(default, deserialize_with = "de_opt_text")]
    pub reps: Option<String>,

    /// Work duration in seconds
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub duration: Option<u32>,

    #[serde(default, alias = "tipoDiPeso", deserialize_with = "de_opt_text")]
    pub equipment: Option<String>,

    #[serde(default, alias = "imageUrl", deserialize_with = "de_opt_text")]
    pub image_ref: Option<String>,

    /// Pre-recorded clip announcing the exercise
    #[serde(default, alias = "audio", deserialize_with = "de_opt_text")]
    pub main_clip: Option<String>,

    /// Pre-recorded clip played when transitioning into the exercise
    #[serde(default, alias = "audioCambio", deserialize_with = "de_opt_text")]
    pub transition_clip: Option<String>,
}

impl ExerciseRow {
    /// Convenience constructor used by fixtures and tools
    pub fn new(name: impl Into<String>, block: Option<&str>, duration: Option<u32>) -> Self {
        Self {
            name: name.into(),
            block: block.map(str::to_string),
            duration,
            ..Default::default()
        }
    }

    /// Instruction rows ("istruzioni") explain the workout and are not
    /// counted as exercises in summaries.
    pub fn is_instruction(&self) -> bool {
        is_instruction_name(&self.name)
    }
}

/// True for exercise names that denote instructions rather than work
pub fn is_instruction_name(name: &str) -> bool {
    name.to_lowercase().contains("istruz")
}

/// A named workout: the ordered rows of one spreadsheet tab.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutDefinition {
    #[serde(default, deserialize_with = "de_text")]
    pub name: String,
    #[serde(default)]
    pub exercises: Vec<ExerciseRow>,
}

impl WorkoutDefinition {
    pub fn new(name: impl Into<String>, exercises: Vec<ExerciseRow>) -> Self {
        Self {
            name: name.into(),
            exercises,
        }
    }

    /// Every clip reference in the workout, deduplicated, in row order.
    ///
    /// Used to warm the clip cache before playback starts.
    pub fn clip_refs(&self) -> Vec<String> {
        let mut refs: Vec<String> = Vec::new();
        for row in &self.exercises {
            for clip in [&row.main_clip, &row.transition_clip].into_iter().flatten() {
                if !refs.iter().any(|r| r == clip) {
                    refs.push(clip.clone());
                }
            }
        }
        refs
    }
}

/// Accepted shapes of a workout catalog file
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Listed { workouts: Vec<WorkoutDefinition> },
    Many(Vec<WorkoutDefinition>),
    Named(BTreeMap<String, Vec<ExerciseRow>>),
    Single(WorkoutDefinition),
}

/// Collection of workouts available to the player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkoutCatalog {
    workouts: Vec<WorkoutDefinition>,
}

impl WorkoutCatalog {
    pub fn new(workouts: Vec<WorkoutDefinition>) -> Self {
        Self { workouts }
    }

    /// Parse a catalog from JSON.
    ///
    /// Accepts `{"workouts": [...]}`, a bare workout object, an array of
    /// workouts, or an object mapping workout names to row arrays.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let parsed: CatalogFile = serde_json::from_str(json)?;
        let workouts = match parsed {
            CatalogFile::Listed { workouts } | CatalogFile::Many(workouts) => workouts,
            CatalogFile::Single(workout) => vec![workout],
            CatalogFile::Named(map) => map
                .into_iter()
                .map(|(name, exercises)| WorkoutDefinition { name, exercises })
                .collect(),
        };

        if workouts.iter().any(|w| w.name.trim().is_empty()) {
            return Err(Error::InvalidInput(
                "Every workout in a catalog needs a name".to_string(),
            ));
        }

        Ok(Self { workouts })
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Look a workout up by name (case-insensitive, surrounding blanks ignored)
    pub fn get(&self, name: &str) -> Option<&WorkoutDefinition> {
        let wanted = name.trim().to_lowercase();
        self.workouts
            .iter()
            .find(|w| w.name.trim().to_lowercase() == wanted)
    }

    pub fn require(&self, name: &str) -> Result<&WorkoutDefinition> {
        self.get(name)
            .ok_or_else(|| Error::NotFound(format!("Workout '{}'", name)))
    }

    pub fn names(&self) -> Vec<&str> {
        self.workouts.iter().map(|w| w.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.workouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workouts.is_empty()
    }
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_to_u32(value: Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u32)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<u32>().ok().or_else(|| {
                trimmed
                    .replace(',', ".")
                    .parse::<f64>()
                    .ok()
                    .filter(|f| *f >= 0.0)
                    .map(|f| f.round() as u32)
            })
        }
        _ => None,
    }
}

fn de_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<Value>::deserialize(d)?
        .and_then(value_to_text)
        .unwrap_or_default())
}

fn de_opt_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.and_then(value_to_text))
}

fn de_opt_u32<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<u32>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.and_then(value_to_u32))
}
