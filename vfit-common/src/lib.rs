//! # Viltrum Fitness common library
//!
//! Shared code for the workout player and any other vfit component:
//! - Workout definition model (spreadsheet rows, catalogs)
//! - User audio preferences
//! - Event types (PlayerEvent enum) and the EventBus
//! - Configuration file and data folder resolution
//! - Time and countdown formatting helpers

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod prefs;
pub mod time;
pub mod workout;

pub use error::{Error, Result};
pub use prefs::{SoundMode, UserAudioPreferences};
pub use workout::{ExerciseRow, WorkoutCatalog, WorkoutDefinition};
