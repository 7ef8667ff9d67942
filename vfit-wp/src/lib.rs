//! # Viltrum Fitness Workout Player (vfit-wp)
//!
//! Plays interval workouts: builds the timed step sequence from a workout
//! definition, counts each step down against a wall-clock deadline, and
//! announces what is coming through speech, clips or tones.
//!
//! **Architecture:**
//! - [`sequence`]: workout rows → flat list of timed steps
//! - [`countdown`]: deadline-based countdown with threshold cues
//! - [`playback`]: controller state machine and the engine actor driving it
//! - [`audio`]: speech backends with fallback, clips, tones, one output channel
//! - [`db`]: preferences and workout history in SQLite
//! - [`api`]: HTTP/SSE control surface

pub mod api;
pub mod audio;
pub mod config;
pub mod countdown;
pub mod db;
pub mod error;
pub mod playback;
pub mod sequence;
pub mod state;

pub use config::PlayerConfig;
pub use error::{Error, Result};
pub use playback::{EngineDeps, PlaybackController, PlaybackEngine};
pub use state::SharedState;
