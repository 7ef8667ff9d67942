//! Playback controller and the engine that drives it

pub mod collaborators;
pub mod controller;
pub mod effects;
pub mod engine;
pub mod session;

pub use collaborators::{CompletionReporter, InMemoryPreferences, NoopReporter, PreferenceStore};
pub use controller::PlaybackController;
pub use effects::Effect;
pub use engine::{EngineDeps, PlaybackEngine};
pub use session::PlaybackSession;
