//! # Tonetrail Core
//!
//! Platform-independent engine of the Tonetrail pitch-training game: note
//! notation, melody generation, progressive difficulty, cancellable melody
//! playback and the activity state machine. Audio output and storage are
//! supplied by the embedding frontend.
//!
//! ## Features
//!
//! - **wasm**: Enable WASM bindings via wasm-bindgen
//!
//! ## Example
//!
//! ```ignore
//! use tonetrail_core::{ActivityMachine, ActivityMode, GameConfig};
//! use tonetrail_core::audio::RecordingAudio;
//! use tonetrail_core::persistence::MemoryStore;
//!
//! let mut machine = ActivityMachine::new(
//!     GameConfig::default(),
//!     Box::new(RecordingAudio::new()),
//!     Box::new(MemoryStore::new()),
//! );
//! machine.set_mode(ActivityMode::HighOrLow);
//! machine.play()?;
//! machine.advance_to(900);
//! ```

pub mod activity;
pub mod audio;
pub mod config;
pub mod difficulty;
pub mod events;
pub mod generator;
pub mod melodies;
pub mod messages;
pub mod persistence;
pub mod scheduler;
pub mod types;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use activity::{ActivityError, ActivityMachine, ActivitySnapshot, Answer, Pitch, RoundPhase};
pub use config::GameConfig;
pub use events::GameEvent;
pub use messages::Language;
pub use types::{ActivityMode, DurationClass, NoteToken, Palette, Pattern, PatternKind, PitchClass};
