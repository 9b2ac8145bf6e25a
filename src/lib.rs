//! # Tonetrail
//!
//! Terminal frontend for the Tonetrail pitch-training game. The game logic
//! lives in `tonetrail-core`; this crate supplies what a desktop needs
//! around it.
//!
//! ## Modules
//!
//! - `audio`: Audio backends for the core's audio collaborator: a cpal
//!   synthesizer, a MIDI output via midir and a silent fallback.
//! - `commands`: REPL commands and their registry.
//! - `config`: The `tonetrail.toml` configuration file.
//! - `engine`: Runs the activity machine on its own thread against the wall clock.
//! - `melodies`: Loads melody catalogs from TOML files.
//! - `repl`: The interactive prompt, with melody-file hot reload.
//! - `store`: File-backed key/value storage for progress.

pub mod audio;
pub mod commands;
pub mod config;
pub mod engine;
pub mod melodies;
pub mod repl;
pub mod store;

pub use crate::config::AppConfig;
pub use crate::engine::{EngineCommand, EngineHandle, Reply};
