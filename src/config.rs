//! `tonetrail.toml` loading
//!
//! ```toml
//! data_dir = "~/.local/share/tonetrail"
//! melodies = "melodies.toml"
//!
//! [game]
//! language = "de"
//! feedback_delay_ms = 1500
//!
//! [audio]
//! backend = "midi"
//! midi_port = "IAC"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tonetrail_core::GameConfig;

/// Which collaborator produces sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioBackend {
    #[default]
    Synth,
    Midi,
    Silent,
}

impl FromStr for AudioBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "synth" | "cpal" => Ok(AudioBackend::Synth),
            "midi" => Ok(AudioBackend::Midi),
            "silent" | "none" | "off" => Ok(AudioBackend::Silent),
            other => Err(format!("Unknown audio backend: {}", other)),
        }
    }
}

impl fmt::Display for AudioBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioBackend::Synth => write!(f, "synth"),
            AudioBackend::Midi => write!(f, "midi"),
            AudioBackend::Silent => write!(f, "silent"),
        }
    }
}

/// Voice shape of the built-in synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
}

impl FromStr for Waveform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sine" | "sin" => Ok(Waveform::Sine),
            "triangle" | "tri" => Ok(Waveform::Triangle),
            other => Err(format!("Unknown waveform: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub backend: AudioBackend,
    /// Master volume, 0.0 to 1.0
    pub volume: f32,
    pub waveform: Waveform,
    /// Substring of the MIDI output port name; first port when unset
    pub midi_port: Option<String>,
    /// MIDI channel, 1 to 16
    pub midi_channel: u8,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            backend: AudioBackend::Synth,
            volume: 0.5,
            waveform: Waveform::Sine,
            midi_port: None,
            midi_channel: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub game: GameConfig,
    pub audio: AudioSettings,
    /// Where progress records are kept
    pub data_dir: Option<PathBuf>,
    /// TOML melody catalog replacing the built-in melodies
    pub melodies: Option<PathBuf>,
}

impl AppConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("In {}", path.display()))
    }

    /// Relative paths in the file are taken relative to the file itself.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for path in [&mut self.data_dir, &mut self.melodies].into_iter().flatten() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".tonetrail"))
    }
}
