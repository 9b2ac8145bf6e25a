//! Native audio collaborators: a cpal synthesizer, a midir MIDI output and
//! a silent backend that only logs.

pub mod midi;
pub mod silent;
pub mod synth;

use crate::config::{AudioBackend, AudioSettings};
use anyhow::Result;
use tonetrail_core::audio::{AudioCollaborator, AudioError};
use tonetrail_core::NoteToken;
use tracing::warn;

pub use midi::MidiAudio;
pub use silent::SilentAudio;
pub use synth::SynthAudio;

/// Notes of the answer cue, with their length in seconds.
pub fn feedback_cue(success: bool) -> &'static [(&'static str, f32)] {
    if success {
        &[("C5", 0.12), ("E5", 0.12), ("G5", 0.25)]
    } else {
        &[("D#3", 0.18), ("C3", 0.3)]
    }
}

pub(crate) fn parse_note(name: &str) -> Result<NoteToken, AudioError> {
    name.parse::<NoteToken>()
        .map_err(|_| AudioError::UnknownNote(name.to_string()))
}

/// Open the configured backend. A synthesizer or MIDI port that cannot be
/// opened falls back to [`SilentAudio`] so the game stays playable.
pub fn open(settings: &AudioSettings) -> Box<dyn AudioCollaborator> {
    let opened: Result<Box<dyn AudioCollaborator>> = match settings.backend {
        AudioBackend::Synth => SynthAudio::open(settings.volume, settings.waveform)
            .map(|a| Box::new(a) as Box<dyn AudioCollaborator>),
        AudioBackend::Midi => MidiAudio::open(settings.midi_port.as_deref(), settings.midi_channel)
            .map(|a| Box::new(a) as Box<dyn AudioCollaborator>),
        AudioBackend::Silent => Ok(Box::new(SilentAudio)),
    };
    opened.unwrap_or_else(|e| {
        warn!(backend = %settings.backend, error = %e, "audio backend unavailable, running silent");
        Box::new(SilentAudio)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cues_are_valid_notes() {
        for success in [true, false] {
            for (note, secs) in feedback_cue(success) {
                assert!(parse_note(note).is_ok(), "{}", note);
                assert!(*secs > 0.0);
            }
        }
    }

    #[test]
    fn test_bad_note_name() {
        assert_eq!(
            parse_note("X9"),
            Err(AudioError::UnknownNote("X9".to_string()))
        );
    }

    #[test]
    fn test_silent_backend_always_opens() {
        let settings = AudioSettings {
            backend: AudioBackend::Silent,
            ..AudioSettings::default()
        };
        let mut audio = open(&settings);
        assert!(audio.play_note("A4", 0.1, None).is_ok());
    }
}
