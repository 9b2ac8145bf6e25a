//! The sound-producing collaborator the game drives.
//!
//! The core never synthesizes audio itself; frontends implement
//! [`AudioCollaborator`] on top of whatever output they have.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    #[error("unknown note '{0}'")]
    UnknownNote(String),
    #[error("audio output unavailable: {0}")]
    Unavailable(String),
}

/// Options for a fire-and-forget preview sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceOptions {
    pub tempo_bpm: f32,
    /// Sounding length of each note in seconds
    pub note_duration_secs: f32,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        Self {
            tempo_bpm: 80.0,
            note_duration_secs: 0.5,
        }
    }
}

impl SequenceOptions {
    /// Distance between note onsets.
    pub fn step_secs(&self) -> f32 {
        if self.tempo_bpm > 0.0 {
            60.0 / self.tempo_bpm
        } else {
            self.note_duration_secs
        }
    }
}

/// Stop handle returned by [`AudioCollaborator::play_note_sequence`].
#[derive(Debug, Clone, Default)]
pub struct SequenceStop {
    stopped: Arc<AtomicBool>,
}

impl SequenceStop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

pub trait AudioCollaborator: Send {
    /// Start sounding `note` (e.g. `"F#4"`) for `duration_secs`.
    fn play_note(
        &mut self,
        note: &str,
        duration_secs: f32,
        velocity: Option<f32>,
    ) -> Result<(), AudioError>;

    /// Play a whole list of notes on the collaborator's own clock.
    fn play_note_sequence(
        &mut self,
        notes: &[String],
        options: SequenceOptions,
    ) -> Result<SequenceStop, AudioError>;

    /// Silence everything that is currently sounding.
    fn stop_all(&mut self);

    /// Short success or try-again cue after an answer.
    fn play_feedback(&mut self, _success: bool) {}
}

/// One call observed by [`RecordingAudio`].
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCall {
    Note {
        note: String,
        duration_secs: f32,
        velocity: Option<f32>,
    },
    Sequence {
        notes: Vec<String>,
        options: SequenceOptions,
    },
    StopAll,
    Feedback {
        success: bool,
    },
}

/// Collaborator that records every call, for tests and headless runs.
///
/// Clones share the same log, so a test can keep one clone and hand the
/// other to the game.
#[derive(Debug, Clone, Default)]
pub struct RecordingAudio {
    calls: Arc<Mutex<Vec<AudioCall>>>,
    failing: Arc<Mutex<Vec<String>>>,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `play_note` fail for this note name.
    pub fn fail_on(&self, note: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.push(note.to_string());
        }
    }

    pub fn calls(&self) -> Vec<AudioCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Names passed to `play_note`, in order.
    pub fn played_notes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                AudioCall::Note { note, .. } => Some(note),
                _ => None,
            })
            .collect()
    }

    pub fn stop_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, AudioCall::StopAll))
            .count()
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn record(&self, call: AudioCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl AudioCollaborator for RecordingAudio {
    fn play_note(
        &mut self,
        note: &str,
        duration_secs: f32,
        velocity: Option<f32>,
    ) -> Result<(), AudioError> {
        self.record(AudioCall::Note {
            note: note.to_string(),
            duration_secs,
            velocity,
        });
        let fails = self
            .failing
            .lock()
            .map(|f| f.iter().any(|n| n == note))
            .unwrap_or(false);
        if fails {
            return Err(AudioError::UnknownNote(note.to_string()));
        }
        Ok(())
    }

    fn play_note_sequence(
        &mut self,
        notes: &[String],
        options: SequenceOptions,
    ) -> Result<SequenceStop, AudioError> {
        self.record(AudioCall::Sequence {
            notes: notes.to_vec(),
            options,
        });
        Ok(SequenceStop::new())
    }

    fn stop_all(&mut self) {
        self.record(AudioCall::StopAll);
    }

    fn play_feedback(&mut self, success: bool) {
        self.record(AudioCall::Feedback { success });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_shares_log_between_clones() {
        let probe = RecordingAudio::new();
        let mut audio = probe.clone();
        audio.play_note("C4", 0.5, None).unwrap();
        audio.stop_all();
        assert_eq!(probe.played_notes(), vec!["C4".to_string()]);
        assert_eq!(probe.stop_count(), 1);
    }

    #[test]
    fn test_injected_failure() {
        let mut audio = RecordingAudio::new();
        audio.fail_on("D4");
        assert!(audio.play_note("C4", 0.5, None).is_ok());
        assert_eq!(
            audio.play_note("D4", 0.5, None),
            Err(AudioError::UnknownNote("D4".into()))
        );
        assert_eq!(audio.played_notes().len(), 2);
    }

    #[test]
    fn test_sequence_stop_is_idempotent() {
        let stop = SequenceStop::new();
        let other = stop.clone();
        stop.stop();
        stop.stop();
        assert!(other.is_stopped());
        assert_eq!(SequenceOptions::default().step_secs(), 0.75);
    }
}
