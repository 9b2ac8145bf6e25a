//! Virtual-time scheduling.
//!
//! Nothing here sleeps. Owners ask for [`SequenceScheduler::next_deadline`]
//! and call `poll` once that much time has passed, so the same code runs
//! under a real clock, a browser timer, or a test stepping time by hand.

pub mod sequence;
pub mod timeline;

pub use sequence::{Completion, PlaybackEvent, PlaybackHandle, SequenceScheduler};
pub use timeline::Timeline;

use crate::types::NoteToken;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("cannot play an empty sequence")]
    EmptySequence,
    #[error("another melody is still playing")]
    SessionActive,
}

/// Shared cancellation flag checked before every scheduled continuation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One note of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackStep {
    pub note: NoteToken,
    /// Time until the next step starts
    pub duration_ms: u64,
    /// How long the collaborator should let the note ring
    pub sound_ms: u64,
}

impl PlaybackStep {
    pub fn new(note: NoteToken, duration_ms: u64) -> Self {
        Self {
            note,
            duration_ms,
            sound_ms: duration_ms,
        }
    }

    pub fn with_sound_ms(mut self, sound_ms: u64) -> Self {
        self.sound_ms = sound_ms;
        self
    }

    pub fn sound_secs(&self) -> f32 {
        self.sound_ms as f32 / 1000.0
    }
}

/// Evenly spaced steps, as used by the simple pattern player.
pub fn evenly_spaced(notes: &[NoteToken], spacing_ms: u64) -> Vec<PlaybackStep> {
    notes
        .iter()
        .map(|&note| PlaybackStep::new(note, spacing_ms))
        .collect()
}

/// Steps timed by each token's own duration class.
pub fn from_durations(notes: &[NoteToken], quarter_ms: u64) -> Vec<PlaybackStep> {
    notes
        .iter()
        .map(|&note| PlaybackStep::new(note, note.duration_ms(quarter_ms)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::note::parse_sequence;

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let seen = token.clone();
        assert!(!seen.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(seen.is_cancelled());
    }

    #[test]
    fn test_step_builders() {
        let notes = parse_sequence("C4 G4:h E4:e").unwrap();
        let even: Vec<u64> = evenly_spaced(&notes, 750).iter().map(|s| s.duration_ms).collect();
        assert_eq!(even, vec![750, 750, 750]);

        let timed: Vec<u64> = from_durations(&notes, 500).iter().map(|s| s.duration_ms).collect();
        assert_eq!(timed, vec![500, 1000, 250]);
    }
}
