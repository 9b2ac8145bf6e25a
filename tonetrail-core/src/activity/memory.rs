//! Memory game: repeat a short sequence on a five-key keyboard.

use super::RoundPhase;
use crate::types::NoteToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Correct so far, more keys expected
    Continue { position: usize },
    /// The whole sequence was repeated
    Complete,
    /// Wrong key; the attempt is over
    Mismatch { position: usize },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryState {
    pub phase: RoundPhase,
    pub game_mode: bool,
    pub sequence: Vec<NoteToken>,
    pub input: Vec<NoteToken>,
}

impl MemoryState {
    /// Check one key against the next expected note. The first mismatch
    /// ends the attempt immediately, without waiting for the remaining keys.
    pub fn press(&mut self, key: NoteToken) -> KeyOutcome {
        let position = self.input.len();
        let expected = self.sequence.get(position);
        self.input.push(key);

        match expected {
            Some(note) if note.same_pitch(&key) => {
                if self.input.len() == self.sequence.len() {
                    KeyOutcome::Complete
                } else {
                    KeyOutcome::Continue { position }
                }
            }
            _ => KeyOutcome::Mismatch { position },
        }
    }
}
