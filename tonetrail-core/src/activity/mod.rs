//! Activity state machine.
//!
//! Each activity keeps its transient round state in its own variant of
//! [`ActivityState`]; switching modes replaces the variant wholesale, which
//! is what clears sequences, input buffers and feedback between activities.

pub mod draw_melody;
pub mod high_or_low;
pub mod machine;
pub mod match_sounds;
pub mod memory;
pub mod sound_judgment;

pub use draw_melody::{DrawPoint, DrawState};
pub use high_or_low::{HighOrLowState, Pitch, ToneRound};
pub use machine::{ActivityMachine, ActivitySnapshot};
pub use match_sounds::MatchState;
pub use memory::{KeyOutcome, MemoryState};
pub use sound_judgment::{JudgmentRound, JudgmentState};

use crate::audio::AudioError;
use crate::generator::GenerateError;
use crate::scheduler::{CancelToken, PlaybackError};
use crate::types::{ActivityMode, PatternKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivityError {
    #[error("there is nothing to answer yet")]
    NoActiveSequence,
    #[error("wait until the melody has finished")]
    SessionActive,
    #[error("the last answer is still being shown")]
    RoundSettling,
    #[error("{action} is not available in {mode}")]
    WrongMode {
        action: &'static str,
        mode: ActivityMode,
    },
    #[error("{0} melodies are still locked")]
    PatternLocked(PatternKind),
    #[error("nothing was drawn")]
    EmptyDrawing,
    #[error("the melody catalog is empty")]
    NoMelodies,
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// A player's response to the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum Answer {
    Pitch(Pitch),
    Pattern(PatternKind),
    SoundsRight(bool),
}

/// Where a round is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundPhase {
    /// No round exists
    #[default]
    Empty,
    /// Generated but not yet heard
    Ready,
    Playing,
    /// Heard at least once, waiting for an answer
    Answering,
    /// Judged; the next step runs when the feedback delay elapses
    Feedback,
}

impl RoundPhase {
    /// Common answer gate. `exclusive` activities refuse answers while their
    /// melody is still sounding; the others let the answer preempt playback.
    pub fn check_answerable(self, exclusive: bool) -> Result<(), ActivityError> {
        match self {
            RoundPhase::Empty | RoundPhase::Ready => Err(ActivityError::NoActiveSequence),
            RoundPhase::Playing if exclusive => Err(ActivityError::SessionActive),
            RoundPhase::Feedback => Err(ActivityError::RoundSettling),
            RoundPhase::Playing | RoundPhase::Answering => Ok(()),
        }
    }
}

/// Deferred round transitions, run by the machine's timer queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoundTimer {
    /// Hide feedback and prepare a fresh high-or-low round
    NextTone,
    /// Start and play a new matching round
    NextPattern,
    /// Back to answering the same pattern
    RetryPattern,
    /// Clear the keyboard input and replay the same sequence
    MemoryRetry,
    /// Generate the next memory sequence
    MemoryNext,
    /// Play the freshly generated memory sequence
    MemoryPlay,
    /// New melody for sound judgment, played at once
    NextMelody,
    /// Replay the same melody for sound judgment
    ReplayMelody,
    /// New reference melody for the drawing challenge
    NextReference,
    /// Let the player draw the same reference again
    RetryReference,
}

/// The transient state of the selected activity.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityState {
    Idle,
    HighOrLow(HighOrLowState),
    MatchSounds(MatchState),
    DrawMelody(DrawState),
    SoundJudgment(JudgmentState),
    MemoryGame(MemoryState),
}

impl ActivityState {
    pub fn fresh(mode: ActivityMode) -> Self {
        match mode {
            ActivityMode::Idle => ActivityState::Idle,
            ActivityMode::HighOrLow => ActivityState::HighOrLow(HighOrLowState::default()),
            ActivityMode::MatchSounds => ActivityState::MatchSounds(MatchState::default()),
            ActivityMode::DrawMelody => ActivityState::DrawMelody(DrawState::default()),
            ActivityMode::SoundJudgment => ActivityState::SoundJudgment(JudgmentState::default()),
            ActivityMode::MemoryGame => ActivityState::MemoryGame(MemoryState::default()),
        }
    }

    pub fn mode(&self) -> ActivityMode {
        match self {
            ActivityState::Idle => ActivityMode::Idle,
            ActivityState::HighOrLow(_) => ActivityMode::HighOrLow,
            ActivityState::MatchSounds(_) => ActivityMode::MatchSounds,
            ActivityState::DrawMelody(_) => ActivityMode::DrawMelody,
            ActivityState::SoundJudgment(_) => ActivityMode::SoundJudgment,
            ActivityState::MemoryGame(_) => ActivityMode::MemoryGame,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        match self {
            ActivityState::Idle => RoundPhase::Empty,
            ActivityState::HighOrLow(s) => s.phase,
            ActivityState::MatchSounds(s) => s.phase,
            ActivityState::DrawMelody(s) => s.phase,
            ActivityState::SoundJudgment(s) => s.phase,
            ActivityState::MemoryGame(s) => s.phase,
        }
    }

    fn phase_mut(&mut self) -> Option<&mut RoundPhase> {
        match self {
            ActivityState::Idle => None,
            ActivityState::HighOrLow(s) => Some(&mut s.phase),
            ActivityState::MatchSounds(s) => Some(&mut s.phase),
            ActivityState::DrawMelody(s) => Some(&mut s.phase),
            ActivityState::SoundJudgment(s) => Some(&mut s.phase),
            ActivityState::MemoryGame(s) => Some(&mut s.phase),
        }
    }
}

/// Everything that belongs to the currently selected activity.
#[derive(Debug)]
pub struct ActivityContext {
    pub state: ActivityState,
    pub feedback: Option<String>,
    /// Cancels every round timer of the current mode
    round_token: CancelToken,
    /// Playback session that belongs to the current round
    session: Option<u64>,
    rounds: u64,
}

impl Default for ActivityContext {
    fn default() -> Self {
        Self::new(ActivityMode::Idle)
    }
}

impl ActivityContext {
    pub fn new(mode: ActivityMode) -> Self {
        Self {
            state: ActivityState::fresh(mode),
            feedback: None,
            round_token: CancelToken::new(),
            session: None,
            rounds: 0,
        }
    }

    pub fn mode(&self) -> ActivityMode {
        self.state.mode()
    }

    pub fn phase(&self) -> RoundPhase {
        self.state.phase()
    }

    pub(crate) fn set_phase(&mut self, phase: RoundPhase) {
        if let Some(slot) = self.state.phase_mut() {
            *slot = phase;
        }
    }

    pub(crate) fn round_token(&self) -> CancelToken {
        self.round_token.clone()
    }

    pub(crate) fn round(&self) -> u64 {
        self.rounds
    }

    pub(crate) fn next_round(&mut self) -> u64 {
        self.rounds += 1;
        self.rounds
    }
}

impl Drop for ActivityContext {
    fn drop(&mut self) {
        self.round_token.cancel();
    }
}
