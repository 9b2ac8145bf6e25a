//! Structured notifications emitted by the activity machine.
//!
//! Frontends subscribe by draining [`crate::ActivityMachine::take_events`];
//! nothing in the core renders or animates.

use crate::difficulty::UnlockEvent;
use crate::types::{ActivityMode, NoteToken, PatternKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GameEvent {
    ModeChanged {
        mode: ActivityMode,
    },
    RoundStarted {
        mode: ActivityMode,
        round: u64,
    },
    NoteStarted {
        index: usize,
        note: NoteToken,
        at_ms: u64,
    },
    NoteFailed {
        index: usize,
        note: NoteToken,
        error: String,
    },
    SequenceCompleted {
        at_ms: u64,
    },
    PlaybackCancelled,
    MelodyChosen {
        id: String,
        name: String,
    },
    PatternPreviewed {
        kind: PatternKind,
    },
    KeyAccepted {
        note: NoteToken,
        position: usize,
    },
    AnswerJudged {
        mode: ActivityMode,
        correct: bool,
        expected: String,
    },
    Feedback {
        text: String,
    },
    StageUnlocked {
        unlock: UnlockEvent,
        message: String,
    },
    ProgressChanged {
        mode: ActivityMode,
        count: u32,
    },
    ChallengeToggled {
        enabled: bool,
    },
    GameModeChanged {
        mode: ActivityMode,
        game: bool,
    },
    ProgressReset,
}
