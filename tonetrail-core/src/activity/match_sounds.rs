//! "Match the sounds": name the contour of a five-note pattern.

use super::RoundPhase;
use crate::config::GameConfig;
use crate::scheduler::{evenly_spaced, PlaybackStep};
use crate::types::{Pattern, PatternKind};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchState {
    pub phase: RoundPhase,
    /// Free play previews patterns; game mode asks about them
    pub game_mode: bool,
    pub round: Option<Pattern>,
}

pub fn steps(pattern: &Pattern, config: &GameConfig) -> Vec<PlaybackStep> {
    evenly_spaced(&pattern.notes, config.pattern_note_ms)
}

pub fn judge(pattern: &Pattern, answer: PatternKind) -> bool {
    pattern.kind == answer
}
