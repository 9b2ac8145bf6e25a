//! Progress counters and the thresholds they unlock.
//!
//! Counters never decrease. Every threshold is compared with `>=` after the
//! increment, so reaching a boundary exactly unlocks on that same answer.

use crate::types::{ActivityMode, NoteToken, Palette, PatternKind, PitchClass};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// High-or-low stage boundaries: stage `n + 2` starts at `HIGH_OR_LOW_THRESHOLDS[n]`.
pub const HIGH_OR_LOW_THRESHOLDS: [u32; 4] = [10, 20, 30, 40];
/// First stage that compares two tones instead of classifying one.
pub const TWO_TONE_STAGE: u8 = 3;
/// Pattern kinds gated behind matching progress.
pub const PATTERN_UNLOCKS: [(PatternKind, u32); 2] = [(PatternKind::Wave, 10), (PatternKind::Jump, 20)];
/// Memory-game progress at which the sequence grows, and the length it grows to.
pub const MEMORY_LENGTH_STEPS: [(u32, usize); 4] = [(3, 3), (6, 4), (11, 5), (16, 6)];
/// Memory-game sequence length before any step is reached.
pub const MEMORY_BASE_LENGTH: usize = 2;

/// Something that became available because a counter crossed a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UnlockEvent {
    StageReached { stage: u8 },
    PatternUnlocked { kind: PatternKind },
    SequenceLengthIncreased { length: usize },
}

/// Per-activity correct-answer counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    #[serde(rename = "high-or-low")]
    pub high_or_low: u32,
    #[serde(rename = "match-sounds")]
    pub match_sounds: u32,
    #[serde(rename = "draw")]
    pub draw_melody: u32,
    #[serde(rename = "does-it-sound-right")]
    pub sound_judgment: u32,
    #[serde(rename = "memory")]
    pub memory_game: u32,
}

impl Progress {
    pub fn get(&self, mode: ActivityMode) -> u32 {
        match mode {
            ActivityMode::Idle => 0,
            ActivityMode::HighOrLow => self.high_or_low,
            ActivityMode::MatchSounds => self.match_sounds,
            ActivityMode::DrawMelody => self.draw_melody,
            ActivityMode::SoundJudgment => self.sound_judgment,
            ActivityMode::MemoryGame => self.memory_game,
        }
    }

    fn slot(&mut self, mode: ActivityMode) -> Option<&mut u32> {
        match mode {
            ActivityMode::Idle => None,
            ActivityMode::HighOrLow => Some(&mut self.high_or_low),
            ActivityMode::MatchSounds => Some(&mut self.match_sounds),
            ActivityMode::DrawMelody => Some(&mut self.draw_melody),
            ActivityMode::SoundJudgment => Some(&mut self.sound_judgment),
            ActivityMode::MemoryGame => Some(&mut self.memory_game),
        }
    }
}

/// Difficulty tier of the high-or-low activity (1-5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HighOrLowStage(u8);

const fn tone(pitch: PitchClass, octave: u8) -> NoteToken {
    NoteToken::quarter(pitch, octave)
}

impl HighOrLowStage {
    pub fn from_progress(progress: u32) -> Self {
        let passed = HIGH_OR_LOW_THRESHOLDS
            .iter()
            .filter(|&&threshold| progress >= threshold)
            .count();
        HighOrLowStage(1 + passed as u8)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn is_two_tone(self) -> bool {
        self.0 >= TWO_TONE_STAGE
    }

    /// The fixed first tone of a two-tone comparison.
    pub fn reference_tone() -> NoteToken {
        tone(PitchClass::C, 5)
    }

    /// Candidate low tones; the ranges creep upwards as stages rise.
    pub fn low_pool(self) -> Palette {
        use PitchClass::*;
        let (low, high) = match self.0 {
            1 => (tone(C, 3), tone(F, 3)),
            2 | 3 => (tone(C, 3), tone(G, 3)),
            4 => (tone(D, 3), tone(A, 3)),
            _ => (tone(E, 3), tone(B, 3)),
        };
        Palette::chromatic(low, high).unwrap_or_else(|_| Palette::melody())
    }

    /// Candidate high tones; the ranges creep downwards as stages rise.
    pub fn high_pool(self) -> Palette {
        use PitchClass::*;
        let (low, high) = match self.0 {
            1..=3 => (tone(C, 5), tone(C, 6)),
            4 => (tone(B, 4), tone(FSharp, 5)),
            _ => (tone(A, 4), tone(E, 5)),
        };
        Palette::chromatic(low, high).unwrap_or_else(|_| Palette::melody())
    }
}

/// Memory-game sequence length for a given number of successes.
pub fn memory_length_for(progress: u32) -> usize {
    MEMORY_LENGTH_STEPS
        .iter()
        .rev()
        .find(|(threshold, _)| progress >= *threshold)
        .map(|(_, length)| *length)
        .unwrap_or(MEMORY_BASE_LENGTH)
}

fn derived_unlocks(match_progress: u32) -> impl Iterator<Item = PatternKind> {
    PATTERN_UNLOCKS
        .into_iter()
        .filter(move |(_, threshold)| match_progress >= *threshold)
        .map(|(kind, _)| kind)
}

#[derive(Debug, Clone)]
pub struct DifficultyController {
    progress: Progress,
    unlocked: Vec<PatternKind>,
}

impl Default for DifficultyController {
    fn default() -> Self {
        Self::new()
    }
}

impl DifficultyController {
    pub fn new() -> Self {
        Self {
            progress: Progress::default(),
            unlocked: vec![PatternKind::Up, PatternKind::Down],
        }
    }

    /// Rebuild from persisted counters and unlocks. Unlocks implied by the
    /// counters are added back, so a lost unlock list never regresses.
    pub fn restore(progress: Progress, persisted_unlocks: &[PatternKind]) -> Self {
        let mut controller = Self {
            progress,
            unlocked: Vec::new(),
        };
        let derived: Vec<PatternKind> = derived_unlocks(controller.progress.match_sounds).collect();
        controller.unlocked = PatternKind::CONTOURS
            .into_iter()
            .filter(|kind| {
                matches!(kind, PatternKind::Up | PatternKind::Down)
                    || persisted_unlocks.contains(kind)
                    || derived.contains(kind)
            })
            .collect();
        debug!(unlocked = ?controller.unlocked, "restored difficulty state");
        controller
    }

    pub fn progress(&self, mode: ActivityMode) -> u32 {
        self.progress.get(mode)
    }

    pub fn all_progress(&self) -> &Progress {
        &self.progress
    }

    pub fn high_or_low_stage(&self) -> HighOrLowStage {
        HighOrLowStage::from_progress(self.progress.high_or_low)
    }

    pub fn unlocked_patterns(&self) -> &[PatternKind] {
        &self.unlocked
    }

    pub fn is_unlocked(&self, kind: PatternKind) -> bool {
        self.unlocked.contains(&kind)
    }

    pub fn memory_sequence_length(&self) -> usize {
        memory_length_for(self.progress.memory_game)
    }

    /// Count one correct answer and report anything it unlocked.
    pub fn record_correct(&mut self, mode: ActivityMode) -> Vec<UnlockEvent> {
        let stage_before = self.high_or_low_stage();
        let length_before = self.memory_sequence_length();

        let Some(slot) = self.progress.slot(mode) else {
            debug!("correct answer recorded while idle, ignoring");
            return Vec::new();
        };
        *slot += 1;
        let count = *slot;

        let mut events = Vec::new();
        match mode {
            ActivityMode::HighOrLow => {
                let stage = self.high_or_low_stage();
                if stage > stage_before {
                    events.push(UnlockEvent::StageReached {
                        stage: stage.number(),
                    });
                }
            }
            ActivityMode::MatchSounds => {
                for kind in derived_unlocks(count) {
                    if !self.unlocked.contains(&kind) {
                        self.unlocked.push(kind);
                        events.push(UnlockEvent::PatternUnlocked { kind });
                    }
                }
            }
            ActivityMode::MemoryGame => {
                let length = self.memory_sequence_length();
                if length != length_before {
                    events.push(UnlockEvent::SequenceLengthIncreased { length });
                }
            }
            ActivityMode::DrawMelody | ActivityMode::SoundJudgment | ActivityMode::Idle => {}
        }

        for event in &events {
            info!(%mode, count, ?event, "unlocked");
        }
        events
    }

    /// Wrong answers never cost progress.
    pub fn record_wrong(&mut self, mode: ActivityMode) {
        debug!(%mode, count = self.progress(mode), "wrong answer, progress unchanged");
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::note::render_sequence;

    fn at(mode: ActivityMode, count: u32) -> DifficultyController {
        let mut progress = Progress::default();
        if let Some(slot) = progress.slot(mode) {
            *slot = count;
        }
        DifficultyController::restore(progress, &[])
    }

    #[test]
    fn test_stage_boundaries() {
        assert_eq!(HighOrLowStage::from_progress(0).number(), 1);
        assert_eq!(HighOrLowStage::from_progress(9).number(), 1);
        assert_eq!(HighOrLowStage::from_progress(10).number(), 2);
        assert_eq!(HighOrLowStage::from_progress(29).number(), 3);
        assert_eq!(HighOrLowStage::from_progress(40).number(), 5);
        assert_eq!(HighOrLowStage::from_progress(400).number(), 5);
    }

    #[test]
    fn test_stage_event_exactly_at_each_threshold() {
        for (i, threshold) in HIGH_OR_LOW_THRESHOLDS.iter().enumerate() {
            let mut controller = at(ActivityMode::HighOrLow, threshold - 1);
            let events = controller.record_correct(ActivityMode::HighOrLow);
            assert_eq!(
                events,
                vec![UnlockEvent::StageReached {
                    stage: i as u8 + 2
                }]
            );
            assert!(controller.record_correct(ActivityMode::HighOrLow).is_empty());
        }
    }

    #[test]
    fn test_wrong_answers_keep_progress() {
        let mut controller = at(ActivityMode::HighOrLow, 9);
        controller.record_wrong(ActivityMode::HighOrLow);
        assert_eq!(controller.progress(ActivityMode::HighOrLow), 9);
    }

    #[test]
    fn test_pattern_unlocks() {
        let mut controller = at(ActivityMode::MatchSounds, 9);
        assert!(!controller.is_unlocked(PatternKind::Wave));
        assert_eq!(
            controller.record_correct(ActivityMode::MatchSounds),
            vec![UnlockEvent::PatternUnlocked { kind: PatternKind::Wave }]
        );
        assert!(controller.is_unlocked(PatternKind::Wave));
        assert!(!controller.is_unlocked(PatternKind::Jump));
    }

    #[test]
    fn test_restore_unions_persisted_and_derived() {
        let progress = Progress {
            match_sounds: 12,
            ..Default::default()
        };
        let controller = DifficultyController::restore(progress, &[PatternKind::Jump]);
        assert_eq!(
            controller.unlocked_patterns(),
            &[
                PatternKind::Up,
                PatternKind::Down,
                PatternKind::Wave,
                PatternKind::Jump
            ]
        );
    }

    #[test]
    fn test_memory_lengths() {
        let expected = [2, 2, 2, 3, 3, 3, 4, 4, 4, 4, 4, 5, 5, 5, 5, 5, 6];
        for (count, length) in expected.iter().enumerate() {
            assert_eq!(memory_length_for(count as u32), *length, "count {}", count);
        }
    }

    #[test]
    fn test_memory_length_event() {
        let mut controller = at(ActivityMode::MemoryGame, 5);
        assert_eq!(
            controller.record_correct(ActivityMode::MemoryGame),
            vec![UnlockEvent::SequenceLengthIncreased { length: 4 }]
        );
    }

    #[test]
    fn test_tone_pools() {
        let stage1 = HighOrLowStage::from_progress(0);
        assert_eq!(render_sequence(stage1.low_pool().notes()), "C3 C#3 D3 D#3 E3 F3");
        assert_eq!(stage1.high_pool().len(), 13);
        assert!(!stage1.is_two_tone());

        let stage5 = HighOrLowStage::from_progress(45);
        assert_eq!(render_sequence(stage5.low_pool().notes()), "E3 F3 F#3 G3 G#3 A3 A#3 B3");
        assert_eq!(render_sequence(stage5.high_pool().notes()), "A4 A#4 B4 C5 C#5 D5 D#5 E5");
        assert!(stage5.is_two_tone());
    }

    #[test]
    fn test_idle_records_nothing() {
        let mut controller = DifficultyController::new();
        assert!(controller.record_correct(ActivityMode::Idle).is_empty());
        assert_eq!(controller.all_progress(), &Progress::default());
    }

    #[test]
    fn test_progress_serde_keys() {
        let progress = Progress {
            sound_judgment: 3,
            ..Default::default()
        };
        let json = serde_json::to_string(&progress).unwrap();
        assert!(json.contains("\"does-it-sound-right\":3"));
        let partial: Progress = serde_json::from_str("{\"memory\": 4}").unwrap();
        assert_eq!(partial.memory_game, 4);
    }
}
