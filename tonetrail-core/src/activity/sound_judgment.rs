//! "Does it sound right?": spot a wrong note in a familiar melody.

use super::RoundPhase;
use crate::generator::PatternGenerator;
use crate::melodies::Melody;
use crate::scheduler::{from_durations, PlaybackStep};
use crate::types::NoteToken;
use rand::Rng;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgmentRound {
    pub melody_id: String,
    pub melody_name: String,
    pub quarter_ms: u64,
    /// Notes as they will be played, possibly with one altered
    pub notes: Vec<NoteToken>,
    pub has_wrong_note: bool,
    pub wrong_position: Option<usize>,
}

impl JudgmentRound {
    /// Prepare `melody`, altering one note with probability `wrong_probability`.
    pub fn prepare<R: Rng>(
        generator: &mut PatternGenerator<R>,
        melody: &Melody,
        name: &str,
        wrong_probability: f64,
    ) -> Self {
        let mut round = JudgmentRound {
            melody_id: melody.id.clone(),
            melody_name: name.to_string(),
            quarter_ms: melody.quarter_ms,
            notes: melody.notes.clone(),
            has_wrong_note: false,
            wrong_position: None,
        };

        if generator.coin(wrong_probability) {
            match generator.corrupt(&melody.pattern()) {
                Ok(corruption) => {
                    round.has_wrong_note = corruption.was_corrupted();
                    round.wrong_position = Some(corruption.position);
                    round.notes = corruption.pattern.notes;
                }
                Err(e) => debug!(melody = %melody.id, error = %e, "melody played unaltered"),
            }
        }
        round
    }

    pub fn steps(&self) -> Vec<PlaybackStep> {
        from_durations(&self.notes, self.quarter_ms)
    }

    /// `sounds_right` is the player's claim that nothing was altered.
    pub fn judge(&self, sounds_right: bool) -> bool {
        sounds_right != self.has_wrong_note
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JudgmentState {
    pub phase: RoundPhase,
    pub round: Option<JudgmentRound>,
    pub previous_melody: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::melodies::MelodyCatalog;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_probability_extremes() {
        let catalog = MelodyCatalog::builtin();
        let melody = catalog.get("old-mcdonald").unwrap();
        let mut gen = PatternGenerator::new(StdRng::seed_from_u64(4));

        let clean = JudgmentRound::prepare(&mut gen, melody, "x", 0.0);
        assert!(!clean.has_wrong_note);
        assert_eq!(clean.notes, melody.notes);
        assert!(clean.judge(true));
        assert!(!clean.judge(false));

        let altered = JudgmentRound::prepare(&mut gen, melody, "x", 1.0);
        assert!(altered.has_wrong_note);
        let position = altered.wrong_position.unwrap();
        let differing: Vec<usize> = (0..melody.notes.len())
            .filter(|&i| !altered.notes[i].same_pitch(&melody.notes[i]))
            .collect();
        assert_eq!(differing, vec![position]);
        assert!(altered.judge(false));
    }
}
