//! "High or low?": classify a single tone, or from stage 3 on, say whether
//! a second tone is higher or lower than a fixed reference.

use super::RoundPhase;
use crate::config::GameConfig;
use crate::difficulty::HighOrLowStage;
use crate::generator::PatternGenerator;
use crate::scheduler::PlaybackStep;
use crate::types::NoteToken;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pitch {
    High,
    Low,
}

impl FromStr for Pitch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" | "higher" | "h" | "up" => Ok(Pitch::High),
            "low" | "lower" | "l" | "down" => Ok(Pitch::Low),
            other => Err(format!("Expected high or low, got '{}'", other)),
        }
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pitch::High => write!(f, "high"),
            Pitch::Low => write!(f, "low"),
        }
    }
}

/// One question: the tones to play and the answer they call for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToneRound {
    pub tones: Vec<NoteToken>,
    pub expected: Pitch,
    pub stage: HighOrLowStage,
}

impl ToneRound {
    pub fn is_comparison(&self) -> bool {
        self.tones.len() == 2
    }

    pub fn generate<R: Rng>(generator: &mut PatternGenerator<R>, stage: HighOrLowStage) -> Self {
        let low = stage.low_pool();
        let high = stage.high_pool();

        if stage.is_two_tone() {
            let reference = HighOrLowStage::reference_tone();
            let pool = if generator.coin(0.5) { &high } else { &low };
            let second = generator.pick_excluding(pool, &reference);
            let expected = match second.compare_pitch(&reference) {
                Ordering::Greater => Pitch::High,
                _ => Pitch::Low,
            };
            ToneRound {
                tones: vec![reference, second],
                expected,
                stage,
            }
        } else {
            let expected = if generator.coin(0.5) {
                Pitch::High
            } else {
                Pitch::Low
            };
            let tone = match expected {
                Pitch::High => generator.pick(&high),
                Pitch::Low => generator.pick(&low),
            };
            ToneRound {
                tones: vec![tone],
                expected,
                stage,
            }
        }
    }

    /// Tones sound for `tone_ms`; the comparison tone follows after
    /// `tone_gap_ms`, and the round counts as heard `settle_ms` after the
    /// last tone starts.
    pub fn steps(&self, config: &GameConfig) -> Vec<PlaybackStep> {
        let last = self.tones.len().saturating_sub(1);
        self.tones
            .iter()
            .enumerate()
            .map(|(i, &tone)| {
                let spacing = if i == last {
                    config.settle_ms
                } else {
                    config.tone_gap_ms
                };
                PlaybackStep::new(tone, spacing).with_sound_ms(config.tone_ms)
            })
            .collect()
    }

    pub fn judge(&self, answer: Pitch) -> bool {
        answer == self.expected
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighOrLowState {
    pub phase: RoundPhase,
    pub round: Option<ToneRound>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn generator() -> PatternGenerator<StdRng> {
        PatternGenerator::new(StdRng::seed_from_u64(21))
    }

    #[test]
    fn test_single_tone_matches_expected_pool() {
        let mut gen = generator();
        let stage = HighOrLowStage::from_progress(0);
        for _ in 0..100 {
            let round = ToneRound::generate(&mut gen, stage);
            assert!(!round.is_comparison());
            let pool = match round.expected {
                Pitch::High => stage.high_pool(),
                Pitch::Low => stage.low_pool(),
            };
            assert!(pool.position_of(&round.tones[0]).is_some());
        }
    }

    #[test]
    fn test_comparison_expected_follows_pitch() {
        let mut gen = generator();
        let stage = HighOrLowStage::from_progress(45);
        let reference = HighOrLowStage::reference_tone();
        for _ in 0..100 {
            let round = ToneRound::generate(&mut gen, stage);
            assert!(round.is_comparison());
            assert_eq!(round.tones[0], reference);
            assert!(!round.tones[1].same_pitch(&reference));
            let higher = round.tones[1].compare_pitch(&reference) == Ordering::Greater;
            assert_eq!(round.judge(Pitch::High), higher);
            assert_eq!(round.judge(Pitch::Low), !higher);
        }
    }

    #[test]
    fn test_comparison_timing() {
        let config = GameConfig::default();
        let round = ToneRound {
            tones: vec!["C5".parse().unwrap(), "E3".parse().unwrap()],
            expected: Pitch::Low,
            stage: HighOrLowStage::from_progress(20),
        };
        let steps = round.steps(&config);
        assert_eq!(steps[0].duration_ms, 1000);
        assert_eq!(steps[1].duration_ms, 900);
        assert!(steps.iter().all(|s| s.sound_ms == 800));
    }

    #[test]
    fn test_pitch_parsing() {
        assert_eq!("Higher".parse::<Pitch>(), Ok(Pitch::High));
        assert_eq!("l".parse::<Pitch>(), Ok(Pitch::Low));
        assert!("middle".parse::<Pitch>().is_err());
    }
}
