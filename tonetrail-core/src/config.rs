use crate::messages::Language;
use serde::{Deserialize, Serialize};

/// Timing and behaviour knobs of the game. Every field has a default, so a
/// partial table deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub language: Language,
    /// Fixed RNG seed; `None` lets the frontend pick one
    pub seed: Option<u64>,
    /// Spacing of contour patterns in the matching activity
    pub pattern_note_ms: u64,
    pub memory_note_ms: u64,
    pub drawing_note_ms: u64,
    pub reference_note_ms: u64,
    /// How long a high-or-low tone sounds
    pub tone_ms: u64,
    /// Onset distance between the two tones of a comparison
    pub tone_gap_ms: u64,
    /// Extra time after the last tone before answers are accepted
    pub settle_ms: u64,
    /// Pause after an answer before the next round starts
    pub feedback_delay_ms: u64,
    /// Quarter-note length for melodies that do not set their own
    pub default_quarter_ms: u64,
    pub wrong_note_probability: f64,
    pub reference_length: usize,
    pub max_drawing_points: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            language: Language::English,
            seed: None,
            pattern_note_ms: 750,
            memory_note_ms: 600,
            drawing_note_ms: 300,
            reference_note_ms: 500,
            tone_ms: 800,
            tone_gap_ms: 1000,
            settle_ms: 900,
            feedback_delay_ms: 2000,
            default_quarter_ms: 700,
            wrong_note_probability: 0.5,
            reference_length: 6,
            max_drawing_points: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: GameConfig =
            serde_json::from_str(r#"{"language": "de", "seed": 7, "feedback_delay_ms": 10}"#).unwrap();
        assert_eq!(config.language, Language::German);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.feedback_delay_ms, 10);
        assert_eq!(config.pattern_note_ms, 750);
    }
}
