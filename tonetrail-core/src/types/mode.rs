use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The selectable activities of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityMode {
    #[default]
    Idle,
    HighOrLow,
    MatchSounds,
    DrawMelody,
    SoundJudgment,
    MemoryGame,
}

impl ActivityMode {
    pub const ALL: [ActivityMode; 6] = [
        ActivityMode::Idle,
        ActivityMode::HighOrLow,
        ActivityMode::MatchSounds,
        ActivityMode::DrawMelody,
        ActivityMode::SoundJudgment,
        ActivityMode::MemoryGame,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ActivityMode::Idle => "idle",
            ActivityMode::HighOrLow => "high-or-low",
            ActivityMode::MatchSounds => "match-sounds",
            ActivityMode::DrawMelody => "draw-melody",
            ActivityMode::SoundJudgment => "sound-judgment",
            ActivityMode::MemoryGame => "memory-game",
        }
    }
}

impl fmt::Display for ActivityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActivityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "idle" | "none" => Ok(ActivityMode::Idle),
            "high-or-low" | "highlow" | "hl" => Ok(ActivityMode::HighOrLow),
            "match-sounds" | "match" => Ok(ActivityMode::MatchSounds),
            "draw-melody" | "draw" => Ok(ActivityMode::DrawMelody),
            "sound-judgment" | "judge" | "does-it-sound-right" => Ok(ActivityMode::SoundJudgment),
            "memory-game" | "memory" => Ok(ActivityMode::MemoryGame),
            other => Err(format!("Unknown activity: {}", other)),
        }
    }
}
