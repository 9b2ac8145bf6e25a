use crate::difficulty::UnlockEvent;
use crate::types::PatternKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en", alias = "english")]
    English,
    #[serde(rename = "de", alias = "german")]
    German,
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Language::English),
            "de" | "german" | "deutsch" => Ok(Language::German),
            other => Err(format!("Unknown language: {}", other)),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::English => write!(f, "en"),
            Language::German => write!(f, "de"),
        }
    }
}

/// Everything the game says to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    ToneCorrect { high: bool, comparison: bool },
    ToneWrong { high: bool, comparison: bool },
    PatternCorrect,
    PatternWrong,
    MemoryCorrect,
    MemoryWrong,
    JudgmentCorrect,
    JudgmentMissedWrongNote,
    JudgmentMelodyWasFine,
    DrawingMatched,
    DrawingMissed,
    Unlock(UnlockEvent),
}

impl Message {
    pub fn text(&self, language: Language) -> String {
        use Language::*;
        match (self, language) {
            (Message::ToneCorrect { high, comparison }, English) => {
                format!("Correct! The {} was {}!", tone_subject(*comparison, English), direction(*high, *comparison, English))
            }
            (Message::ToneCorrect { high, comparison }, German) => {
                format!("Richtig! {} war {}!", tone_subject(*comparison, German), direction(*high, *comparison, German))
            }
            (Message::ToneWrong { high, comparison }, English) => {
                format!("Try again. The {} was {}.", tone_subject(*comparison, English), direction(*high, *comparison, English))
            }
            (Message::ToneWrong { high, comparison }, German) => {
                format!("Versuch es noch einmal. {} war {}.", tone_subject(*comparison, German), direction(*high, *comparison, German))
            }
            (Message::PatternCorrect, English) => "Great job! That's correct!".into(),
            (Message::PatternCorrect, German) => "Super gemacht! Das ist richtig!".into(),
            (Message::PatternWrong, English) => "Not quite. Let's try again!".into(),
            (Message::PatternWrong, German) => "Nicht ganz. Versuchen wir es noch einmal!".into(),
            (Message::MemoryCorrect, English) => "Amazing memory! You got it right!".into(),
            (Message::MemoryCorrect, German) => "Tolles Gedächtnis! Das war richtig!".into(),
            (Message::MemoryWrong, English) => "Let's try again. Listen carefully!".into(),
            (Message::MemoryWrong, German) => "Versuchen wir es noch einmal. Hör genau hin!".into(),
            (Message::JudgmentCorrect, English) => "Well done! You heard correctly!".into(),
            (Message::JudgmentCorrect, German) => "Toll gemacht! Du hast richtig gehört!".into(),
            (Message::JudgmentMissedWrongNote, English) => "Listen again! There was a wrong note.".into(),
            (Message::JudgmentMissedWrongNote, German) => "Hör noch mal hin! Da war ein falscher Ton.".into(),
            (Message::JudgmentMelodyWasFine, English) => "The melody was correct. Try again!".into(),
            (Message::JudgmentMelodyWasFine, German) => "Die Melodie war richtig. Versuche es noch einmal!".into(),
            (Message::DrawingMatched, English) => "Your drawing follows the melody!".into(),
            (Message::DrawingMatched, German) => "Deine Zeichnung folgt der Melodie!".into(),
            (Message::DrawingMissed, English) => "Listen again and follow the melody with your line.".into(),
            (Message::DrawingMissed, German) => "Hör noch einmal hin und folge der Melodie mit deiner Linie.".into(),
            (Message::Unlock(event), lang) => unlock_text(event, lang),
        }
    }
}

fn tone_subject(comparison: bool, language: Language) -> &'static str {
    match (comparison, language) {
        (true, Language::English) => "second tone",
        (false, Language::English) => "tone",
        (true, Language::German) => "Der zweite Ton",
        (false, Language::German) => "Der Ton",
    }
}

fn direction(high: bool, comparison: bool, language: Language) -> &'static str {
    match (high, comparison, language) {
        (true, true, Language::English) => "higher",
        (false, true, Language::English) => "lower",
        (true, false, Language::English) => "high",
        (false, false, Language::English) => "low",
        (true, true, Language::German) => "höher",
        (false, true, Language::German) => "tiefer",
        (true, false, Language::German) => "hoch",
        (false, false, Language::German) => "tief",
    }
}

fn unlock_text(event: &UnlockEvent, language: Language) -> String {
    match (event, language) {
        (UnlockEvent::StageReached { stage: 2 }, Language::English) => {
            "🎉 Stage 2 reached! The tones are now closer together!".into()
        }
        (UnlockEvent::StageReached { stage: 3 }, Language::English) => {
            "🎵 Stage 3 reached! You now hear two tones in sequence!".into()
        }
        (UnlockEvent::StageReached { stage: 4 }, Language::English) => {
            "🚀 Stage 4 reached! The tones are even closer together!".into()
        }
        (UnlockEvent::StageReached { stage: 5 }, Language::English) => {
            "🏆 Master level reached! Ultimate challenge unlocked!".into()
        }
        (UnlockEvent::StageReached { stage: 2 }, Language::German) => {
            "🎉 Stufe 2 erreicht! Die Töne liegen jetzt näher beieinander!".into()
        }
        (UnlockEvent::StageReached { stage: 3 }, Language::German) => {
            "🎵 Stufe 3 erreicht! Jetzt hörst du zwei Töne nacheinander!".into()
        }
        (UnlockEvent::StageReached { stage: 4 }, Language::German) => {
            "🚀 Stufe 4 erreicht! Die Töne liegen noch näher beieinander!".into()
        }
        (UnlockEvent::StageReached { stage: 5 }, Language::German) => {
            "🏆 Meisterstufe erreicht! Die größte Herausforderung ist freigeschaltet!".into()
        }
        (UnlockEvent::StageReached { stage }, Language::English) => format!("Stage {} reached!", stage),
        (UnlockEvent::StageReached { stage }, Language::German) => format!("Stufe {} erreicht!", stage),
        (UnlockEvent::PatternUnlocked { kind: PatternKind::Wave }, Language::English) => {
            "Great! You unlocked wavy melodies! 🌊".into()
        }
        (UnlockEvent::PatternUnlocked { kind: PatternKind::Jump }, Language::English) => {
            "Amazing! You unlocked random jump melodies! 🐸".into()
        }
        (UnlockEvent::PatternUnlocked { kind: PatternKind::Wave }, Language::German) => {
            "Toll! Du hast Wellenmelodien freigeschaltet! 🌊".into()
        }
        (UnlockEvent::PatternUnlocked { kind: PatternKind::Jump }, Language::German) => {
            "Wahnsinn! Du hast Sprungmelodien freigeschaltet! 🐸".into()
        }
        (UnlockEvent::PatternUnlocked { kind }, Language::English) => format!("You unlocked {} melodies!", kind),
        (UnlockEvent::PatternUnlocked { kind }, Language::German) => format!("Du hast {}-Melodien freigeschaltet!", kind),
        (UnlockEvent::SequenceLengthIncreased { length }, Language::English) => {
            format!("Level up! Now remember {} notes.", length)
        }
        (UnlockEvent::SequenceLengthIncreased { length }, Language::German) => {
            format!("Nächste Stufe! Merke dir jetzt {} Töne.", length)
        }
    }
}
