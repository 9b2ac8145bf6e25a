use super::note::{render_sequence, NoteToken};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of notes in a contour pattern.
pub const CONTOUR_LENGTH: usize = 5;

/// Shape of a generated melody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternKind {
    Up,
    Down,
    Wave,
    Jump,
    Reference,
    CorruptedReference,
}

impl PatternKind {
    /// Kinds the matching activity can ask about, in unlock order.
    pub const CONTOURS: [PatternKind; 4] = [
        PatternKind::Up,
        PatternKind::Down,
        PatternKind::Wave,
        PatternKind::Jump,
    ];

    pub fn is_contour(self) -> bool {
        Self::CONTOURS.contains(&self)
    }

    pub fn name(self) -> &'static str {
        match self {
            PatternKind::Up => "up",
            PatternKind::Down => "down",
            PatternKind::Wave => "wave",
            PatternKind::Jump => "jump",
            PatternKind::Reference => "reference",
            PatternKind::CorruptedReference => "corrupted-reference",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PatternKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up" => Ok(PatternKind::Up),
            "down" => Ok(PatternKind::Down),
            "wave" | "wavy" => Ok(PatternKind::Wave),
            "jump" | "jumpy" => Ok(PatternKind::Jump),
            "reference" => Ok(PatternKind::Reference),
            "corrupted-reference" | "corrupted" => Ok(PatternKind::CorruptedReference),
            other => Err(format!("Unknown pattern kind: {}", other)),
        }
    }
}

/// A generated melody together with the shape it was generated as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub kind: PatternKind,
    pub notes: Vec<NoteToken>,
}

impl Pattern {
    pub fn new(kind: PatternKind, notes: Vec<NoteToken>) -> Self {
        Pattern { kind, notes }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Positions where `self` and `other` differ in pitch.
    pub fn differences(&self, other: &Pattern) -> Vec<usize> {
        self.notes
            .iter()
            .zip(other.notes.iter())
            .enumerate()
            .filter(|(_, (a, b))| !a.same_pitch(b))
            .map(|(i, _)| i)
            .collect()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.kind, render_sequence(&self.notes))
    }
}
