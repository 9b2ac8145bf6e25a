use super::note::{NoteToken, PitchClass};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaletteError {
    #[error("a palette needs at least one note")]
    Empty,
    #[error("palette is not strictly ascending at position {0}")]
    NotAscending(usize),
}

/// An ordered, strictly ascending, non-empty list of playable notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<NoteToken>", into = "Vec<NoteToken>")]
pub struct Palette {
    notes: Vec<NoteToken>,
}

const NATURALS: [PitchClass; 7] = [
    PitchClass::C,
    PitchClass::D,
    PitchClass::E,
    PitchClass::F,
    PitchClass::G,
    PitchClass::A,
    PitchClass::B,
];

impl Palette {
    pub fn new(notes: Vec<NoteToken>) -> Result<Self, PaletteError> {
        if notes.is_empty() {
            return Err(PaletteError::Empty);
        }
        if let Some(pos) = notes
            .windows(2)
            .position(|pair| pair[0].midi_number() >= pair[1].midi_number())
        {
            return Err(PaletteError::NotAscending(pos + 1));
        }
        Ok(Palette { notes })
    }

    /// Natural notes C3 through C6, used for the contour patterns.
    pub fn melody() -> Self {
        let mut notes = Self::naturals(3..=5);
        notes.push(NoteToken::quarter(PitchClass::C, 6));
        Palette { notes }
    }

    /// Natural notes C3 through G4, used for drawn and reference melodies.
    pub fn drawing() -> Self {
        let notes = Self::naturals(3..=4).into_iter().take(12).collect();
        Palette { notes }
    }

    /// The pentatonic keys of the memory game: C4 D4 E4 G4 A4.
    pub fn memory() -> Self {
        let notes = [
            PitchClass::C,
            PitchClass::D,
            PitchClass::E,
            PitchClass::G,
            PitchClass::A,
        ]
        .into_iter()
        .map(|pitch| NoteToken::quarter(pitch, 4))
        .collect();
        Palette { notes }
    }

    /// Every semitone from `low` to `high` inclusive.
    pub fn chromatic(low: NoteToken, high: NoteToken) -> Result<Self, PaletteError> {
        let notes = (low.midi_number()..=high.midi_number())
            .filter_map(|midi| {
                let octave = midi / 12 - 1;
                let pitch = PitchClass::from_semitone(midi % 12)?;
                NoteToken::new(pitch, octave, Default::default()).ok()
            })
            .collect();
        Self::new(notes)
    }

    fn naturals(octaves: std::ops::RangeInclusive<u8>) -> Vec<NoteToken> {
        octaves
            .flat_map(|octave| NATURALS.iter().map(move |&pitch| NoteToken::quarter(pitch, octave)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<NoteToken> {
        self.notes.get(index).copied()
    }

    /// Note at `index`, clamped into range.
    pub fn clamped(&self, index: isize) -> NoteToken {
        let last = self.notes.len() as isize - 1;
        self.notes[index.clamp(0, last) as usize]
    }

    pub fn notes(&self) -> &[NoteToken] {
        &self.notes
    }

    /// Palette position of a note with the same pitch, if any.
    pub fn position_of(&self, note: &NoteToken) -> Option<usize> {
        self.notes.iter().position(|n| n.same_pitch(note))
    }

    pub fn lowest(&self) -> NoteToken {
        self.notes[0]
    }

    pub fn highest(&self) -> NoteToken {
        self.notes[self.notes.len() - 1]
    }
}

impl TryFrom<Vec<NoteToken>> for Palette {
    type Error = PaletteError;

    fn try_from(notes: Vec<NoteToken>) -> Result<Self, Self::Error> {
        Palette::new(notes)
    }
}

impl From<Palette> for Vec<NoteToken> {
    fn from(palette: Palette) -> Self {
        palette.notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::note::render_sequence;

    #[test]
    fn test_builtin_palettes() {
        let melody = Palette::melody();
        assert_eq!(melody.len(), 22);
        assert_eq!(melody.lowest().to_string(), "C3");
        assert_eq!(melody.highest().to_string(), "C6");

        let drawing = Palette::drawing();
        assert_eq!(drawing.len(), 12);
        assert_eq!(drawing.highest().to_string(), "G4");

        assert_eq!(render_sequence(Palette::memory().notes()), "C4 D4 E4 G4 A4");
    }

    #[test]
    fn test_rejects_unordered_notes() {
        let notes = vec!["D4".parse().unwrap(), "C4".parse().unwrap()];
        assert_eq!(Palette::new(notes), Err(PaletteError::NotAscending(1)));
        assert_eq!(Palette::new(Vec::new()), Err(PaletteError::Empty));
    }

    #[test]
    fn test_chromatic_range() {
        let pool = Palette::chromatic("C3".parse().unwrap(), "F3".parse().unwrap()).unwrap();
        assert_eq!(render_sequence(pool.notes()), "C3 C#3 D3 D#3 E3 F3");
    }

    #[test]
    fn test_clamped_access() {
        let palette = Palette::memory();
        assert_eq!(palette.clamped(-3).to_string(), "C4");
        assert_eq!(palette.clamped(99).to_string(), "A4");
        assert_eq!(palette.position_of(&"E4:h".parse().unwrap()), Some(2));
    }
}
