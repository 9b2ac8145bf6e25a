use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lowest octave accepted by the notation.
pub const MIN_OCTAVE: u8 = 3;
/// Highest octave accepted by the notation.
pub const MAX_OCTAVE: u8 = 7;
/// Octave implied when a token omits the digit.
pub const DEFAULT_OCTAVE: u8 = 4;

/// Natural letters in diatonic order, used for letter shifts.
pub const LETTERS: [char; 7] = ['C', 'D', 'E', 'F', 'G', 'A', 'B'];

/// Errors produced while reading note notation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty note token")]
    Empty,
    #[error("invalid pitch '{0}'")]
    InvalidPitch(String),
    #[error("invalid octave '{0}' (expected 3-7)")]
    InvalidOctave(char),
    #[error("invalid duration suffix '{0}' (expected one of w, h, q, e, s)")]
    InvalidDuration(String),
    #[error("unexpected trailing input '{0}'")]
    TrailingInput(String),
}

/// The twelve chromatic pitch classes, spelled with sharps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Chromatic index (0 = C, 11 = B)
    pub fn semitone(self) -> u8 {
        self as u8
    }

    pub fn from_semitone(semitone: u8) -> Option<Self> {
        Self::ALL.get(semitone as usize).copied()
    }

    /// Build a pitch class from an uppercase letter and an optional sharp.
    /// `E#` and `B#` have no spelling in this notation.
    pub fn from_parts(letter: char, sharp: bool) -> Option<Self> {
        let natural = match letter {
            'C' => PitchClass::C,
            'D' => PitchClass::D,
            'E' => PitchClass::E,
            'F' => PitchClass::F,
            'G' => PitchClass::G,
            'A' => PitchClass::A,
            'B' => PitchClass::B,
            _ => return None,
        };
        if !sharp {
            return Some(natural);
        }
        match natural {
            PitchClass::E | PitchClass::B => None,
            other => Self::from_semitone(other.semitone() + 1),
        }
    }

    /// The natural letter this pitch class is written with.
    pub fn letter(self) -> char {
        match self {
            PitchClass::C | PitchClass::CSharp => 'C',
            PitchClass::D | PitchClass::DSharp => 'D',
            PitchClass::E => 'E',
            PitchClass::F | PitchClass::FSharp => 'F',
            PitchClass::G | PitchClass::GSharp => 'G',
            PitchClass::A | PitchClass::ASharp => 'A',
            PitchClass::B => 'B',
        }
    }

    pub fn is_sharp(self) -> bool {
        matches!(
            self,
            PitchClass::CSharp
                | PitchClass::DSharp
                | PitchClass::FSharp
                | PitchClass::GSharp
                | PitchClass::ASharp
        )
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_sharp() {
            write!(f, "{}#", self.letter())
        } else {
            write!(f, "{}", self.letter())
        }
    }
}

/// Rhythmic value of a note relative to a quarter note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DurationClass {
    Whole,
    Half,
    #[default]
    Quarter,
    Eighth,
    Sixteenth,
}

impl DurationClass {
    pub const ALL: [DurationClass; 5] = [
        DurationClass::Whole,
        DurationClass::Half,
        DurationClass::Quarter,
        DurationClass::Eighth,
        DurationClass::Sixteenth,
    ];

    pub fn suffix(self) -> char {
        match self {
            DurationClass::Whole => 'w',
            DurationClass::Half => 'h',
            DurationClass::Quarter => 'q',
            DurationClass::Eighth => 'e',
            DurationClass::Sixteenth => 's',
        }
    }

    pub fn from_suffix(suffix: &str) -> Result<Self, ParseError> {
        match suffix {
            "w" => Ok(DurationClass::Whole),
            "h" => Ok(DurationClass::Half),
            "q" => Ok(DurationClass::Quarter),
            "e" => Ok(DurationClass::Eighth),
            "s" => Ok(DurationClass::Sixteenth),
            other => Err(ParseError::InvalidDuration(other.to_string())),
        }
    }

    /// Multiplier applied to the base quarter-note length
    pub fn beats(self) -> f64 {
        match self {
            DurationClass::Whole => 4.0,
            DurationClass::Half => 2.0,
            DurationClass::Quarter => 1.0,
            DurationClass::Eighth => 0.5,
            DurationClass::Sixteenth => 0.25,
        }
    }

    /// Length in milliseconds for a given quarter-note length, rounded to the
    /// nearest millisecond.
    pub fn millis(self, base_quarter_ms: u64) -> u64 {
        (base_quarter_ms as f64 * self.beats()).round() as u64
    }
}

/// A single note of the interchange notation:
/// `Letter ["#"] [Digit] [":" DurSuffix]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NoteToken {
    pitch: PitchClass,
    octave: u8,
    duration: DurationClass,
}

/// Standard 12-tone equal temperament frequencies for the 4th octave (C4-B4)
/// Based on A4 = 440Hz standard tuning
const BASE_OCTAVE_FREQUENCIES: [f32; 12] = [
    261.63, // C4
    277.18, // C#4
    293.66, // D4
    311.13, // D#4
    329.63, // E4
    349.23, // F4
    369.99, // F#4
    392.00, // G4
    415.30, // G#4
    440.00, // A4
    466.16, // A#4
    493.88, // B4
];

impl NoteToken {
    pub fn new(pitch: PitchClass, octave: u8, duration: DurationClass) -> Result<Self, ParseError> {
        if !(MIN_OCTAVE..=MAX_OCTAVE).contains(&octave) {
            return Err(ParseError::InvalidOctave(
                char::from_digit(octave as u32, 10).unwrap_or('?'),
            ));
        }
        Ok(NoteToken {
            pitch,
            octave,
            duration,
        })
    }

    /// Quarter-note token; callers pass octaves that are already known valid.
    pub(crate) const fn quarter(pitch: PitchClass, octave: u8) -> Self {
        NoteToken {
            pitch,
            octave,
            duration: DurationClass::Quarter,
        }
    }

    pub fn pitch(&self) -> PitchClass {
        self.pitch
    }

    pub fn octave(&self) -> u8 {
        self.octave
    }

    pub fn duration(&self) -> DurationClass {
        self.duration
    }

    /// Playback length for this token given the melody's quarter-note length.
    pub fn duration_ms(&self, base_quarter_ms: u64) -> u64 {
        self.duration.millis(base_quarter_ms)
    }

    /// Replace the pitch with the natural `letter`, keeping octave and duration.
    pub fn with_letter(self, letter: char) -> Option<Self> {
        let pitch = PitchClass::from_parts(letter.to_ascii_uppercase(), false)?;
        Some(NoteToken { pitch, ..self })
    }

    /// MIDI note number, C4 = 60
    pub fn midi_number(&self) -> u8 {
        (self.octave + 1) * 12 + self.pitch.semitone()
    }

    /// Get the frequency for this note in Hz
    pub fn frequency(&self) -> f32 {
        let base_freq = BASE_OCTAVE_FREQUENCIES[self.pitch.semitone() as usize];
        let octave_diff = self.octave as i32 - DEFAULT_OCTAVE as i32;
        base_freq * 2.0_f32.powi(octave_diff)
    }

    /// Compare sounding pitch only; duration is ignored.
    pub fn compare_pitch(&self, other: &NoteToken) -> Ordering {
        self.midi_number().cmp(&other.midi_number())
    }

    pub fn same_pitch(&self, other: &NoteToken) -> bool {
        self.compare_pitch(other) == Ordering::Equal
    }

    /// Pitch and octave without the duration suffix, e.g. `F#5`.
    /// This is the text handed to the audio collaborator.
    pub fn pitch_name(&self) -> String {
        format!("{}{}", self.pitch, self.octave)
    }
}

impl FromStr for NoteToken {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars().peekable();

        let letter = chars
            .next()
            .ok_or(ParseError::Empty)?
            .to_ascii_uppercase();

        let sharp = chars.next_if_eq(&'#').is_some();
        let pitch = PitchClass::from_parts(letter, sharp).ok_or_else(|| {
            let mut text = letter.to_string();
            if sharp {
                text.push('#');
            }
            ParseError::InvalidPitch(text)
        })?;

        let octave = match chars.next_if(|c| c.is_ascii_digit()) {
            Some(digit) => {
                let value = digit.to_digit(10).unwrap_or_default() as u8;
                if !(MIN_OCTAVE..=MAX_OCTAVE).contains(&value) {
                    return Err(ParseError::InvalidOctave(digit));
                }
                value
            }
            None => DEFAULT_OCTAVE,
        };

        let duration = if chars.next_if_eq(&':').is_some() {
            let suffix = chars.next().map(|c| c.to_string()).unwrap_or_default();
            DurationClass::from_suffix(&suffix)?
        } else {
            DurationClass::Quarter
        };

        let rest: String = chars.collect();
        if !rest.is_empty() {
            return Err(ParseError::TrailingInput(rest));
        }

        Ok(NoteToken {
            pitch,
            octave,
            duration,
        })
    }
}

impl fmt::Display for NoteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch, self.octave)?;
        if self.duration != DurationClass::Quarter {
            write!(f, ":{}", self.duration.suffix())?;
        }
        Ok(())
    }
}

impl TryFrom<String> for NoteToken {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NoteToken> for String {
    fn from(token: NoteToken) -> Self {
        token.to_string()
    }
}

/// Parse a whitespace or comma separated list of tokens, stopping at the
/// first malformed one.
pub fn parse_sequence(text: &str) -> Result<Vec<NoteToken>, ParseError> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect()
}

/// Render tokens back into the space separated notation.
pub fn render_sequence(tokens: &[NoteToken]) -> String {
    tokens
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_token() -> Vec<NoteToken> {
        let mut all = Vec::new();
        for pitch in PitchClass::ALL {
            for octave in MIN_OCTAVE..=MAX_OCTAVE {
                for duration in DurationClass::ALL {
                    all.push(NoteToken::new(pitch, octave, duration).unwrap());
                }
            }
        }
        all
    }

    #[test]
    fn test_bare_letter_defaults() {
        let c: NoteToken = "C".parse().unwrap();
        assert_eq!(c.pitch(), PitchClass::C);
        assert_eq!(c.octave(), 4);
        assert_eq!(c.duration(), DurationClass::Quarter);
    }

    #[test]
    fn test_all_accepted_forms() {
        let cases = [
            ("A", PitchClass::A, 4, DurationClass::Quarter),
            ("a#", PitchClass::ASharp, 4, DurationClass::Quarter),
            ("D5", PitchClass::D, 5, DurationClass::Quarter),
            ("F#3", PitchClass::FSharp, 3, DurationClass::Quarter),
            ("E:e", PitchClass::E, 4, DurationClass::Eighth),
            ("G#:w", PitchClass::GSharp, 4, DurationClass::Whole),
            ("B3:s", PitchClass::B, 3, DurationClass::Sixteenth),
            ("C#7:h", PitchClass::CSharp, 7, DurationClass::Half),
            (" g4:q ", PitchClass::G, 4, DurationClass::Quarter),
        ];
        for (text, pitch, octave, duration) in cases {
            let token: NoteToken = text.parse().unwrap();
            assert_eq!(token.pitch(), pitch, "{}", text);
            assert_eq!(token.octave(), octave, "{}", text);
            assert_eq!(token.duration(), duration, "{}", text);
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<NoteToken>(), Err(ParseError::Empty));
        assert_eq!(
            "H4".parse::<NoteToken>(),
            Err(ParseError::InvalidPitch("H".into()))
        );
        assert_eq!(
            "E#4".parse::<NoteToken>(),
            Err(ParseError::InvalidPitch("E#".into()))
        );
        assert_eq!(
            "C4:x".parse::<NoteToken>(),
            Err(ParseError::InvalidDuration("x".into()))
        );
        assert_eq!(
            "C4:".parse::<NoteToken>(),
            Err(ParseError::InvalidDuration("".into()))
        );
        assert_eq!(
            "C9".parse::<NoteToken>(),
            Err(ParseError::InvalidOctave('9'))
        );
        assert!(matches!(
            "C44".parse::<NoteToken>(),
            Err(ParseError::TrailingInput(_))
        ));
        assert!(matches!(
            "C4:hh".parse::<NoteToken>(),
            Err(ParseError::TrailingInput(_))
        ));
    }

    #[test]
    fn test_render_is_canonical() {
        let token: NoteToken = "c#5:q".parse().unwrap();
        assert_eq!(token.to_string(), "C#5");

        let token: NoteToken = "G".parse().unwrap();
        assert_eq!(token.to_string(), "G4");

        let token: NoteToken = "a3:h".parse().unwrap();
        assert_eq!(token.to_string(), "A3:h");
    }

    #[test]
    fn test_round_trip_every_token() {
        for token in every_token() {
            let text = token.to_string();
            assert_eq!(text.parse::<NoteToken>(), Ok(token), "{}", text);
        }
    }

    #[test]
    fn test_duration_millis() {
        let half: NoteToken = "G4:h".parse().unwrap();
        assert_eq!(half.duration_ms(500), 1000);
        assert_eq!(DurationClass::Whole.millis(700), 2800);
        assert_eq!(DurationClass::Eighth.millis(550), 275);
        assert_eq!(DurationClass::Sixteenth.millis(450), 113);
    }

    #[test]
    fn test_midi_and_frequency() {
        let c4: NoteToken = "C4".parse().unwrap();
        assert_eq!(c4.midi_number(), 60);

        let a4: NoteToken = "A4".parse().unwrap();
        assert!((a4.frequency() - 440.0).abs() < 0.01);

        let a5: NoteToken = "A5".parse().unwrap();
        assert!((a5.frequency() - 880.0).abs() < 0.01);

        let a3: NoteToken = "A3".parse().unwrap();
        assert!((a3.frequency() - 220.0).abs() < 0.01);
    }

    #[test]
    fn test_pitch_comparison_ignores_duration() {
        let b4: NoteToken = "B4:h".parse().unwrap();
        let c5: NoteToken = "C5".parse().unwrap();
        assert_eq!(b4.compare_pitch(&c5), Ordering::Less);
        assert!(b4.same_pitch(&"B4:e".parse().unwrap()));
    }

    #[test]
    fn test_with_letter_keeps_octave_and_duration() {
        let token: NoteToken = "F#5:e".parse().unwrap();
        let shifted = token.with_letter('a').unwrap();
        assert_eq!(shifted.to_string(), "A5:e");
        assert!(token.with_letter('X').is_none());
    }

    #[test]
    fn test_sequence_helpers() {
        let tokens = parse_sequence("C4 D4, E4:h  G4").unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(render_sequence(&tokens), "C4 D4 E4:h G4");
        assert!(parse_sequence("C4 X4").is_err());
    }

    #[test]
    fn test_serde_uses_notation() {
        let token: NoteToken = "D#3:s".parse().unwrap();
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"D#3:s\"");
        let back: NoteToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }
}
