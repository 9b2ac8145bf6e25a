// tonetrail-core/src/types/mod.rs

pub mod mode;
pub mod note;
pub mod palette;
pub mod pattern;

pub use mode::ActivityMode;
pub use note::{DurationClass, NoteToken, ParseError, PitchClass};
pub use palette::{Palette, PaletteError};
pub use pattern::{Pattern, PatternKind, CONTOUR_LENGTH};
