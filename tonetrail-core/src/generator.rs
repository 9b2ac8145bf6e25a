//! Procedural melody generation.
//!
//! Every operation draws from the generator's random source only, so a
//! seeded generator reproduces the same patterns.

use crate::types::note::LETTERS;
use crate::types::{NoteToken, Palette, Pattern, PatternKind, CONTOUR_LENGTH};
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

/// Resampling budget per note of a jump pattern.
pub const MAX_JUMP_ATTEMPTS: usize = 64;
/// Minimum palette distance between consecutive jump notes.
pub const MIN_JUMP_DISTANCE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("palette of {len} notes is too small for a {kind} pattern")]
    PaletteTooSmall { kind: PatternKind, len: usize },
    #[error("{0} is not a contour pattern")]
    NotAContour(PatternKind),
    #[error("a pattern of {0} notes has no inner note to corrupt")]
    TooShortToCorrupt(usize),
    #[error("no pattern kinds are unlocked")]
    NothingUnlocked,
    #[error("requested a melody of length zero")]
    ZeroLength,
}

/// Result of [`PatternGenerator::corrupt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corruption {
    pub pattern: Pattern,
    pub position: usize,
    pub original: NoteToken,
    pub replacement: NoteToken,
}

impl Corruption {
    /// A successful corruption always alters exactly one note.
    pub fn was_corrupted(&self) -> bool {
        true
    }
}

pub struct PatternGenerator<R: Rng> {
    rng: R,
}

impl<R: Rng> PatternGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn rng(&mut self) -> &mut R {
        &mut self.rng
    }

    /// Five consecutive ascending notes starting in the lower part of the palette.
    pub fn generate_up(&mut self, palette: &Palette) -> Pattern {
        let len = palette.len();
        let max_start = (len * 2 / 3).min(len.saturating_sub(CONTOUR_LENGTH));
        let start = self.rng.gen_range(0..=max_start) as isize;

        let notes = (0..CONTOUR_LENGTH as isize)
            .map(|i| palette.clamped(start + i))
            .collect();
        Pattern::new(PatternKind::Up, notes)
    }

    /// Five descending notes; indices below the floor are clamped, which can
    /// repeat the lowest note on small palettes.
    pub fn generate_down(&mut self, palette: &Palette) -> Pattern {
        let len = palette.len();
        let low = (len / 2).max(CONTOUR_LENGTH - 1).min(len - 1);
        let high = len.saturating_sub(2).max(low);
        let start = self.rng.gen_range(low..=high) as isize;

        let notes = (0..CONTOUR_LENGTH as isize)
            .map(|i| palette.clamped(start - i))
            .collect();
        Pattern::new(PatternKind::Down, notes)
    }

    /// Two notes 1-3 palette steps apart, alternated `a b a b a`.
    pub fn generate_wave(&mut self, palette: &Palette) -> Result<Pattern, GenerateError> {
        let len = palette.len();
        if len < 2 {
            return Err(GenerateError::PaletteTooSmall {
                kind: PatternKind::Wave,
                len,
            });
        }

        let first = self.rng.gen_range(0..len);
        let interval = self.rng.gen_range(1..=3.min(len - 1));
        let upward = self.rng.gen_bool(0.5);

        let in_range = |up: bool, step: usize| {
            if up {
                (first + step < len).then_some(first + step)
            } else {
                first.checked_sub(step)
            }
        };

        let second = in_range(upward, interval)
            .or_else(|| in_range(!upward, interval))
            .or_else(|| in_range(upward, 1))
            .or_else(|| in_range(!upward, 1))
            .ok_or(GenerateError::PaletteTooSmall {
                kind: PatternKind::Wave,
                len,
            })?;

        let a = palette.clamped(first as isize);
        let b = palette.clamped(second as isize);
        Ok(Pattern::new(PatternKind::Wave, vec![a, b, a, b, a]))
    }

    /// Five notes with consecutive palette distance of at least three.
    ///
    /// Resampling is bounded; when no valid candidate turns up the farthest
    /// one seen is used instead.
    pub fn generate_jump(&mut self, palette: &Palette) -> Pattern {
        let len = palette.len();
        let mut indices = Vec::with_capacity(CONTOUR_LENGTH);
        indices.push(self.rng.gen_range(0..len));

        while indices.len() < CONTOUR_LENGTH {
            let previous = indices[indices.len() - 1];
            let mut best = previous;
            let mut found = false;

            for _ in 0..MAX_JUMP_ATTEMPTS {
                let candidate = self.rng.gen_range(0..len);
                if candidate.abs_diff(previous) >= MIN_JUMP_DISTANCE {
                    best = candidate;
                    found = true;
                    break;
                }
                if candidate.abs_diff(previous) > best.abs_diff(previous) {
                    best = candidate;
                }
            }

            if !found {
                warn!(
                    palette_len = len,
                    distance = best.abs_diff(previous),
                    "jump pattern could not keep the minimum distance"
                );
            }
            indices.push(best);
        }

        let notes = indices
            .into_iter()
            .map(|i| palette.clamped(i as isize))
            .collect();
        Pattern::new(PatternKind::Jump, notes)
    }

    /// Dispatch on a contour kind.
    pub fn generate(&mut self, kind: PatternKind, palette: &Palette) -> Result<Pattern, GenerateError> {
        debug!(%kind, "generating pattern");
        match kind {
            PatternKind::Up => Ok(self.generate_up(palette)),
            PatternKind::Down => Ok(self.generate_down(palette)),
            PatternKind::Wave => self.generate_wave(palette),
            PatternKind::Jump => Ok(self.generate_jump(palette)),
            PatternKind::Reference | PatternKind::CorruptedReference => {
                Err(GenerateError::NotAContour(kind))
            }
        }
    }

    /// Random walk of `length` notes starting near the middle of the palette,
    /// moving at most two steps at a time.
    pub fn generate_reference(
        &mut self,
        palette: &Palette,
        length: usize,
    ) -> Result<Pattern, GenerateError> {
        if length == 0 {
            return Err(GenerateError::ZeroLength);
        }

        let len = palette.len();
        let low = 2.min(len - 1);
        let high = len.saturating_sub(3).max(low);
        let mut index = self.rng.gen_range(low..=high) as isize;

        let mut notes = Vec::with_capacity(length);
        notes.push(palette.clamped(index));
        for _ in 1..length {
            let step = self.rng.gen_range(-2..=2);
            index = (index + step).clamp(0, len as isize - 1);
            notes.push(palette.clamped(index));
        }
        Ok(Pattern::new(PatternKind::Reference, notes))
    }

    /// Copy `pattern` with one inner note moved one or two letters away,
    /// keeping its octave and duration.
    pub fn corrupt(&mut self, pattern: &Pattern) -> Result<Corruption, GenerateError> {
        let len = pattern.len();
        if len < 3 {
            return Err(GenerateError::TooShortToCorrupt(len));
        }

        let position = self.rng.gen_range(1..=len - 2);
        let original = pattern.notes[position];

        let letter_index = LETTERS
            .iter()
            .position(|&l| l == original.pitch().letter())
            .unwrap_or_default() as isize;
        let distance = self.rng.gen_range(1..=2);
        let shift = if self.rng.gen_bool(0.5) { distance } else { -distance };
        let letter = LETTERS[(letter_index + shift).rem_euclid(LETTERS.len() as isize) as usize];

        let replacement = original.with_letter(letter).unwrap_or(original);
        let mut notes = pattern.notes.clone();
        notes[position] = replacement;

        debug!(position, %original, %replacement, "corrupted melody");
        Ok(Corruption {
            pattern: Pattern::new(PatternKind::CorruptedReference, notes),
            position,
            original,
            replacement,
        })
    }

    /// Random pick among the unlocked contour kinds.
    pub fn choose_kind(&mut self, unlocked: &[PatternKind]) -> Result<PatternKind, GenerateError> {
        let contours: Vec<PatternKind> = unlocked
            .iter()
            .copied()
            .filter(|k| k.is_contour())
            .collect();
        contours
            .choose(&mut self.rng)
            .copied()
            .ok_or(GenerateError::NothingUnlocked)
    }

    /// Memory-game sequence: no note directly repeats the previous one.
    pub fn choose_memory_sequence(
        &mut self,
        palette: &Palette,
        length: usize,
    ) -> Result<Vec<NoteToken>, GenerateError> {
        if length == 0 {
            return Err(GenerateError::ZeroLength);
        }

        let len = palette.len();
        let mut previous = self.rng.gen_range(0..len);
        let mut notes = vec![palette.clamped(previous as isize)];

        while notes.len() < length {
            let next = if len > 1 {
                let pick = self.rng.gen_range(0..len - 1);
                if pick >= previous {
                    pick + 1
                } else {
                    pick
                }
            } else {
                0
            };
            notes.push(palette.clamped(next as isize));
            previous = next;
        }
        Ok(notes)
    }

    /// Uniform pick from a palette.
    pub fn pick(&mut self, palette: &Palette) -> NoteToken {
        palette.clamped(self.rng.gen_range(0..palette.len()) as isize)
    }

    /// Uniform pick from the notes of `palette` that do not share a pitch with
    /// `excluded`. Falls back to any note when nothing else is left.
    pub fn pick_excluding(&mut self, palette: &Palette, excluded: &NoteToken) -> NoteToken {
        let candidates: Vec<NoteToken> = palette
            .notes()
            .iter()
            .copied()
            .filter(|n| !n.same_pitch(excluded))
            .collect();
        match candidates.choose(&mut self.rng) {
            Some(note) => *note,
            None => self.pick(palette),
        }
    }

    /// Bernoulli trial with probability `p`.
    pub fn coin(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::note::parse_sequence;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn generator(seed: u64) -> PatternGenerator<StdRng> {
        PatternGenerator::new(StdRng::seed_from_u64(seed))
    }

    fn positions(palette: &Palette, pattern: &Pattern) -> Vec<usize> {
        pattern
            .notes
            .iter()
            .map(|n| palette.position_of(n).unwrap())
            .collect()
    }

    #[test]
    fn test_up_start_stays_in_lower_two_thirds() {
        let palette = Palette::melody();
        let mut gen = generator(1);
        for _ in 0..200 {
            let pattern = gen.generate_up(&palette);
            let pos = positions(&palette, &pattern);
            assert!(pos[0] <= 14, "start {} too high", pos[0]);
            assert_eq!(pattern.kind, PatternKind::Up);
        }
    }

    #[test]
    fn test_down_start_range_matches_palette_upper_half() {
        let palette = Palette::melody();
        let mut gen = generator(2);
        for _ in 0..200 {
            let pos = positions(&palette, &gen.generate_down(&palette));
            assert!((11..=20).contains(&pos[0]), "start {}", pos[0]);
        }
    }

    #[test]
    fn test_down_clamps_on_tiny_palette() {
        let palette = Palette::new(parse_sequence("C4 D4 E4").unwrap()).unwrap();
        let pattern = generator(3).generate_down(&palette);
        assert_eq!(pattern.len(), CONTOUR_LENGTH);
        assert_eq!(pattern.notes[4].to_string(), "C4");
    }

    #[test]
    fn test_up_never_overruns_short_palette() {
        let palette = Palette::new(parse_sequence("C4 D4 E4").unwrap()).unwrap();
        let pattern = generator(4).generate_up(&palette);
        assert_eq!(pattern.notes.last().unwrap().to_string(), "E4");
    }

    #[test]
    fn test_wave_on_two_note_palette() {
        let palette = Palette::new(parse_sequence("C4 D4").unwrap()).unwrap();
        let mut gen = generator(5);
        for _ in 0..50 {
            let pattern = gen.generate_wave(&palette).unwrap();
            assert_ne!(pattern.notes[0], pattern.notes[1]);
        }
    }

    #[test]
    fn test_wave_rejects_single_note_palette() {
        let palette = Palette::new(parse_sequence("C4").unwrap()).unwrap();
        assert!(matches!(
            generator(6).generate_wave(&palette),
            Err(GenerateError::PaletteTooSmall { .. })
        ));
    }

    #[test]
    fn test_jump_degrades_on_tiny_palette() {
        let palette = Palette::new(parse_sequence("C4 D4 E4").unwrap()).unwrap();
        let pattern = generator(7).generate_jump(&palette);
        assert_eq!(pattern.len(), CONTOUR_LENGTH);
    }

    #[test]
    fn test_generate_rejects_reference_kinds() {
        let palette = Palette::melody();
        assert_eq!(
            generator(8).generate(PatternKind::Reference, &palette),
            Err(GenerateError::NotAContour(PatternKind::Reference))
        );
    }

    #[test]
    fn test_reference_walk_steps_at_most_two() {
        let palette = Palette::drawing();
        let mut gen = generator(9);
        for _ in 0..100 {
            let pattern = gen.generate_reference(&palette, 6).unwrap();
            let pos = positions(&palette, &pattern);
            assert_eq!(pos.len(), 6);
            assert!((2..=9).contains(&pos[0]));
            assert!(pos.windows(2).all(|w| w[0].abs_diff(w[1]) <= 2));
        }
        assert_eq!(
            gen.generate_reference(&palette, 0),
            Err(GenerateError::ZeroLength)
        );
    }

    #[test]
    fn test_corrupt_keeps_octave_and_duration() {
        let melody = Pattern::new(
            PatternKind::Reference,
            parse_sequence("C4 C4 G4 G4:h A4 A4 G4:h").unwrap(),
        );
        let mut gen = generator(10);
        for _ in 0..100 {
            let c = gen.corrupt(&melody).unwrap();
            assert!(c.was_corrupted());
            assert!((1..=5).contains(&c.position));
            assert_eq!(c.replacement.octave(), c.original.octave());
            assert_eq!(c.replacement.duration(), c.original.duration());
            assert_ne!(c.replacement.pitch().letter(), c.original.pitch().letter());
            assert_eq!(c.pattern.kind, PatternKind::CorruptedReference);
        }
    }

    #[test]
    fn test_corrupt_rejects_short_patterns() {
        let short = Pattern::new(PatternKind::Reference, parse_sequence("C4 D4").unwrap());
        assert_eq!(
            generator(11).corrupt(&short),
            Err(GenerateError::TooShortToCorrupt(2))
        );
    }

    #[test]
    fn test_choose_kind_only_returns_unlocked() {
        let mut gen = generator(12);
        for _ in 0..50 {
            let kind = gen
                .choose_kind(&[PatternKind::Up, PatternKind::Down])
                .unwrap();
            assert!(matches!(kind, PatternKind::Up | PatternKind::Down));
        }
        assert_eq!(gen.choose_kind(&[]), Err(GenerateError::NothingUnlocked));
    }

    #[test]
    fn test_memory_sequence_has_no_direct_repeats() {
        let palette = Palette::memory();
        let mut gen = generator(13);
        for length in 2..=6 {
            let seq = gen.choose_memory_sequence(&palette, length).unwrap();
            assert_eq!(seq.len(), length);
            assert!(seq.windows(2).all(|w| w[0] != w[1]));
        }
    }

    #[test]
    fn test_pick_excluding_skips_pitch() {
        let palette = Palette::chromatic("B4".parse().unwrap(), "C5".parse().unwrap()).unwrap();
        let c5: NoteToken = "C5".parse().unwrap();
        let mut gen = generator(14);
        for _ in 0..20 {
            assert_eq!(gen.pick_excluding(&palette, &c5).to_string(), "B4");
        }
    }
}
