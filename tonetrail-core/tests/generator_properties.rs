#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use tonetrail_core::difficulty::HighOrLowStage;
    use tonetrail_core::generator::PatternGenerator;
    use tonetrail_core::types::note::{MAX_OCTAVE, MIN_OCTAVE};
    use tonetrail_core::{DurationClass, NoteToken, Palette, PatternKind, PitchClass};

    const SEEDS: u64 = 200;

    fn positions(palette: &Palette, notes: &[NoteToken]) -> Vec<isize> {
        notes
            .iter()
            .map(|n| palette.position_of(n).expect("note outside palette") as isize)
            .collect()
    }

    #[test]
    fn test_every_token_round_trips() {
        for pitch in PitchClass::ALL {
            for octave in MIN_OCTAVE..=MAX_OCTAVE {
                for duration in DurationClass::ALL {
                    let token = NoteToken::new(pitch, octave, duration).unwrap();
                    let rendered = token.to_string();
                    assert_eq!(rendered.parse::<NoteToken>().unwrap(), token, "{}", rendered);
                }
            }
        }
    }

    #[test]
    fn test_up_and_down_move_one_step_per_note() {
        for palette in [Palette::melody(), Palette::drawing()] {
            for seed in 0..SEEDS {
                let mut gen = PatternGenerator::new(StdRng::seed_from_u64(seed));

                let up = positions(&palette, &gen.generate_up(&palette).notes);
                assert_eq!(up.len(), 5);
                assert!(up.windows(2).all(|w| w[1] - w[0] == 1), "up {:?}", up);

                let down = positions(&palette, &gen.generate_down(&palette).notes);
                assert_eq!(down.len(), 5);
                assert!(down.windows(2).all(|w| w[0] - w[1] == 1), "down {:?}", down);
            }
        }
    }

    #[test]
    fn test_wave_alternates_two_notes() {
        let palette = Palette::melody();
        for seed in 0..SEEDS {
            let mut gen = PatternGenerator::new(StdRng::seed_from_u64(seed));
            let wave = gen.generate_wave(&palette).unwrap();
            assert_eq!(wave.len(), 5);

            let distinct: HashSet<NoteToken> = wave.notes.iter().copied().collect();
            assert_eq!(distinct.len(), 2, "seed {}: {}", seed, wave);
            for (i, note) in wave.notes.iter().enumerate() {
                assert_eq!(*note, wave.notes[i % 2]);
            }
        }
    }

    #[test]
    fn test_jump_keeps_distance() {
        let palette = Palette::melody();
        for seed in 0..SEEDS {
            let mut gen = PatternGenerator::new(StdRng::seed_from_u64(seed));
            let jump = positions(&palette, &gen.generate_jump(&palette).notes);
            assert_eq!(jump.len(), 5);
            assert!(
                jump.windows(2).all(|w| (w[1] - w[0]).abs() >= 3),
                "seed {}: {:?}",
                seed,
                jump
            );
        }
    }

    #[test]
    fn test_corruption_changes_exactly_one_inner_note() {
        let palette = Palette::melody();
        for seed in 0..SEEDS {
            let mut gen = PatternGenerator::new(StdRng::seed_from_u64(seed));
            let reference = gen.generate_reference(&palette, 6).unwrap();
            let corruption = gen.corrupt(&reference).unwrap();

            let differing = reference.differences(&corruption.pattern);
            assert_eq!(differing, vec![corruption.position], "seed {}", seed);
            assert!((1..=4).contains(&corruption.position));
            assert_eq!(corruption.pattern.kind, PatternKind::CorruptedReference);
            assert_eq!(
                corruption.replacement.octave(),
                corruption.original.octave()
            );
        }
    }

    #[test]
    fn test_reference_walk_is_small_steps() {
        let palette = Palette::melody();
        for seed in 0..SEEDS {
            let mut gen = PatternGenerator::new(StdRng::seed_from_u64(seed));
            let reference = gen.generate_reference(&palette, 6).unwrap();
            assert_eq!(reference.len(), 6);
            let walk = positions(&palette, &reference.notes);
            assert!(walk.windows(2).all(|w| (w[1] - w[0]).abs() <= 2));
        }
    }

    #[test]
    fn test_memory_sequences_never_repeat_a_note() {
        let palette = Palette::memory();
        for seed in 0..SEEDS {
            let mut gen = PatternGenerator::new(StdRng::seed_from_u64(seed));
            for length in 2..=6 {
                let sequence = gen.choose_memory_sequence(&palette, length).unwrap();
                assert_eq!(sequence.len(), length);
                assert!(sequence.iter().all(|n| palette.position_of(n).is_some()));
                assert!(sequence.windows(2).all(|w| w[0] != w[1]));
            }
        }
    }

    #[test]
    fn test_choose_kind_only_returns_unlocked() {
        let unlocked = [PatternKind::Up, PatternKind::Down, PatternKind::Wave];
        let mut seen = HashSet::new();
        for seed in 0..SEEDS {
            let mut gen = PatternGenerator::new(StdRng::seed_from_u64(seed));
            let kind = gen.choose_kind(&unlocked).unwrap();
            assert!(unlocked.contains(&kind));
            seen.insert(kind);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_tone_pools_stay_apart_from_reference() {
        let reference = HighOrLowStage::reference_tone();
        for progress in [0, 10, 20, 30, 40] {
            let stage = HighOrLowStage::from_progress(progress);
            for note in stage.low_pool().notes() {
                assert!(note.midi_number() < reference.midi_number());
            }
            assert!(stage.high_pool().notes().iter().any(|n| n.midi_number() > reference.midi_number()));
        }
    }
}
