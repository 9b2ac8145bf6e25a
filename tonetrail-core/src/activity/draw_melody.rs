//! "Draw a melody": a freehand line becomes a melody, higher on the canvas
//! meaning higher in pitch. In challenge mode the line should follow the
//! contour of a reference melody.

use super::RoundPhase;
use crate::types::{NoteToken, Palette, Pattern};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Canvas coordinates; `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawState {
    pub phase: RoundPhase,
    pub challenge: bool,
    pub reference: Option<Pattern>,
    pub last_drawing: Vec<NoteToken>,
}

/// Take at most `max` points, evenly spaced through the path.
pub fn sample_points(points: &[DrawPoint], max: usize) -> Vec<DrawPoint> {
    let count = points.len().min(max);
    if count == 0 {
        return Vec::new();
    }
    let step = points.len() / count;
    (0..count).map(|i| points[i * step]).collect()
}

/// Map sampled heights onto `palette`, bottom of the canvas to the lowest note.
pub fn points_to_notes(points: &[DrawPoint], height: f32, palette: &Palette) -> Vec<NoteToken> {
    let len = palette.len();
    points
        .iter()
        .map(|point| {
            let relative = if height > 0.0 {
                1.0 - point.y / height
            } else {
                0.0
            };
            let index = (relative * len as f32).floor() as isize;
            palette.clamped(index.min(len as isize - 1))
        })
        .collect()
}

/// Direction of each melodic step.
pub fn contour(notes: &[NoteToken]) -> Vec<Ordering> {
    notes
        .windows(2)
        .map(|pair| pair[1].compare_pitch(&pair[0]))
        .collect()
}

/// A drawing matches when at least two thirds of the reference's steps move
/// in the same direction as the drawing's.
pub fn follows_contour(drawn: &[NoteToken], reference: &[NoteToken]) -> bool {
    let expected = contour(reference);
    if expected.is_empty() {
        return !drawn.is_empty();
    }
    let actual = contour(drawn);
    let matched = expected
        .iter()
        .zip(actual.iter())
        .filter(|(a, b)| a == b)
        .count();
    matched * 3 >= expected.len() * 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::note::{parse_sequence, render_sequence};

    fn line(ys: &[f32]) -> Vec<DrawPoint> {
        ys.iter()
            .enumerate()
            .map(|(i, &y)| DrawPoint { x: i as f32, y })
            .collect()
    }

    #[test]
    fn test_sampling_caps_points() {
        let path = line(&[0.0; 20]);
        let sampled = sample_points(&path, 8);
        assert_eq!(sampled.len(), 8);
        assert_eq!(sampled[1].x, 2.0);
        assert_eq!(sample_points(&path[..3], 8).len(), 3);
        assert!(sample_points(&[], 8).is_empty());
    }

    #[test]
    fn test_height_mapping_is_inverted() {
        let palette = Palette::drawing();
        let notes = points_to_notes(&line(&[100.0, 50.0, 0.0, 120.0]), 100.0, &palette);
        assert_eq!(render_sequence(&notes), "C3 B3 G4 C3");
    }

    #[test]
    fn test_contour_agreement() {
        let reference = parse_sequence("C4 D4 E4 D4 C4 D4").unwrap();
        let exact = parse_sequence("C3 E3 G3 F3 D3 E3").unwrap();
        assert!(follows_contour(&exact, &reference));

        let one_off = parse_sequence("C3 E3 G3 A3 D3 E3").unwrap();
        assert!(follows_contour(&one_off, &reference));

        let flat = parse_sequence("C3 C3 C3 C3 C3 C3").unwrap();
        assert!(!follows_contour(&flat, &reference));
        assert!(!follows_contour(&[], &reference));
    }
}
