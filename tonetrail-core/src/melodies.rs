//! Well-known melodies for the sound-judgment activity.

use crate::messages::Language;
use crate::scheduler::{from_durations, PlaybackStep};
use crate::types::note::parse_sequence;
use crate::types::{NoteToken, Pattern, PatternKind};
use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Resample budget when avoiding a repeat of the previous melody.
pub const MAX_PICK_ATTEMPTS: usize = 10;

/// Melody as written in a catalog file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MelodyDefinition {
    pub id: String,
    pub en: String,
    #[serde(default)]
    pub de: Option<String>,
    #[serde(default)]
    pub quarter_ms: Option<u64>,
    /// Space separated note tokens
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Melody {
    pub id: String,
    name_en: String,
    name_de: Option<String>,
    pub quarter_ms: u64,
    pub notes: Vec<NoteToken>,
}

impl Melody {
    pub fn name(&self, language: Language) -> &str {
        match language {
            Language::German => self.name_de.as_deref().unwrap_or(&self.name_en),
            Language::English => &self.name_en,
        }
    }

    pub fn steps(&self) -> Vec<PlaybackStep> {
        from_durations(&self.notes, self.quarter_ms)
    }

    pub fn pattern(&self) -> Pattern {
        Pattern::new(PatternKind::Reference, self.notes.clone())
    }
}

const BUILTIN: [(&str, &str, &str, u64, &str); 9] = [
    (
        "twinkle",
        "Twinkle, Twinkle, Little Star",
        "Funkel, funkel, kleiner Stern",
        500,
        "C C4 G4 G4 A4 A4 G4:h F4 F4 E4 E4 D4 D4 C4:h",
    ),
    (
        "jingle",
        "Jingle Bells",
        "Jingle Bells",
        450,
        "E E4 E4:h E4 E4 E4:h E4 G4 C4 D4 E4:h",
    ),
    (
        "happy",
        "Happy Birthday",
        "Alles Gute zum Geburtstag",
        600,
        "G3:e G3:e A3:q G3:q C4:q B3:h G3:e G3:e A3:q G3:q D4:q C4:h",
    ),
    (
        "happy-birthday",
        "Happy Birthday To You",
        "Zum Geburtstag viel Glück",
        600,
        "C:e C4:e D4:q C4:q F4:q E4:h C4:e C4:e D4:q C4:q G4:q F4:h",
    ),
    (
        "frere-jacques",
        "Brother John (Frère Jacques)",
        "Bruder Jakob",
        500,
        "C D4 E4 C4 C4 D4 E4 C4 E4 F4 G4:h E4 F4 G4:h",
    ),
    (
        "are-you-sleeping",
        "Are You Sleeping?",
        "Schlaf, Kindlein, schlaf",
        550,
        "C D4 E4 C4 C4 D4 E4 C4 E4 F4 G4:h E4 F4 G4:h",
    ),
    (
        "little-hans",
        "Little Hans",
        "Hänschen klein",
        550,
        "G E4 E4:h A4 D4 D4:h C4 D4 E4 F4 G4 G4 G4:h",
    ),
    (
        "all-my-little-ducklings",
        "All My Little Ducklings",
        "Alle meine Entchen",
        550,
        "C D4 E4 F4 G4:h G4:h A A A A G:h",
    ),
    (
        "old-mcdonald",
        "Old McDonald Had a Farm",
        "Old MacDonald hat ne Farm",
        500,
        "F F4 C4 C4 D4 D4 C4:h A4 A4 G4 G4 F4:h",
    ),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MelodyCatalog {
    melodies: Vec<Melody>,
}

impl MelodyCatalog {
    pub fn builtin() -> Self {
        let definitions = BUILTIN
            .iter()
            .map(|(id, en, de, quarter, notes)| MelodyDefinition {
                id: id.to_string(),
                en: en.to_string(),
                de: Some(de.to_string()),
                quarter_ms: Some(*quarter),
                notes: notes.to_string(),
            })
            .collect();
        Self::from_definitions(definitions, 700)
    }

    /// Build a catalog, dropping (and logging) melodies whose notes do not
    /// parse. One bad melody never takes the others down with it.
    pub fn from_definitions(definitions: Vec<MelodyDefinition>, default_quarter_ms: u64) -> Self {
        let melodies = definitions
            .into_iter()
            .filter_map(|def| match parse_sequence(&def.notes) {
                Ok(notes) if notes.is_empty() => {
                    warn!(id = %def.id, "melody has no notes, skipping");
                    None
                }
                Ok(notes) => Some(Melody {
                    id: def.id,
                    name_en: def.en,
                    name_de: def.de,
                    quarter_ms: def.quarter_ms.unwrap_or(default_quarter_ms),
                    notes,
                }),
                Err(e) => {
                    warn!(id = %def.id, error = %e, "melody has a malformed note, skipping");
                    None
                }
            })
            .collect::<Vec<_>>();
        debug!(count = melodies.len(), "melody catalog ready");
        Self { melodies }
    }

    /// Parse a JSON array of definitions.
    pub fn from_json(text: &str, default_quarter_ms: u64) -> Result<Self> {
        let definitions: Vec<MelodyDefinition> =
            serde_json::from_str(text).context("Failed to parse melody definitions")?;
        Ok(Self::from_definitions(definitions, default_quarter_ms))
    }

    pub fn len(&self) -> usize {
        self.melodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.melodies.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Melody> {
        self.melodies.iter().find(|m| m.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Melody> {
        self.melodies.iter()
    }

    /// Random melody, avoiding `previous` when the catalog allows it.
    pub fn choose_next<R: Rng>(&self, rng: &mut R, previous: Option<&str>) -> Option<&Melody> {
        let len = self.melodies.len();
        if len == 0 {
            return None;
        }

        let is_previous = |index: usize| previous == Some(self.melodies[index].id.as_str());
        let mut index = rng.gen_range(0..len);
        for _ in 0..MAX_PICK_ATTEMPTS {
            if !is_previous(index) {
                break;
            }
            index = rng.gen_range(0..len);
        }
        if is_previous(index) {
            index = (index + 1) % len;
        }
        self.melodies.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_builtin_catalog_parses_completely() {
        let catalog = MelodyCatalog::builtin();
        assert_eq!(catalog.len(), 9);

        let twinkle = catalog.get("twinkle").unwrap();
        assert_eq!(twinkle.notes.len(), 14);
        assert_eq!(twinkle.notes[0].to_string(), "C4");
        assert_eq!(twinkle.name(Language::German), "Funkel, funkel, kleiner Stern");

        let durations: Vec<u64> = twinkle.steps().iter().map(|s| s.duration_ms).take(7).collect();
        assert_eq!(durations, vec![500, 500, 500, 500, 500, 500, 1000]);
    }

    #[test]
    fn test_bad_melody_is_skipped() {
        let defs = vec![
            MelodyDefinition {
                id: "broken".into(),
                en: "Broken".into(),
                de: None,
                quarter_ms: None,
                notes: "C4 H4 E4".into(),
            },
            MelodyDefinition {
                id: "fine".into(),
                en: "Fine".into(),
                de: None,
                quarter_ms: None,
                notes: "C4 D4 E4".into(),
            },
        ];
        let catalog = MelodyCatalog::from_definitions(defs, 700);
        assert_eq!(catalog.len(), 1);
        let fine = catalog.get("fine").unwrap();
        assert_eq!(fine.quarter_ms, 700);
        assert_eq!(fine.name(Language::German), "Fine");
    }

    #[test]
    fn test_from_json() {
        let json = r#"[{"id": "scale", "en": "Scale", "notes": "C4 D4 E4:h"}]"#;
        let catalog = MelodyCatalog::from_json(json, 600).unwrap();
        assert_eq!(catalog.get("scale").unwrap().steps()[2].duration_ms, 1200);
        assert!(MelodyCatalog::from_json("not json", 600).is_err());
    }

    #[test]
    fn test_choose_next_avoids_previous() {
        let catalog = MelodyCatalog::builtin();
        let mut rng = StdRng::seed_from_u64(3);
        let mut previous = String::from("twinkle");
        for _ in 0..100 {
            let next = catalog.choose_next(&mut rng, Some(&previous)).unwrap();
            assert_ne!(next.id, previous);
            previous = next.id.clone();
        }
    }

    #[test]
    fn test_single_melody_catalog_repeats() {
        let json = r#"[{"id": "only", "en": "Only", "notes": "C4 D4 E4"}]"#;
        let catalog = MelodyCatalog::from_json(json, 600).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(catalog.choose_next(&mut rng, Some("only")).unwrap().id, "only");
        assert!(MelodyCatalog::default().choose_next(&mut rng, None).is_none());
    }
}
