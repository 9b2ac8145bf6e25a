//! Melody catalog files
//!
//! ```toml
//! [[melody]]
//! id = "ode"
//! en = "Ode to Joy"
//! de = "Ode an die Freude"
//! quarter_ms = 500
//! notes = "E4 E4 F4 G4 G4 F4 E4 D4 C4 C4 D4 E4 E4:q D4:e D4:h"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tonetrail_core::melodies::{MelodyCatalog, MelodyDefinition};

#[derive(Debug, Deserialize)]
struct MelodyFile {
    #[serde(default)]
    melody: Vec<MelodyDefinition>,
}

/// Parse a catalog file. Melodies with bad notes are dropped by the
/// catalog; a file that is not valid TOML is an error.
pub fn parse_catalog(text: &str, default_quarter_ms: u64) -> Result<MelodyCatalog> {
    let file: MelodyFile = toml::from_str(text).context("Invalid melody file")?;
    Ok(MelodyCatalog::from_definitions(file.melody, default_quarter_ms))
}

pub fn load_catalog(path: &Path, default_quarter_ms: u64) -> Result<MelodyCatalog> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read melodies {}", path.display()))?;
    parse_catalog(&text, default_quarter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonetrail_core::Language;

    const SONGS: &str = r#"
        [[melody]]
        id = "ode"
        en = "Ode to Joy"
        de = "Ode an die Freude"
        quarter_ms = 500
        notes = "E4 E4 F4 G4 G4 F4 E4 D4"

        [[melody]]
        id = "scale"
        en = "Scale"
        notes = "C4 D4 E4 F4 G4:h"

        [[melody]]
        id = "broken"
        en = "Broken"
        notes = "C4 H4"
    "#;

    #[test]
    fn test_bad_melody_is_dropped() {
        let catalog = parse_catalog(SONGS, 700).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("broken").is_none());

        let scale = catalog.get("scale").unwrap();
        assert_eq!(scale.quarter_ms, 700);
        assert_eq!(scale.name(Language::German), "Scale");
        assert_eq!(catalog.get("ode").unwrap().name(Language::German), "Ode an die Freude");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(parse_catalog("[[melody]\nid = ", 700).is_err());
    }

    #[test]
    fn test_empty_file_is_an_empty_catalog() {
        assert!(parse_catalog("", 700).unwrap().is_empty());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("songs.toml");
        std::fs::write(&path, SONGS).unwrap();
        assert_eq!(load_catalog(&path, 700).unwrap().len(), 2);
    }
}
