//! Progress records on disk, one JSON file per key.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tonetrail_core::persistence::KeyValueStore;
use tracing::{debug, warn};

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) the data directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read record");
                None
            }
        }
    }

    fn save(&mut self, key: &str, value: &str) {
        let path = self.path_for(key);
        // Write then rename, so a crash never leaves half a record behind.
        let tmp = path.with_extension("json.tmp");
        let result = fs::write(&tmp, value).and_then(|_| fs::rename(&tmp, &path));
        match result {
            Ok(()) => debug!(path = %path.display(), "record saved"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to save record"),
        }
    }

    fn remove(&mut self, key: &str) {
        let path = self.path_for(key);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "failed to remove record");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonetrail_core::difficulty::Progress;
    use tonetrail_core::persistence::{ProgressStore, PROGRESS_KEY};

    #[test]
    fn test_missing_key_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.load(PROGRESS_KEY), None);
    }

    #[test]
    fn test_save_load_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path().join("nested")).unwrap();

        store.save(PROGRESS_KEY, "{\"high-or-low\":3}");
        assert!(dir.path().join("nested/tonetrail.progress.json").exists());
        assert_eq!(store.load(PROGRESS_KEY).as_deref(), Some("{\"high-or-low\":3}"));

        store.remove(PROGRESS_KEY);
        assert_eq!(store.load(PROGRESS_KEY), None);
        store.remove(PROGRESS_KEY);
    }

    #[test]
    fn test_keys_cannot_escape_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.path_for("../evil/key"), dir.path().join(".._evil_key.json"));
    }

    #[test]
    fn test_progress_survives_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let progress = Progress {
            memory_game: 4,
            ..Progress::default()
        };
        {
            let mut records = ProgressStore::new(Box::new(FileStore::open(dir.path()).unwrap()));
            records.save_progress(&progress);
        }
        let records = ProgressStore::new(Box::new(FileStore::open(dir.path()).unwrap()));
        assert_eq!(records.load_progress(), progress);
    }
}
