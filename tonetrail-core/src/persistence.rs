//! Persisted game state over an abstract key-value store.
//!
//! The store only moves strings; the record layout lives here.

use crate::difficulty::Progress;
use crate::types::PatternKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub const PROGRESS_KEY: &str = "tonetrail.progress";
pub const DIFFICULTY_KEY: &str = "tonetrail.difficulty";

pub trait KeyValueStore: Send {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str) {
        self.save(key, "");
    }
}

/// Matching-activity unlock state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DifficultyRecord {
    pub correct_answers_count: u32,
    pub unlocked_patterns: Vec<PatternKind>,
}

impl Default for DifficultyRecord {
    fn default() -> Self {
        Self {
            correct_answers_count: 0,
            unlocked_patterns: vec![PatternKind::Up, PatternKind::Down],
        }
    }
}

/// In-memory store; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, key: &str, value: &str) -> Self {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
        self
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn save(&mut self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&mut self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

/// Typed access to the game's records.
pub struct ProgressStore {
    store: Box<dyn KeyValueStore>,
}

impl ProgressStore {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Missing or unreadable records come back as defaults.
    fn load_record<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let Some(text) = self.store.load(key) else {
            debug!(key, "no stored record, using defaults");
            return T::default();
        };
        if text.trim().is_empty() {
            return T::default();
        }
        match serde_json::from_str(&text) {
            Ok(record) => record,
            Err(e) => {
                warn!(key, error = %e, "stored record is corrupt, starting from defaults");
                T::default()
            }
        }
    }

    fn save_record<T: Serialize>(&mut self, key: &str, record: &T) {
        match serde_json::to_string(record) {
            Ok(text) => self.store.save(key, &text),
            Err(e) => warn!(key, error = %e, "could not serialize record"),
        }
    }

    pub fn load_progress(&self) -> Progress {
        self.load_record(PROGRESS_KEY)
    }

    pub fn save_progress(&mut self, progress: &Progress) {
        self.save_record(PROGRESS_KEY, progress);
    }

    pub fn load_difficulty(&self) -> DifficultyRecord {
        self.load_record(DIFFICULTY_KEY)
    }

    pub fn save_difficulty(&mut self, record: &DifficultyRecord) {
        self.save_record(DIFFICULTY_KEY, record);
    }

    pub fn clear(&mut self) {
        self.store.remove(PROGRESS_KEY);
        self.store.remove(DIFFICULTY_KEY);
    }
}
