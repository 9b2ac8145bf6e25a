use crossbeam_channel::Sender;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

/// Watches melody files and forwards notify events to a channel.
///
/// Editors often save by replacing the file, which ends a watch on the file
/// itself, so the parent directory is watched and events are filtered down
/// to the files asked for.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    files: Vec<PathBuf>,
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

impl FileWatcher {
    /// Create a new file watcher that sends events to the provided channel
    pub fn new(tx: Sender<notify::Result<Event>>) -> notify::Result<Self> {
        let watcher = notify::recommended_watcher(move |res| {
            // The receiver is gone once the REPL exits
            let _ = tx.send(res);
        })?;

        Ok(Self {
            watcher,
            files: Vec::new(),
        })
    }

    pub fn watch<P: AsRef<Path>>(&mut self, path: P) -> notify::Result<()> {
        let file = normalize(path.as_ref());
        if !file.is_file() {
            return Err(notify::Error::path_not_found().add_path(file));
        }
        if self.files.contains(&file) {
            return Ok(());
        }
        let dir = file.parent().unwrap_or(Path::new("/")).to_path_buf();
        if !self.files.iter().any(|f| f.parent() == Some(dir.as_path())) {
            self.watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        }
        self.files.push(file);
        Ok(())
    }

    pub fn watched(&self) -> &[PathBuf] {
        &self.files
    }

    /// Watched files touched by a write or creation.
    pub fn changed_files(&self, event: &Event) -> Vec<PathBuf> {
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return Vec::new();
        }
        let mut changed: Vec<PathBuf> = event
            .paths
            .iter()
            .map(|p| normalize(p))
            .filter(|p| self.files.contains(p))
            .collect();
        changed.dedup();
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    #[test]
    fn test_only_watched_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let songs = dir.path().join("songs.toml");
        let other = dir.path().join("other.toml");
        std::fs::write(&songs, "").unwrap();
        std::fs::write(&other, "").unwrap();

        let (tx, _rx) = unbounded();
        let mut watcher = FileWatcher::new(tx).unwrap();
        watcher.watch(&songs).unwrap();
        watcher.watch(&songs).unwrap();
        assert_eq!(watcher.watched().len(), 1);

        let modify = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(normalize(&songs))
            .add_path(normalize(&other));
        assert_eq!(watcher.changed_files(&modify), vec![normalize(&songs)]);

        let create = Event::new(EventKind::Create(CreateKind::File)).add_path(normalize(&songs));
        assert_eq!(watcher.changed_files(&create).len(), 1);

        let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(normalize(&songs));
        assert!(watcher.changed_files(&access).is_empty());
    }

    #[test]
    fn test_missing_file_cannot_be_watched() {
        let (tx, _rx) = unbounded();
        let mut watcher = FileWatcher::new(tx).unwrap();
        assert!(watcher.watch("/definitely/not/here.toml").is_err());
    }
}
