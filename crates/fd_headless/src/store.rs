//! Directory-backed snapshot storage.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use fd_core::snapshot::SnapshotStore;
use thiserror::Error;

/// File extension of stored snapshots.
pub const SNAPSHOT_EXTENSION: &str = "snap";

/// Error type for snapshot storage.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("Snapshot store IO error: {0}")]
    Io(#[from] io::Error),
    /// Names must be a single non-empty path component.
    #[error("Invalid snapshot name: {0:?}")]
    InvalidName(String),
}

/// [`SnapshotStore`] keeping one `<name>.snap` file per entry in a directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory the store writes to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(format!("{name}.{SNAPSHOT_EXTENSION}")))
    }
}

impl SnapshotStore for FileSnapshotStore {
    type Error = StoreError;

    fn put(&mut self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        // Write then rename so readers never see a partial file.
        let staging = path.with_extension(format!("{SNAPSHOT_EXTENSION}.tmp"));
        fs::write(&staging, bytes)?;
        fs::rename(&staging, &path)?;
        tracing::debug!(name, bytes = bytes.len(), path = %path.display(), "Snapshot stored");
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn names(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fd_core::snapshot::WorldSnapshot;
    use fd_test_utils::fixtures::standard_engine;

    #[test]
    fn test_put_get_and_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileSnapshotStore::open(dir.path().join("snaps")).unwrap();

        store.put("wave_2", &[2, 2]).unwrap();
        store.put("wave_1", &[1]).unwrap();
        store.put("wave_1", &[1, 1]).unwrap();

        assert_eq!(store.get("wave_1").unwrap(), Some(vec![1, 1]));
        assert_eq!(store.get("missing").unwrap(), None);
        assert_eq!(store.names().unwrap(), vec!["wave_1".to_string(), "wave_2".to_string()]);
    }

    #[test]
    fn test_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), b"hi").unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        assert!(store.names().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileSnapshotStore::open(dir.path()).unwrap();
        for name in ["", "..", "a/b", ".hidden"] {
            assert!(matches!(store.put(name, &[0]), Err(StoreError::InvalidName(_))));
        }
    }

    #[test]
    fn test_snapshot_survives_the_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileSnapshotStore::open(dir.path()).unwrap();
        let mut engine = standard_engine(12);
        engine.run(30);
        let snapshot = engine.make_snapshot();

        store.put("tick_30", &snapshot.encode().unwrap()).unwrap();
        let reopened = FileSnapshotStore::open(dir.path()).unwrap();
        let bytes = reopened.get("tick_30").unwrap().unwrap();
        assert_eq!(WorldSnapshot::decode(&bytes).unwrap(), snapshot);
    }
}
