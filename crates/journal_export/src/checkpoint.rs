use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::error::ExportError;

/// Last stream position acknowledged downstream, exactly as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub cursor: String,
}

/// Durable store for the journal cursor.
///
/// Saves go to a process-unique sibling path first and are renamed onto the
/// canonical path, so a concurrent reader (or a crash mid-write) never
/// observes a torn file and at most one checkpoint file exists at the
/// canonical path.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let tmp_path = tmp_path_for(&path);
        Self { path, tmp_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted cursor. Absence, unreadability, and corruption
    /// all degrade to `None`: starting over only costs re-delivery.
    pub async fn load(&self) -> Option<Checkpoint> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(path = ?self.path, error = %err, "no readable checkpoint, starting from stream head");
                return None;
            }
        };
        match serde_json::from_slice::<Checkpoint>(&bytes) {
            Ok(checkpoint) => Some(checkpoint),
            Err(err) => {
                debug!(path = ?self.path, error = %err, "unparseable checkpoint, starting from stream head");
                None
            }
        }
    }

    /// Persists `cursor` atomically. The caller decides whether a failure
    /// matters; the stream driver logs and keeps going.
    pub async fn save(&self, cursor: &str) -> Result<(), ExportError> {
        let checkpoint = Checkpoint {
            cursor: cursor.to_string(),
        };
        let bytes =
            serde_json::to_vec(&checkpoint).expect("a string-keyed JSON struct always serializes");
        fs::write(&self.tmp_path, &bytes)
            .await
            .map_err(|source| ExportError::CheckpointWrite {
                path: self.tmp_path.clone(),
                source,
            })?;
        fs::rename(&self.tmp_path, &self.path)
            .await
            .map_err(|source| ExportError::CheckpointWrite {
                path: self.path.clone(),
                source,
            })
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".new.{}", std::process::id()));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("cursor"));

        store.save("s=abc;i=1").await.unwrap();

        // A fresh store simulates a restart.
        let restarted = CheckpointStore::new(dir.path().join("cursor"));
        let loaded = restarted.load().await.expect("checkpoint persisted");
        assert_eq!(loaded.cursor, "s=abc;i=1");
    }

    #[tokio::test]
    async fn missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("cursor"));
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn corrupt_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor");

        tokio::fs::write(&path, b"").await.unwrap();
        assert!(CheckpointStore::new(&path).load().await.is_none());

        tokio::fs::write(&path, b"{cursor: oops").await.unwrap();
        assert!(CheckpointStore::new(&path).load().await.is_none());
    }

    #[tokio::test]
    async fn save_replaces_previous_value_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("cursor"));

        store.save("first").await.unwrap();
        store.save("second").await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.cursor, "second");

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name());
        }
        assert_eq!(names.len(), 1, "only the canonical file remains: {names:?}");
    }

    #[tokio::test]
    async fn save_into_missing_directory_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("gone").join("cursor"));
        let err = store.save("abc").await.unwrap_err();
        assert!(matches!(err, ExportError::CheckpointWrite { .. }));
    }

    #[test]
    fn checkpoint_serializes_to_the_wire_shape() {
        let checkpoint = Checkpoint {
            cursor: "abc".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&checkpoint).unwrap(),
            r#"{"cursor":"abc"}"#
        );
    }
}
