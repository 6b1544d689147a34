use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use super::resolve;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Remote identity and last-uploaded fingerprint of one tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: String,
    pub hash: String,
}

/// Persisted mapping between local paths and remote objects. Keys are
/// canonical absolute paths; `folders` holds remote folder ids, `files`
/// holds per-file entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingData {
    #[serde(default)]
    pub folders: BTreeMap<PathBuf, String>,
    #[serde(default)]
    pub files: BTreeMap<PathBuf, FileEntry>,
}

/// Tracking store backed by a single JSON snapshot on disk. The in-memory
/// state is authoritative; every mutation rewrites the snapshot atomically
/// and a failed write only logs a warning.
pub struct TrackingStore {
    path: PathBuf,
    data: Mutex<TrackingData>,
}

impl TrackingStore {
    /// Opens the store at `path`, creating parent directories as needed.
    /// A missing or unreadable snapshot starts the store empty.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, TrackingError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = load_or_default(&path).await;
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub async fn folder_id(&self, path: &Path) -> Option<String> {
        self.data.lock().await.folders.get(path).cloned()
    }

    pub async fn insert_folder(&self, path: PathBuf, folder_id: String) {
        let mut data = self.data.lock().await;
        data.folders.insert(path, folder_id);
        self.persist(&data).await;
    }

    pub async fn file_entry(&self, path: &Path) -> Option<FileEntry> {
        self.data.lock().await.files.get(path).cloned()
    }

    pub async fn record_file(&self, path: PathBuf, entry: FileEntry) {
        let mut data = self.data.lock().await;
        data.files.insert(path, entry);
        self.persist(&data).await;
    }

    /// Removes the entry for `path`, returning it when one was tracked.
    pub async fn remove_file(&self, path: &Path) -> Option<FileEntry> {
        let mut data = self.data.lock().await;
        let removed = data.files.remove(path)?;
        self.persist(&data).await;
        Some(removed)
    }

    /// Moves the entry at `old` to the `new` key, keeping id and hash.
    pub async fn rekey_file(&self, old: &Path, new: PathBuf) -> bool {
        let mut data = self.data.lock().await;
        let Some(entry) = data.files.remove(old) else {
            return false;
        };
        data.files.insert(new, entry);
        self.persist(&data).await;
        true
    }

    /// Resolves the most specific registered folder containing `path`.
    pub async fn find_root_folder(&self, path: &Path) -> Option<(PathBuf, String)> {
        let data = self.data.lock().await;
        resolve::find_root_folder(&data.folders, path)
            .map(|(root, id)| (root.to_path_buf(), id.to_string()))
    }

    /// Rewrites the snapshot from current in-memory state.
    pub async fn save(&self) -> Result<(), TrackingError> {
        let data = self.data.lock().await;
        write_snapshot(&self.path, &data).await
    }

    /// Drops all tracked state and persists the empty snapshot.
    pub async fn reset(&self) -> Result<(), TrackingError> {
        let mut data = self.data.lock().await;
        data.folders.clear();
        data.files.clear();
        write_snapshot(&self.path, &data).await
    }

    pub async fn snapshot(&self) -> TrackingData {
        self.data.lock().await.clone()
    }

    async fn persist(&self, data: &TrackingData) {
        if let Err(err) = write_snapshot(&self.path, data).await {
            warn!(
                "failed to persist tracking data at {}: {err}",
                self.path.display()
            );
        }
    }
}

async fn load_or_default(path: &Path) -> TrackingData {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return TrackingData::default(),
        Err(err) => {
            warn!("failed to read tracking data at {}: {err}", path.display());
            return TrackingData::default();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(data) => data,
        Err(err) => {
            warn!(
                "tracking data at {} is corrupt, starting empty: {err}",
                path.display()
            );
            TrackingData::default()
        }
    }
}

/// Writes the snapshot to a sibling partial file, syncs it, then renames it
/// over the target so a crash mid-write never clobbers the previous state.
async fn write_snapshot(path: &Path, data: &TrackingData) -> Result<(), TrackingError> {
    let bytes = serde_json::to_vec_pretty(data)?;
    let partial = partial_path(path);
    let mut file = tokio::fs::File::create(&partial).await?;
    file.write_all(&bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&partial, path).await?;
    Ok(())
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}
