use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use walkdir::WalkDir;

use drivesync_core::RemoteStore;

use super::hasher;
use super::hydrate::{Hydrator, NoopHydrator};
use super::resolve;
use super::tracking::{FileEntry, TrackingStore};

/// Retry delays for the two failure stages of a file sync. One retry total
/// per sync, shared between the stages; the retry restarts the whole
/// operation.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub read_retry_delay: Duration,
    pub remote_retry_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            read_retry_delay: Duration::from_millis(200),
            remote_retry_delay: Duration::from_millis(500),
        }
    }
}

/// What a single file sync did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Uploaded { file_id: String },
    /// Tracked fingerprint already matches the local content; no remote call.
    Unchanged,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Path vanished, is a directory, or cannot be resolved.
    NotAFile,
    /// Local content stayed unreadable after the retry.
    UnreadableContent,
    /// No registered folder contains the path.
    UntrackedLocation,
    /// The upload still failed after the retry.
    RemoteUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Entry dropped; the remote delete may still have failed.
    Deleted,
    Untracked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Remote object renamed in place and the entry re-keyed.
    Renamed,
    /// Destination sits under a different directory; the object was deleted
    /// remotely and uploaded fresh from the new location.
    Rehomed(SyncOutcome),
    Untracked,
}

/// Tally of one folder walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub folders_registered: usize,
    pub files_uploaded: usize,
    pub files_unchanged: usize,
    pub files_skipped: usize,
}

enum Attempt {
    Done(SyncOutcome),
    Retry { delay: Duration, give_up: SkipReason },
}

/// One-way sync of local paths to a remote store, keyed by the tracking
/// data. All operations resolve their outcome; remote trouble degrades to a
/// logged skip instead of an error so the event loop never stalls.
pub struct SyncEngine<R> {
    remote: R,
    tracking: TrackingStore,
    hydrator: Arc<dyn Hydrator>,
    config: EngineConfig,
}

impl<R: RemoteStore> SyncEngine<R> {
    pub fn new(remote: R, tracking: TrackingStore) -> Self {
        Self {
            remote,
            tracking,
            hydrator: Arc::new(NoopHydrator),
            config: EngineConfig::default(),
        }
    }

    pub fn with_hydrator(mut self, hydrator: Arc<dyn Hydrator>) -> Self {
        self.hydrator = hydrator;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tracking(&self) -> &TrackingStore {
        &self.tracking
    }

    /// Maps a local directory to a remote folder, creating the remote side
    /// when needed. Idempotent per path; returns `None` when the remote call
    /// fails, in which case nothing is recorded.
    pub async fn register_folder(
        &self,
        local_path: &Path,
        parent_id: Option<&str>,
    ) -> Option<String> {
        let path = match resolve::canonical_path(local_path) {
            Ok(path) => path,
            Err(err) => {
                warn!("cannot resolve {}: {err}", local_path.display());
                return None;
            }
        };
        if let Some(existing) = self.tracking.folder_id(&path).await {
            return Some(existing);
        }
        let name = base_name(&path);
        match self.remote.create_or_get_folder(&name, parent_id).await {
            Ok(folder_id) => {
                self.tracking.insert_folder(path, folder_id.clone()).await;
                Some(folder_id)
            }
            Err(err) => {
                warn!("failed to register folder {}: {err}", path.display());
                None
            }
        }
    }

    /// Uploads one file when its content differs from the tracked
    /// fingerprint. A failed read or upload is retried once, restarting from
    /// the existence check so a racing writer is observed fresh.
    pub async fn sync_file(&self, local_path: &Path) -> SyncOutcome {
        let path = match resolve::canonical_path(local_path) {
            Ok(path) => path,
            Err(err) => {
                warn!("cannot resolve {}: {err}", local_path.display());
                return SyncOutcome::Skipped(SkipReason::NotAFile);
            }
        };

        let mut retries_left = 1u32;
        loop {
            match self.sync_file_once(&path).await {
                Attempt::Done(outcome) => return outcome,
                Attempt::Retry { delay, give_up } => {
                    if retries_left == 0 {
                        return SyncOutcome::Skipped(give_up);
                    }
                    retries_left -= 1;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn sync_file_once(&self, path: &Path) -> Attempt {
        match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_dir() => {
                return Attempt::Done(SyncOutcome::Skipped(SkipReason::NotAFile));
            }
            Ok(_) => {}
            Err(_) => return Attempt::Done(SyncOutcome::Skipped(SkipReason::NotAFile)),
        }

        self.hydrator.hydrate(path).await;

        let fingerprint = match hasher::file_fingerprint(path).await {
            Ok(fingerprint) => fingerprint,
            Err(err) => {
                debug!("cannot read {}: {err}", path.display());
                return Attempt::Retry {
                    delay: self.config.read_retry_delay,
                    give_up: SkipReason::UnreadableContent,
                };
            }
        };

        if let Some(entry) = self.tracking.file_entry(path).await
            && entry.hash == fingerprint
        {
            return Attempt::Done(SyncOutcome::Unchanged);
        }

        let Some((_, parent_id)) = self.tracking.find_root_folder(path).await else {
            return Attempt::Done(SyncOutcome::Skipped(SkipReason::UntrackedLocation));
        };

        match self.remote.upload_or_update(path, &parent_id).await {
            Ok(file_id) => {
                self.tracking
                    .record_file(
                        path.to_path_buf(),
                        FileEntry {
                            id: file_id.clone(),
                            hash: fingerprint,
                        },
                    )
                    .await;
                Attempt::Done(SyncOutcome::Uploaded { file_id })
            }
            Err(err) => {
                debug!("upload failed for {}: {err}", path.display());
                Attempt::Retry {
                    delay: self.config.remote_retry_delay,
                    give_up: SkipReason::RemoteUnavailable,
                }
            }
        }
    }

    /// Drops the tracking entry for a removed local file. The remote delete
    /// is best-effort; the entry is removed and persisted regardless.
    pub async fn delete_file(&self, local_path: &Path) -> DeleteOutcome {
        let Ok(path) = resolve::canonical_path(local_path) else {
            return DeleteOutcome::Untracked;
        };
        let Some(entry) = self.tracking.file_entry(&path).await else {
            return DeleteOutcome::Untracked;
        };
        if let Err(err) = self.remote.delete_file(&entry.id).await {
            warn!("remote delete failed for {}: {err}", path.display());
        }
        self.tracking.remove_file(&path).await;
        DeleteOutcome::Deleted
    }

    /// Carries a tracked file to its new path. A rename within the same
    /// directory renames the remote object and re-keys the entry; a move
    /// across directories re-homes the file under the destination's folder.
    /// Remote failures are logged and the tracking state still moves
    /// forward.
    pub async fn move_file(&self, old_path: &Path, new_path: &Path) -> MoveOutcome {
        let (Ok(old), Ok(new)) = (
            resolve::canonical_path(old_path),
            resolve::canonical_path(new_path),
        ) else {
            return MoveOutcome::Untracked;
        };
        let Some(entry) = self.tracking.file_entry(&old).await else {
            return MoveOutcome::Untracked;
        };

        if old.parent() == new.parent() {
            let new_name = base_name(&new);
            if let Err(err) = self.remote.rename_file(&entry.id, &new_name).await {
                warn!("remote rename failed for {}: {err}", old.display());
            }
            self.tracking.rekey_file(&old, new).await;
            return MoveOutcome::Renamed;
        }

        if let Err(err) = self.remote.delete_file(&entry.id).await {
            warn!("remote delete failed for {}: {err}", old.display());
        }
        self.tracking.remove_file(&old).await;
        MoveOutcome::Rehomed(self.sync_file(&new).await)
    }

    /// Registers `local_path` as a root and walks it once, registering every
    /// directory and syncing every file. Per-entry failures are logged and
    /// the walk continues. Returns `None` when the root itself cannot be
    /// registered.
    pub async fn sync_folder(&self, local_path: &Path) -> Option<WalkSummary> {
        let root = match resolve::canonical_path(local_path) {
            Ok(root) => root,
            Err(err) => {
                warn!("cannot resolve {}: {err}", local_path.display());
                return None;
            }
        };
        let root_id = self.register_folder(&root, None).await?;

        let mut summary = WalkSummary::default();
        for entry in collect_entries(root.clone()).await {
            if entry.is_dir {
                if self.tracking.folder_id(&entry.path).await.is_some() {
                    continue;
                }
                let parent_id = match entry.path.parent() {
                    Some(parent) => self
                        .tracking
                        .folder_id(parent)
                        .await
                        .unwrap_or_else(|| root_id.clone()),
                    None => root_id.clone(),
                };
                if self
                    .register_folder(&entry.path, Some(&parent_id))
                    .await
                    .is_some()
                {
                    summary.folders_registered += 1;
                }
            } else {
                match self.sync_file(&entry.path).await {
                    SyncOutcome::Uploaded { .. } => summary.files_uploaded += 1,
                    SyncOutcome::Unchanged => summary.files_unchanged += 1,
                    SyncOutcome::Skipped(reason) => {
                        debug!("skipped {}: {reason:?}", entry.path.display());
                        summary.files_skipped += 1;
                    }
                }
            }
        }

        if let Err(err) = self.tracking.save().await {
            warn!("failed to persist tracking data after walk: {err}");
        }
        Some(summary)
    }
}

struct WalkEntry {
    path: PathBuf,
    is_dir: bool,
}

/// Collects the tree beneath `root` on a blocking thread, parents before
/// children. Unreadable entries are logged and skipped.
async fn collect_entries(root: PathBuf) -> Vec<WalkEntry> {
    tokio::task::spawn_blocking(move || {
        WalkDir::new(&root)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(WalkEntry {
                    is_dir: entry.file_type().is_dir(),
                    path: entry.into_path(),
                }),
                Err(err) => {
                    warn!("walk error under {}: {err}", root.display());
                    None
                }
            })
            .collect()
    })
    .await
    .unwrap_or_default()
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
