use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use drivesync_core::DriveClient;

use crate::sync::engine::SyncEngine;
use crate::sync::hydrate::platform_hydrator;
use crate::sync::local_watcher::{ChangeEvent, DEFAULT_DEBOUNCE_WINDOW, LocalWatcher};
use crate::sync::tracking::TrackingStore;

const DATA_DIR_NAME: &str = "drivesync";
const TRACKING_FILE_NAME: &str = "sync_tracking.json";
const ROOTS_FILE_NAME: &str = "synced_folders.json";
const DEFAULT_DEBOUNCE_MS: u64 = DEFAULT_DEBOUNCE_WINDOW.as_millis() as u64;

#[derive(Clone, Debug)]
pub struct DaemonConfig {
    pub data_dir: PathBuf,
    pub roots: Vec<PathBuf>,
    pub debounce_window: Duration,
}

impl DaemonConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let data_dir = match std::env::var_os("DRIVESYNC_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };
        let roots = match std::env::var_os("DRIVESYNC_ROOTS") {
            Some(list) => std::env::split_paths(&list)
                .filter(|path| !path.as_os_str().is_empty())
                .collect(),
            None => load_roots_file(&data_dir.join(ROOTS_FILE_NAME))?,
        };
        let debounce_window =
            Duration::from_millis(read_u64_env("DRIVESYNC_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS));

        Ok(Self {
            data_dir,
            roots,
            debounce_window,
        })
    }

    pub fn tracking_path(&self) -> PathBuf {
        self.data_dir.join(TRACKING_FILE_NAME)
    }
}

pub struct DaemonRuntime {
    config: DaemonConfig,
    engine: Arc<SyncEngine<DriveClient>>,
}

impl DaemonRuntime {
    pub async fn bootstrap(config: DaemonConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .with_context(|| format!("failed to create data dir at {:?}", config.data_dir))?;

        let token = std::env::var("DRIVESYNC_TOKEN").context("DRIVESYNC_TOKEN is not set")?;
        let client = DriveClient::new(token).context("failed to build drive client")?;
        let tracking = TrackingStore::open(config.tracking_path())
            .await
            .context("failed to open tracking store")?;
        let engine = Arc::new(SyncEngine::new(client, tracking).with_hydrator(platform_hydrator()));

        Ok(Self { config, engine })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        info!(
            "started: data_dir={}, folders={}",
            self.config.data_dir.display(),
            self.config.roots.len()
        );
        if self.config.roots.is_empty() {
            warn!("no folders to sync; set DRIVESYNC_ROOTS or add paths to {ROOTS_FILE_NAME}");
        }

        let mut watchers = Vec::new();
        let mut walk_handles = Vec::new();
        let mut dispatch_handles = Vec::new();
        for root in &self.config.roots {
            // Register the root before its watcher starts so events under it
            // resolve to a parent folder.
            let _ = self.engine.register_folder(root, None).await;

            let engine_for_walk = Arc::clone(&self.engine);
            let walk_root = root.clone();
            walk_handles.push(tokio::spawn(async move {
                match engine_for_walk.sync_folder(&walk_root).await {
                    Some(summary) => info!(
                        "walk finished for {}: folders={}, uploaded={}, unchanged={}, skipped={}",
                        walk_root.display(),
                        summary.folders_registered,
                        summary.files_uploaded,
                        summary.files_unchanged,
                        summary.files_skipped
                    ),
                    None => warn!("could not register {}", walk_root.display()),
                }
            }));

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let mut watcher = LocalWatcher::new(root.clone(), self.config.debounce_window);
            if let Err(err) = watcher.start(events_tx) {
                warn!("failed to watch {}: {err}", root.display());
                continue;
            }
            watchers.push(watcher);

            let engine_for_events = Arc::clone(&self.engine);
            dispatch_handles.push(tokio::spawn(dispatch_events(engine_for_events, events_rx)));
        }

        tokio::signal::ctrl_c()
            .await
            .context("failed waiting for shutdown signal")?;
        info!("shutting down");

        // Stopping the watchers closes the event channels; the dispatchers
        // drain what is left before exiting.
        for watcher in &mut watchers {
            watcher.stop().await;
        }
        for handle in dispatch_handles {
            let _ = handle.await;
        }
        for handle in walk_handles {
            handle.abort();
        }

        Ok(())
    }
}

include!("daemon_helpers.rs");

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
