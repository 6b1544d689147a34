use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(250);

const PRUNE_THRESHOLD: usize = 1024;
const PRUNE_AGE_WINDOWS: u32 = 4;

/// File-level change observed under a watched root. Directory events are
/// filtered out before mapping; folder registration happens on walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Changed(PathBuf),
    Removed(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

fn map_event(event: Event) -> Vec<ChangeEvent> {
    use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};

    match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() >= 2 => {
            let from = event.paths[0].clone();
            let to = event.paths[1].clone();
            if to.is_dir() {
                return Vec::new();
            }
            vec![ChangeEvent::Renamed { from, to }]
        }
        // The backend reports one rename as a From half and a To half plus
        // the paired two-path event; only the pair carries both ends, so
        // the halves are dropped.
        EventKind::Modify(ModifyKind::Name(_)) => Vec::new(),
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        EventKind::Create(_) | EventKind::Modify(_) => event
            .paths
            .into_iter()
            .filter(|path| !path.is_dir())
            .map(ChangeEvent::Changed)
            .collect(),
        EventKind::Remove(_) => event.paths.into_iter().map(ChangeEvent::Removed).collect(),
        _ => Vec::new(),
    }
}

/// Per-path suppression of change bursts. Editors produce several writes for
/// one save; only the first within the window is forwarded. Removals and
/// renames always pass so tracking never misses them.
struct Debouncer {
    window: Duration,
    last_changed: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self {
            window,
            last_changed: HashMap::new(),
        }
    }

    fn admit(&mut self, event: &ChangeEvent, now: Instant) -> bool {
        let ChangeEvent::Changed(path) = event else {
            return true;
        };
        if let Some(last) = self.last_changed.get(path)
            && now.duration_since(*last) < self.window
        {
            return false;
        }
        self.prune(now);
        self.last_changed.insert(path.clone(), now);
        true
    }

    // Keeps the map bounded on long runs: once it grows past the threshold,
    // entries older than a few windows can no longer suppress anything and
    // are dropped.
    fn prune(&mut self, now: Instant) {
        if self.last_changed.len() < PRUNE_THRESHOLD {
            return;
        }
        let horizon = self.window * PRUNE_AGE_WINDOWS;
        self.last_changed
            .retain(|_, last| now.duration_since(*last) < horizon);
    }
}

/// Recursive watcher over one root. Raw notify events flow through an
/// internal channel into a forwarder task that maps, debounces, and pushes
/// `ChangeEvent`s to the daemon.
pub struct LocalWatcher {
    root: PathBuf,
    window: Duration,
    watcher: Option<RecommendedWatcher>,
    forwarder: Option<JoinHandle<()>>,
}

impl LocalWatcher {
    pub fn new(root: impl Into<PathBuf>, window: Duration) -> Self {
        Self {
            root: root.into(),
            window,
            watcher: None,
            forwarder: None,
        }
    }

    /// Starts watching the root recursively. Starting a running watcher is
    /// a no-op.
    pub fn start(&mut self, events_tx: mpsc::UnboundedSender<ChangeEvent>) -> notify::Result<()> {
        if self.watcher.is_some() {
            return Ok(());
        }
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = raw_tx.send(event);
            }
        })?;
        watcher.watch(self.root.as_path(), RecursiveMode::Recursive)?;

        let window = self.window;
        let forwarder = tokio::spawn(async move {
            let mut debouncer = Debouncer::new(window);
            while let Some(event) = raw_rx.recv().await {
                for change in map_event(event) {
                    if !debouncer.admit(&change, Instant::now()) {
                        continue;
                    }
                    if events_tx.send(change).is_err() {
                        return;
                    }
                }
            }
        });

        self.watcher = Some(watcher);
        self.forwarder = Some(forwarder);
        Ok(())
    }

    /// Stops watching and waits for the forwarder to drain. Stopping a
    /// stopped watcher is a no-op.
    pub async fn stop(&mut self) {
        let Some(watcher) = self.watcher.take() else {
            return;
        };
        drop(watcher);
        if let Some(forwarder) = self.forwarder.take() {
            let _ = forwarder.await;
        }
    }
}
