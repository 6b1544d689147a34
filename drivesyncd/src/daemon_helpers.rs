fn default_data_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::config_dir().context("config directory is unavailable")?;
    Ok(base.join(DATA_DIR_NAME))
}

/// Reads the JSON list of folders to sync. A missing file simply means
/// nothing is configured yet.
fn load_roots_file(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    let roots: Vec<PathBuf> = serde_json::from_slice(&bytes)
        .with_context(|| format!("{} is not a JSON array of paths", path.display()))?;
    Ok(roots)
}

fn read_u64_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

async fn dispatch_events(
    engine: Arc<SyncEngine<DriveClient>>,
    mut events: mpsc::UnboundedReceiver<ChangeEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ChangeEvent::Changed(path) => {
                let outcome = engine.sync_file(&path).await;
                debug!("sync {}: {outcome:?}", path.display());
            }
            ChangeEvent::Removed(path) => {
                let outcome = engine.delete_file(&path).await;
                debug!("delete {}: {outcome:?}", path.display());
            }
            ChangeEvent::Renamed { from, to } => {
                let outcome = engine.move_file(&from, &to).await;
                debug!("move {} -> {}: {outcome:?}", from.display(), to.display());
            }
        }
    }
}
