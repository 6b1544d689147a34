use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

/// Makes a cloud-placeholder file readable before it is hashed and uploaded.
/// Platforms without placeholder files use the no-op implementation.
#[async_trait]
pub trait Hydrator: Send + Sync {
    async fn hydrate(&self, path: &Path);
}

pub struct NoopHydrator;

#[async_trait]
impl Hydrator for NoopHydrator {
    async fn hydrate(&self, _path: &Path) {}
}

/// Clears the pinned-placeholder attribute via `attrib` so the cloud
/// provider materializes the file content. Failures are ignored; the read
/// that follows surfaces any file that stayed unreadable.
#[cfg(windows)]
pub struct AttribHydrator;

#[cfg(windows)]
#[async_trait]
impl Hydrator for AttribHydrator {
    async fn hydrate(&self, path: &Path) {
        use std::time::Duration;

        let output = match tokio::process::Command::new("attrib")
            .arg(path)
            .output()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                tracing::debug!("attrib probe failed for {}: {err}", path.display());
                return;
            }
        };

        // attrib prints flag columns before the path; O marks offline
        // content and P a pinned placeholder.
        let listing = String::from_utf8_lossy(&output.stdout).into_owned();
        let path_text = path.display().to_string();
        let flags = listing.split(&path_text).next().unwrap_or_default();
        if flags.contains('O') || flags.contains('P') {
            let _ = tokio::process::Command::new("attrib")
                .arg("-P")
                .arg(path)
                .status()
                .await;
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }
}

pub fn platform_hydrator() -> Arc<dyn Hydrator> {
    #[cfg(windows)]
    {
        Arc::new(AttribHydrator)
    }
    #[cfg(not(windows))]
    {
        Arc::new(NoopHydrator)
    }
}
