//! Storage for generated images served under `/static/`.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::{debug, info, warn};
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

use crate::error::Result;

/// Path segment the static directory is mounted under.
pub const STATIC_ROUTE: &str = "static";

const ASSET_EXTENSION: &str = "png";

/// A generated image written to the static directory.
#[derive(Debug, Clone)]
pub struct GeneratedAsset {
    pub filename: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AssetStore {
    dir: PathBuf,
}

impl AssetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the static directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Write PNG bytes under a fresh `{uuid}.png` name.
    pub async fn save_png(&self, bytes: &[u8]) -> Result<GeneratedAsset> {
        let filename = format!("{}.{ASSET_EXTENSION}", Uuid::new_v4());
        let path = self.dir.join(&filename);
        tokio::fs::write(&path, bytes).await?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(GeneratedAsset { filename, path })
    }

    /// Delete generated images whose last modification is older than `ttl`.
    ///
    /// Returns the number of files removed.
    pub async fn sweep_expired(&self, ttl: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ASSET_EXTENSION) {
                continue;
            }

            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < ttl {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Removed expired asset {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove expired asset {}: {e}", path.display()),
            }
        }

        Ok(removed)
    }

    /// Run [`AssetStore::sweep_expired`] every `interval` on the tokio runtime.
    pub fn spawn_sweeper(&self, ttl: Duration, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        info!(
            "Sweeping generated images older than {}s every {}s",
            ttl.as_secs(),
            interval.as_secs()
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match store.sweep_expired(ttl).await {
                    Ok(0) => {}
                    Ok(n) => info!("Swept {n} expired generated images"),
                    Err(e) => warn!("Asset sweep failed: {e}"),
                }
            }
        })
    }
}

/// Public URL of a stored asset: `host_url` + `static/` + `filename`.
pub fn public_url(host_url: &str, filename: &str) -> Result<String> {
    let base = if host_url.ends_with('/') {
        Url::parse(host_url)?
    } else {
        Url::parse(&format!("{host_url}/"))?
    };
    Ok(base.join(&format!("{STATIC_ROUTE}/{filename}"))?.to_string())
}
