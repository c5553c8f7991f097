use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::time::interval;

/// Longest pause between sweeps, whatever the TTL.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Evicts rendered documents from the output directory once they outlive the TTL.
#[derive(Debug, Clone)]
pub struct OutputRetention {
    output_dir: PathBuf,
    ttl: Duration,
}

impl OutputRetention {
    pub fn new(output_dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            output_dir: output_dir.into(),
            ttl,
        }
    }

    /// Start the background sweeper. Runs every `min(ttl, 1h)`.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.ttl.min(MAX_SWEEP_INTERVAL).max(Duration::from_secs(1));
            let mut sweep_interval = interval(period);

            loop {
                sweep_interval.tick().await;
                match self.sweep().await {
                    Ok(0) => {}
                    Ok(deleted) => tracing::info!(deleted, "Evicted expired output documents"),
                    Err(e) => tracing::error!(error = %e, "Output retention sweep failed"),
                }
            }
        })
    }

    /// Deletes expired `.pdf` and leftover `.part` files. Returns how many were removed.
    pub async fn sweep(&self) -> std::io::Result<usize> {
        let now = SystemTime::now();
        let mut deleted = 0;
        let mut entries = tokio::fs::read_dir(&self.output_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_rendered_output(&path) {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < self.ttl {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), age_secs = age.as_secs(), "Deleted expired output");
                    deleted += 1;
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to delete expired output"),
            }
        }

        Ok(deleted)
    }
}

fn is_rendered_output(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("pdf") | Some("part")
    )
}
