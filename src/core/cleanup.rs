use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Removes what a failed step may have half-written. Returns the paths that were removed.
pub async fn discard_outputs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut removed = Vec::new();

    for path in paths {
        match remove_path(path).await {
            Ok(true) => {
                tracing::info!("🧹 Discarded partial output {}", path.display());
                removed.push(path.clone());
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("⚠️ Could not discard {}: {}", path.display(), e);
            }
        }
    }

    removed
}

async fn remove_path(path: &Path) -> std::io::Result<bool> {
    // symlinks are removed themselves, never followed
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
