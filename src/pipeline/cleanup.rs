//! Best-effort removal of the staged source and the compiler's artifacts.

use crate::fs::FileSystem;
use crate::pipeline::stage::{artifact_path, StagedSource};
use std::path::PathBuf;
use tracing::debug;

/// Extensions the compiler writes next to the staged file.
pub const ARTIFACT_EXTENSIONS: [&str; 3] = ["aux", "log", "pdf"];

/// Delete `<staged>.aux`, `<staged>.log`, `<staged>.pdf` and the staged
/// source, each only if present. Failures are logged and swallowed.
///
/// Returns the paths that were actually removed.
pub async fn clean_up(fs: &dyn FileSystem, staged: &StagedSource) -> Vec<PathBuf> {
    let mut targets: Vec<PathBuf> = ARTIFACT_EXTENSIONS
        .iter()
        .map(|ext| artifact_path(&staged.path, ext))
        .collect();
    targets.push(staged.path.clone());

    let mut removed = Vec::with_capacity(targets.len());
    for path in targets {
        match fs.remove_file_if_exists(&path).await {
            Ok(true) => removed.push(path),
            Ok(false) => {}
            Err(e) => debug!("Could not remove {}: {}", path.display(), e),
        }
    }
    debug!("Cleaned up {} file(s) for {}", removed.len(), staged.fingerprint);
    removed
}
