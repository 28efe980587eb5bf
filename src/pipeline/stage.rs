//! File staging: write the source to a content-addressed file.
//!
//! The staged file is named by the SHA-256 of its own content, so the same
//! source always lands on the same path. The compiler derives its artifact
//! names (`<name>.aux`, `<name>.log`, `<name>.pdf`) from that path.

use crate::error::RenderError;
use crate::fs::FileSystem;
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A source file written to the output directory, ready for the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedSource {
    pub path: PathBuf,
    pub fingerprint: String,
}

impl StagedSource {
    /// Path of a compiler artifact next to the staged file.
    pub fn artifact(&self, extension: &str) -> PathBuf {
        artifact_path(&self.path, extension)
    }
}

/// Lowercase hex SHA-256 of `source`.
pub fn fingerprint(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}

/// Where a source with this fingerprint is staged.
pub fn staged_path(output_dir: &Path, fingerprint: &str) -> PathBuf {
    output_dir.join(fingerprint)
}

/// `<staged>.<extension>`, appended rather than substituted.
pub fn artifact_path(staged: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(staged.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Write `source` to its staged path in one operation.
pub async fn stage_source(
    fs: &dyn FileSystem,
    output_dir: &Path,
    source: &str,
) -> Result<StagedSource, RenderError> {
    let fingerprint = fingerprint(source);
    let path = staged_path(output_dir, &fingerprint);
    fs.write(&path, source.as_bytes())
        .await
        .map_err(|source| RenderError::StagingFailed {
            path: path.clone(),
            source,
        })?;
    debug!("Staged {} bytes → {}", source.len(), path.display());
    Ok(StagedSource { path, fingerprint })
}
