//! Top-level entry points.
//!
//! These wrap [`TexToPdfEngine`] for callers who just want a PDF from a
//! source string and a config. Build an engine yourself when you render
//! repeatedly, need a progress callback, or want to inject capabilities.

use crate::config::EngineConfig;
use crate::engine::TexToPdfEngine;
use crate::error::RenderError;
use crate::output::{RenderOutput, RenderStats};
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Compile `source` with a one-off engine.
///
/// # Errors
/// Any [`RenderError`]; see [`crate::error::ErrorKind`] for the categories.
pub async fn render(
    source: impl AsRef<str>,
    config: &EngineConfig,
) -> Result<RenderOutput, RenderError> {
    TexToPdfEngine::new(config.clone())
        .render(source.as_ref())
        .await
}

/// Synchronous wrapper around [`render`].
///
/// Creates a temporary tokio runtime internally, so it must not be called
/// from inside an async context.
pub fn render_sync(
    source: impl AsRef<str>,
    config: &EngineConfig,
) -> Result<RenderOutput, RenderError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| RenderError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(render(source, config))
}

/// Compile `source` and write the PDF to `output_path`.
///
/// The file appears atomically: bytes go to a temp file in the destination
/// directory which is then renamed over the target.
pub async fn render_to_file(
    source: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &EngineConfig,
) -> Result<RenderStats, RenderError> {
    let output = render(source, config).await?;
    write_pdf(output_path.as_ref(), output.pdf).await?;
    Ok(output.stats)
}

/// Compile several sources through one engine, at most `concurrency` at a
/// time. Results come back in input order; one failure does not stop the
/// others.
pub async fn render_batch<S: AsRef<str>>(
    sources: &[S],
    config: &EngineConfig,
    concurrency: usize,
) -> Vec<Result<RenderOutput, RenderError>> {
    let engine = TexToPdfEngine::new(config.clone());
    render_batch_with(&engine, sources, concurrency).await
}

/// [`render_batch`] on an existing engine, reporting batch progress to its
/// callback.
pub async fn render_batch_with<S: AsRef<str>>(
    engine: &TexToPdfEngine,
    sources: &[S],
    concurrency: usize,
) -> Vec<Result<RenderOutput, RenderError>> {
    let total = sources.len();
    let concurrency = concurrency.max(1);
    info!("Rendering batch of {} (concurrency {})", total, concurrency);
    if let Some(cb) = engine.progress() {
        cb.on_batch_start(total);
    }

    let mut indexed: Vec<(usize, Result<RenderOutput, RenderError>)> =
        stream::iter(sources.iter().enumerate().map(|(idx, source)| async move {
            (idx, engine.render(source.as_ref()).await)
        }))
        .buffer_unordered(concurrency)
        .collect()
        .await;
    indexed.sort_by_key(|(idx, _)| *idx);

    let success_count = indexed.iter().filter(|(_, r)| r.is_ok()).count();
    info!("Batch complete: {}/{} rendered", success_count, total);
    if let Some(cb) = engine.progress() {
        cb.on_batch_complete(total, success_count);
    }
    indexed.into_iter().map(|(_, r)| r).collect()
}

/// Atomically write `pdf` to `path`, creating parent directories.
pub async fn write_pdf(path: &Path, pdf: Vec<u8>) -> Result<(), RenderError> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&target, &pdf))
        .await
        .map_err(|e| RenderError::Internal(format!("write task failed: {e}")))?
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RenderError> {
    let write_err = |source| RenderError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
