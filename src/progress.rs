//! Progress-callback trait for render events.
//!
//! Attach an [`Arc<dyn RenderProgressCallback>`] with
//! [`crate::engine::TexToPdfEngine::with_progress`] to receive events as each
//! render moves through the pipeline. Batch renders additionally report
//! their start and completion.
//!
//! # Example
//!
//! ```rust
//! use edgequake_texpdf::{EngineConfig, RenderProgressCallback, TexToPdfEngine};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl RenderProgressCallback for Counter {
//!     fn on_render_complete(&self, _fingerprint: &str, pdf_bytes: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("rendered {pdf_bytes} bytes");
//!     }
//! }
//!
//! let engine = TexToPdfEngine::new(EngineConfig::default())
//!     .with_progress(Arc::new(Counter(AtomicUsize::new(0))));
//! ```

use std::fmt;
use std::sync::Arc;

/// Pipeline step a render has just entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Staging,
    Compiling,
    ReadingPdf,
    CleaningUp,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RenderStage::Staging => "staging",
            RenderStage::Compiling => "compiling",
            RenderStage::ReadingPdf => "reading pdf",
            RenderStage::CleaningUp => "cleaning up",
        };
        f.write_str(s)
    }
}

/// Called by the engine as renders progress.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// During [`crate::render::render_batch`] several renders run at once, so
/// every method may be called concurrently. Protect shared mutable state
/// with `Mutex` or atomics.
pub trait RenderProgressCallback: Send + Sync {
    /// Called once before a batch starts.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called when a render begins, before the compiler is checked.
    fn on_render_start(&self, fingerprint: &str) {
        let _ = fingerprint;
    }

    /// Called when a render enters a new step.
    fn on_stage(&self, fingerprint: &str, stage: RenderStage) {
        let _ = (fingerprint, stage);
    }

    /// Called when a render returns PDF bytes.
    fn on_render_complete(&self, fingerprint: &str, pdf_bytes: usize) {
        let _ = (fingerprint, pdf_bytes);
    }

    /// Called when a render fails after [`Self::on_render_start`].
    ///
    /// # Arguments
    /// * `fingerprint`: SHA-256 of the source
    /// * `error`: human-readable error description
    fn on_render_error(&self, fingerprint: &str, error: &str) {
        let _ = (fingerprint, error);
    }

    /// Called once after every render of a batch has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation; the default when no callback is attached.
pub struct NoopProgressCallback;

impl RenderProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in the engine.
pub type ProgressCallback = Arc<dyn RenderProgressCallback>;
