//! # edgequake-texpdf
//!
//! Turn TeX/LaTeX (or any markup a TeX front-end accepts) into PDF bytes by
//! driving an external compiler binary.
//!
//! The crate owns everything around the compiler: it stages the source in
//! an output directory under a content fingerprint, runs the binary with
//! the configured flags, decides from its streams whether the run
//! succeeded, reads the PDF back, and removes every artifact it left
//! behind.
//!
//! ## Pipeline Overview
//!
//! ```text
//! source text
//!  │
//!  ├─ 1. Prepare   resolve binary, check it is executable, create output dir
//!  ├─ 2. Stage     write <output-dir>/<sha256> (per-fingerprint lock held)
//!  ├─ 3. Run       spawn compiler, feed stdin, drain stdout/stderr, deadline
//!  ├─ 4. Classify  stderr "error" / empty stdout / non-zero exit + stderr
//!  ├─ 5. Read      <staged>.pdf
//!  └─ 6. Clean up  .aux .log .pdf and the staged source
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_texpdf::{render, EngineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::builder()
//!         .binary("/usr/bin/latexpdf")
//!         .switch("halt-on-error")
//!         .timeout_secs(60)
//!         .build()?;
//!     let output = render(r"\documentclass{article}\begin{document}Hi\end{document}", &config).await?;
//!     std::fs::write("hi.pdf", &output.pdf)?;
//!     eprintln!("{} bytes in {}ms", output.stats.pdf_bytes, output.stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `texpdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-texpdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod fs;
pub mod lock;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod render;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use command::CompilerCommand;
pub use config::{CompilerOptions, EngineConfig, EngineConfigBuilder, OptionValue, TextEncoding};
pub use engine::TexToPdfEngine;
pub use error::{ErrorKind, RenderError};
pub use fs::{FileSystem, LocalFileSystem};
pub use output::{DiagnosticSeverity, RenderOutput, RenderStats, TexDiagnostic};
pub use pipeline::run::{ProcessOutput, ProcessRunner, TokioProcessRunner};
pub use progress::{NoopProgressCallback, ProgressCallback, RenderProgressCallback, RenderStage};
pub use render::{render, render_batch, render_batch_with, render_sync, render_to_file};
