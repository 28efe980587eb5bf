//! The TeX-to-PDF engine.
//!
//! [`TexToPdfEngine`] owns a validated [`EngineConfig`] plus the two
//! capabilities it needs from the outside world (a [`ProcessRunner`] and a
//! [`FileSystem`]) and runs the pipeline for one source at a time:
//!
//! ```text
//! prepare ─▶ lock ─▶ stage ─▶ run ─▶ classify ─▶ read pdf ─▶ clean up
//! ```
//!
//! One engine can be shared across tasks. Renders of identical source into
//! the same output directory are serialised by a process-wide fingerprint
//! lock, whichever engine runs them; everything else runs in parallel.

use crate::command::{self, CompilerCommand};
use crate::config::EngineConfig;
use crate::error::RenderError;
use crate::fs::{FileSystem, LocalFileSystem};
use crate::lock::FingerprintLocks;
use crate::output::{DiagnosticSeverity, RenderOutput, RenderStats};
use crate::pipeline::classify::classify;
use crate::pipeline::cleanup::clean_up;
use crate::pipeline::diagnostics::parse_tex_output;
use crate::pipeline::run::{ProcessRunner, TokioProcessRunner};
use crate::pipeline::stage::{self, StagedSource};
use crate::progress::{ProgressCallback, RenderStage};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct TexToPdfEngine {
    config: EngineConfig,
    runner: Arc<dyn ProcessRunner>,
    fs: Arc<dyn FileSystem>,
    locks: Arc<FingerprintLocks>,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for TexToPdfEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TexToPdfEngine")
            .field("config", &self.config)
            .field("locks", &self.locks)
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

impl TexToPdfEngine {
    /// Engine that spawns real processes and touches the real filesystem.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_capabilities(
            config,
            Arc::new(TokioProcessRunner),
            Arc::new(LocalFileSystem),
        )
    }

    /// Engine with injected capabilities, mainly for tests.
    pub fn with_capabilities(
        config: EngineConfig,
        runner: Arc<dyn ProcessRunner>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            config,
            runner,
            fs,
            locks: FingerprintLocks::shared(),
            progress: None,
        }
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn progress(&self) -> Option<&ProgressCallback> {
        self.progress.as_ref()
    }

    /// The compiler command this engine would run, without the staged path.
    ///
    /// Built from configuration alone; nothing is checked or spawned.
    pub fn command(&self) -> CompilerCommand {
        command::build_command(command::resolve_binary(&self.config), &self.config.options)
    }

    /// Compile `source` and return the PDF bytes.
    pub async fn output(&self, source: &str) -> Result<Vec<u8>, RenderError> {
        self.render(source).await.map(|out| out.pdf)
    }

    /// Compile `source` and return the PDF together with a render report.
    pub async fn render(&self, source: &str) -> Result<RenderOutput, RenderError> {
        let total_start = Instant::now();
        let fingerprint = stage::fingerprint(source);
        info!("Rendering {} ({} bytes)", fingerprint, source.len());
        if let Some(cb) = &self.progress {
            cb.on_render_start(&fingerprint);
        }

        let result = self.render_prepared(source, &fingerprint, total_start).await;

        match &result {
            Ok(out) => {
                info!(
                    "Rendered {}: {} bytes in {}ms",
                    fingerprint, out.stats.pdf_bytes, out.stats.total_duration_ms
                );
                if let Some(cb) = &self.progress {
                    cb.on_render_complete(&fingerprint, out.pdf.len());
                }
            }
            Err(e) => {
                warn!("Render {} failed: {}", fingerprint, e);
                if let Some(cb) = &self.progress {
                    cb.on_render_error(&fingerprint, &e.to_string());
                }
            }
        }
        result
    }

    async fn render_prepared(
        &self,
        source: &str,
        fingerprint: &str,
        total_start: Instant,
    ) -> Result<RenderOutput, RenderError> {
        let (command, output_dir) = command::prepare(&self.config, self.fs.as_ref()).await?;
        let lock_key = stage::staged_path(&output_dir, fingerprint);
        let _guard = self.locks.acquire(&lock_key.to_string_lossy()).await;
        self.render_locked(&command, &output_dir, source, fingerprint, total_start)
            .await
    }

    async fn render_locked(
        &self,
        command: &CompilerCommand,
        output_dir: &Path,
        source: &str,
        fp: &str,
        total_start: Instant,
    ) -> Result<RenderOutput, RenderError> {
        self.enter(fp, RenderStage::Staging);
        let staged = stage::stage_source(self.fs.as_ref(), output_dir, source).await?;

        self.enter(fp, RenderStage::Compiling);
        let timeout = self.config.timeout_secs.map(Duration::from_secs);
        let compile_start = Instant::now();
        let process = match self
            .runner
            .run(command, &staged.path, source.as_bytes(), timeout)
            .await
        {
            Ok(process) => process,
            Err(e) => {
                self.discard_failed(&staged).await;
                return Err(e);
            }
        };
        let compile_duration_ms = compile_start.elapsed().as_millis() as u64;
        debug!(
            "Compiler exited with {} in {}ms ({} bytes stdout, {} bytes stderr)",
            process.exit_code,
            compile_duration_ms,
            process.stdout.len(),
            process.stderr.len()
        );

        let diagnostics = parse_tex_output(&process.stdout_lossy());
        for diag in &diagnostics {
            let at = diag.line.map(|l| format!(" (line {l})")).unwrap_or_default();
            match diag.severity {
                DiagnosticSeverity::Error => warn!("TeX error{}: {}", at, diag.message),
                DiagnosticSeverity::Warning => warn!("TeX warning{}: {}", at, diag.message),
            }
        }

        if let Err(e) = classify(&process, self.config.encoding, &command.program) {
            self.discard_failed(&staged).await;
            return Err(e);
        }

        self.enter(fp, RenderStage::ReadingPdf);
        let pdf_path = staged.artifact("pdf");
        let pdf = self
            .fs
            .read(&pdf_path)
            .await
            .map_err(|source| RenderError::PdfReadFailed {
                path: pdf_path.clone(),
                source,
            });

        self.enter(fp, RenderStage::CleaningUp);
        clean_up(self.fs.as_ref(), &staged).await;
        let pdf = pdf?;

        let stats = RenderStats {
            exit_code: process.exit_code,
            pdf_bytes: pdf.len(),
            stdout_bytes: process.stdout.len(),
            stderr_bytes: process.stderr.len(),
            compile_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        Ok(RenderOutput {
            pdf,
            command_line: command.command_line_with(&staged.path),
            fingerprint: staged.fingerprint,
            diagnostics,
            stats,
        })
    }

    /// Clean up after a failed compile unless the config asks to keep the files.
    async fn discard_failed(&self, staged: &StagedSource) {
        if self.config.keep_failed_artifacts {
            info!(
                "Keeping artifacts of failed render at {}",
                staged.path.display()
            );
            return;
        }
        clean_up(self.fs.as_ref(), staged).await;
    }

    fn enter(&self, fingerprint: &str, stage: RenderStage) {
        debug!("Stage: {}", stage);
        if let Some(cb) = &self.progress {
            cb.on_stage(fingerprint, stage);
        }
    }
}
