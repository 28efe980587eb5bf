//! Error types for the edgequake-texpdf library.
//!
//! A render is a single subprocess invocation with no retries, so every
//! failure is fatal to the call: there is one error type, [`RenderError`],
//! returned as `Err` from every entry point.
//!
//! Variants are grouped into coarse [`ErrorKind`]s that mirror the adapter's
//! failure taxonomy (configuration, compiler-reported, no output, non-zero
//! exit, timeout, filesystem). Callers that only care about the category
//! match on [`RenderError::kind`] instead of on individual variants.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-texpdf library.
#[derive(Debug, Error)]
pub enum RenderError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// The resolved compiler binary does not exist or is not executable.
    #[error("TeX compiler binary is not found or not executable: '{path}'\nSet --binary or TEXPDF_BINARY to a working compiler.")]
    BinaryNotExecutable { path: PathBuf },

    /// The configured output directory is missing and could not be created.
    #[error("Output directory '{path}' does not exist and could not be created: {source}")]
    OutputDirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder or config-file validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Classifier errors ─────────────────────────────────────────────────
    /// The compiler wrote an error marker to stderr.
    #[error("System error reported by TeX compiler:\n{stderr}")]
    CompilerReported { stderr: String },

    /// The compiler produced no standard output at all.
    #[error("TeX compiler binary '{binary}' didn't return any data")]
    NoOutput { binary: PathBuf },

    /// Non-zero exit status accompanied by non-empty stderr.
    #[error("Shell error, return code: {exit_code}")]
    NonZeroExit { exit_code: i32, stderr: String },

    /// The compiler did not finish before the configured deadline.
    #[error("TeX compiler timed out after {secs}s and was killed\nIncrease --timeout or pass --no-timeout.")]
    Timeout { secs: u64 },

    // ── Process errors ────────────────────────────────────────────────────
    /// The operating system refused to start the compiler.
    #[error("Failed to spawn TeX compiler '{binary}': {source}")]
    SpawnFailed {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading from or writing to the child's pipes failed.
    #[error("I/O error while talking to the TeX compiler: {0}")]
    ProcessIo(#[source] std::io::Error),

    // ── Filesystem errors ─────────────────────────────────────────────────
    /// The staged source file could not be written.
    #[error("Failed to write staged source '{path}': {source}")]
    StagingFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The compiler passed every check but the expected PDF is unreadable.
    #[error("Failed to read compiled PDF '{path}': {source}")]
    PdfReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the destination PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Source file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not usable as a source.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse failure category of a [`RenderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    CompilerReported,
    NoOutput,
    NonZeroExit,
    Timeout,
    Filesystem,
    Process,
    Input,
    Internal,
}

impl RenderError {
    /// The failure category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::BinaryNotExecutable { .. }
            | RenderError::OutputDirectoryUnavailable { .. }
            | RenderError::InvalidConfig(_) => ErrorKind::Configuration,
            RenderError::CompilerReported { .. } => ErrorKind::CompilerReported,
            RenderError::NoOutput { .. } => ErrorKind::NoOutput,
            RenderError::NonZeroExit { .. } => ErrorKind::NonZeroExit,
            RenderError::Timeout { .. } => ErrorKind::Timeout,
            RenderError::StagingFailed { .. }
            | RenderError::PdfReadFailed { .. }
            | RenderError::OutputWriteFailed { .. } => ErrorKind::Filesystem,
            RenderError::SpawnFailed { .. } | RenderError::ProcessIo(_) => ErrorKind::Process,
            RenderError::FileNotFound { .. }
            | RenderError::PermissionDenied { .. }
            | RenderError::InvalidInput { .. }
            | RenderError::DownloadFailed { .. }
            | RenderError::DownloadTimeout { .. } => ErrorKind::Input,
            RenderError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True for errors raised before any subprocess is spawned because the
    /// engine itself is misconfigured.
    pub fn is_configuration_error(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_not_executable_names_path() {
        let e = RenderError::BinaryNotExecutable {
            path: PathBuf::from("/opt/tex/bin/missing"),
        };
        assert!(e.to_string().contains("/opt/tex/bin/missing"));
        assert!(e.is_configuration_error());
    }

    #[test]
    fn non_zero_exit_display() {
        let e = RenderError::NonZeroExit {
            exit_code: 2,
            stderr: "boom".into(),
        };
        assert_eq!(e.to_string(), "Shell error, return code: 2");
        assert_eq!(e.kind(), ErrorKind::NonZeroExit);
    }

    #[test]
    fn compiler_reported_carries_stderr() {
        let e = RenderError::CompilerReported {
            stderr: "Fatal Error: missing \\end{document}".into(),
        };
        assert!(e.to_string().contains("missing \\end{document}"));
        assert_eq!(e.kind(), ErrorKind::CompilerReported);
    }

    #[test]
    fn timeout_display() {
        let e = RenderError::Timeout { secs: 30 };
        assert!(e.to_string().contains("30s"));
        assert_eq!(e.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn pdf_read_is_filesystem_kind() {
        let e = RenderError::PdfReadFailed {
            path: PathBuf::from("/tmp/pdf/abc.pdf"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(e.kind(), ErrorKind::Filesystem);
        assert!(!e.is_configuration_error());
    }

    #[test]
    fn error_kind_serialises_snake_case() {
        let json = serde_json::to_string(&ErrorKind::NonZeroExit).unwrap();
        assert_eq!(json, "\"non_zero_exit\"");
    }
}
