//! Render result types.

use serde::{Deserialize, Serialize};

/// The complete result of one successful render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderOutput {
    /// The compiled PDF. Left out of JSON reports.
    #[serde(skip)]
    pub pdf: Vec<u8>,
    /// Lowercase hex SHA-256 of the source; also the staged file name.
    pub fingerprint: String,
    /// Display form of the compiler invocation, staged path included.
    pub command_line: String,
    /// Errors and warnings found in the compiler transcript.
    pub diagnostics: Vec<TexDiagnostic>,
    pub stats: RenderStats,
}

impl RenderOutput {
    /// Number of diagnostics with [`DiagnosticSeverity::Warning`].
    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Warning)
            .count()
    }
}

/// Counters and timings for one render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderStats {
    pub exit_code: i32,
    pub pdf_bytes: usize,
    pub stdout_bytes: usize,
    pub stderr_bytes: usize,
    /// Wall time spent inside the compiler process.
    pub compile_duration_ms: u64,
    /// Wall time of the whole render, staging and cleanup included.
    pub total_duration_ms: u64,
}

/// One error or warning reported by TeX.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TexDiagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
    /// Source line, when TeX reported one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub line: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}
