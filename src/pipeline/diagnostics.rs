//! TeX transcript diagnostics.
//!
//! TeX engines print their errors to stdout, not stderr, in a fixed shape:
//!
//! ```text
//! ! Undefined control sequence.
//! l.12 \foo
//! ```
//!
//! This module pulls those out (plus LaTeX/package warnings) so a render
//! report can show *why* a document misbehaved. It never influences
//! classification; that stays on exit code and stderr alone.

use crate::output::{DiagnosticSeverity, TexDiagnostic};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^!\s+(.+?)\s*$").unwrap());

static RE_LINE_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^l\.(\d+)\b").unwrap());

static RE_WARNING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:LaTeX|Package\s+\S+|Class\s+\S+)\s+Warning:\s*(.+?)\s*$").unwrap()
});

static RE_INPUT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"on input line (\d+)").unwrap());

/// How far after a `! message` line to look for its `l.<n>` reference.
const LINE_REF_WINDOW: usize = 8;

/// Extract errors and warnings from a TeX transcript.
pub fn parse_tex_output(transcript: &str) -> Vec<TexDiagnostic> {
    let lines: Vec<&str> = transcript.lines().collect();
    let mut diagnostics = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = RE_ERROR.captures(line) {
            let line_no = lines
                .iter()
                .skip(i + 1)
                .take(LINE_REF_WINDOW)
                .find_map(|l| RE_LINE_REF.captures(l))
                .and_then(|c| c[1].parse().ok());
            diagnostics.push(TexDiagnostic {
                severity: DiagnosticSeverity::Error,
                message: caps[1].to_string(),
                line: line_no,
            });
        } else if let Some(caps) = RE_WARNING.captures(line) {
            let message = caps[1].to_string();
            let line_no = RE_INPUT_LINE
                .captures(&message)
                .and_then(|c| c[1].parse().ok());
            diagnostics.push(TexDiagnostic {
                severity: DiagnosticSeverity::Warning,
                message,
                line: line_no,
            });
        }
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_with_line_reference() {
        let transcript = "This is pdfTeX\n! Undefined control sequence.\nl.12 \\foo\n               \n";
        let diags = parse_tex_output(transcript);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, DiagnosticSeverity::Error);
        assert_eq!(diags[0].message, "Undefined control sequence.");
        assert_eq!(diags[0].line, Some(12));
    }

    #[test]
    fn error_without_line_reference() {
        let diags = parse_tex_output("! Emergency stop.\n*** (job aborted, no legal \\end found)\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, None);
    }

    #[test]
    fn latex_and_package_warnings() {
        let transcript = "\
LaTeX Warning: Reference `fig:1' on page 1 undefined on input line 42.
Package hyperref Warning: Token not allowed in a PDF string.
Overfull \\hbox (3.0pt too wide) in paragraph at lines 5--6
";
        let diags = parse_tex_output(transcript);
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().all(|d| d.severity == DiagnosticSeverity::Warning));
        assert_eq!(diags[0].line, Some(42));
        assert!(diags[1].message.starts_with("Token not allowed"));
    }

    #[test]
    fn clean_transcript_has_no_diagnostics() {
        let transcript = "This is pdfTeX, Version 3.141592653\nOutput written on x.pdf (1 page, 1234 bytes).\n";
        assert!(parse_tex_output(transcript).is_empty());
    }
}
