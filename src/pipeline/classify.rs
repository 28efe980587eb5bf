//! Result classification: decide from the captured streams whether the
//! compiler run counts as a success.
//!
//! The checks run in a fixed order and the first match wins:
//!
//! 1. stderr mentions "error" (any case) → [`RenderError::CompilerReported`]
//! 2. stdout is empty in the configured encoding → [`RenderError::NoOutput`]
//! 3. non-zero exit **and** non-empty stderr → [`RenderError::NonZeroExit`]
//! 4. anything else is a success
//!
//! A non-zero exit with an empty stderr passes step 3. Some TeX front-ends
//! exit non-zero on warnings alone; the PDF read that follows decides whether
//! the run really failed.

use crate::config::TextEncoding;
use crate::error::RenderError;
use crate::pipeline::run::ProcessOutput;
use std::path::Path;

/// Marker searched for, case-insensitively, in stderr.
pub const ERROR_MARKER: &str = "error";

/// Apply the four-step decision sequence to one compiler run.
pub fn classify(
    output: &ProcessOutput,
    encoding: TextEncoding,
    binary: &Path,
) -> Result<(), RenderError> {
    let stderr = output.stderr_lossy();

    if stderr.to_lowercase().contains(ERROR_MARKER) {
        return Err(RenderError::CompilerReported { stderr });
    }

    if encoding.char_len(&output.stdout) == 0 {
        return Err(RenderError::NoOutput {
            binary: binary.to_path_buf(),
        });
    }

    // Any stderr byte counts, including a lone "0".
    if output.exit_code != 0 && !output.stderr.is_empty() {
        return Err(RenderError::NonZeroExit {
            exit_code: output.exit_code,
            stderr,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn out(stdout: &str, stderr: &str, exit_code: i32) -> ProcessOutput {
        ProcessOutput {
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            exit_code,
        }
    }

    fn kind(output: &ProcessOutput) -> Option<ErrorKind> {
        classify(output, TextEncoding::Utf8, Path::new("/usr/bin/latexpdf"))
            .err()
            .map(|e| e.kind())
    }

    #[test]
    fn lone_zero_on_stderr_still_fails_nonzero_exit() {
        let o = out("transcript", "0", 3);
        assert_eq!(kind(&o), Some(ErrorKind::NonZeroExit));
    }

    #[test]
    fn stderr_error_marker_fails_even_with_exit_zero() {
        let o = out("This is pdfTeX", "error occurred", 0);
        assert_eq!(kind(&o), Some(ErrorKind::CompilerReported));
    }

    #[test]
    fn marker_is_case_insensitive() {
        let o = out("transcript", "! LaTeX ERROR: File `foo.sty' not found.", 0);
        assert_eq!(kind(&o), Some(ErrorKind::CompilerReported));
    }

    #[test]
    fn marker_at_start_of_stderr_counts() {
        let o = out("transcript", "Error: undefined control sequence", 0);
        assert_eq!(kind(&o), Some(ErrorKind::CompilerReported));
    }

    #[test]
    fn reported_error_carries_raw_stderr() {
        let o = out("x", "Fatal error: emergency stop", 1);
        match classify(&o, TextEncoding::Utf8, Path::new("tex")) {
            Err(RenderError::CompilerReported { stderr }) => {
                assert_eq!(stderr, "Fatal error: emergency stop")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn empty_stdout_is_no_output() {
        let o = out("", "", 0);
        assert_eq!(kind(&o), Some(ErrorKind::NoOutput));
    }

    #[test]
    fn error_marker_wins_over_empty_stdout() {
        let o = out("", "error", 0);
        assert_eq!(kind(&o), Some(ErrorKind::CompilerReported));
    }

    #[test]
    fn empty_stdout_wins_over_non_zero_exit() {
        let o = out("", "warning: font substituted", 2);
        assert_eq!(kind(&o), Some(ErrorKind::NoOutput));
    }

    #[test]
    fn non_zero_exit_with_stderr_fails() {
        let o = out("transcript", "segfault in kpathsea", 139);
        match classify(&o, TextEncoding::Utf8, Path::new("tex")) {
            Err(RenderError::NonZeroExit { exit_code, .. }) => assert_eq!(exit_code, 139),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn non_zero_exit_with_empty_stderr_is_success() {
        let o = out("Output written on x.pdf", "", 1);
        assert_eq!(kind(&o), None);
    }

    #[test]
    fn clean_run_is_success() {
        let o = out("Output written on x.pdf (1 page).", "", 0);
        assert_eq!(kind(&o), None);
    }

    #[test]
    fn stderr_noise_without_marker_and_exit_zero_is_success() {
        let o = out("transcript", "Warning: overfull hbox", 0);
        assert_eq!(kind(&o), None);
    }

    #[test]
    fn single_undecodable_byte_is_still_output() {
        let o = ProcessOutput {
            stdout: vec![0xE9],
            stderr: Vec::new(),
            exit_code: 0,
        };
        assert!(classify(&o, TextEncoding::Latin1, Path::new("tex")).is_ok());
        assert!(classify(&o, TextEncoding::Utf8, Path::new("tex")).is_ok());
    }
}
