//! Pipeline stages for TeX-to-PDF rendering.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the engine is just the sequence.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ stage ──▶ run ──▶ classify ──▶ (read pdf) ──▶ cleanup
//! (path/URL) (sha256)  (TeX)   (streams)                  (.aux .log .pdf)
//! ```
//!
//! 1. [`input`]: resolve a path, URL or stdin to source text (CLI only)
//! 2. [`stage`]: write the source to `<output-dir>/<sha256>`
//! 3. [`run`]: spawn the compiler, feed stdin, drain stdout/stderr
//! 4. [`classify`]: turn exit code and streams into success or an error
//! 5. [`cleanup`]: delete the staged file and the compiler's artifacts
//!
//! [`diagnostics`] sits beside the flow: it reads the transcript for the
//! render report but never changes the outcome.

pub mod classify;
pub mod cleanup;
pub mod diagnostics;
pub mod input;
pub mod run;
pub mod stage;
