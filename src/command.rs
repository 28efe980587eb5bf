//! Command builder: turn an [`EngineConfig`] into a compiler invocation.
//!
//! The compiler is always spawned from an argv vector, never through a shell,
//! so option values cannot inject commands. [`CompilerCommand::command_line`]
//! renders the same invocation as one shell-escaped string for logs,
//! `--print-command`, and error reports.

use crate::config::{CompilerOptions, EngineConfig, OptionValue, DEFAULT_BINARY};
use crate::error::RenderError;
use crate::fs::FileSystem;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One `--name [value]` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerFlag {
    pub name: String,
    pub value: Option<String>,
}

/// A fully resolved compiler invocation, minus the staged file argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerCommand {
    pub program: PathBuf,
    pub flags: Vec<CompilerFlag>,
}

impl CompilerCommand {
    /// Flags flattened into argv form.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.flags.len() * 2);
        for flag in &self.flags {
            args.push(format!("--{}", flag.name));
            if let Some(value) = &flag.value {
                args.push(value.clone());
            }
        }
        args
    }

    /// Binary path followed by the flags, with every value shell-escaped.
    pub fn command_line(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for flag in &self.flags {
            line.push_str(" --");
            line.push_str(&flag.name);
            if let Some(value) = &flag.value {
                line.push(' ');
                line.push_str(&shell_escape(value));
            }
        }
        line
    }

    /// [`Self::command_line`] with the staged file appended.
    pub fn command_line_with(&self, staged: &Path) -> String {
        format!(
            "{} {}",
            self.command_line(),
            shell_escape(&staged.to_string_lossy())
        )
    }

    /// Full argv for the child: flags, then the staged file.
    pub fn argv_with(&self, staged: &Path) -> Vec<OsString> {
        let mut argv: Vec<OsString> = self.args().into_iter().map(OsString::from).collect();
        argv.push(staged.as_os_str().to_os_string());
        argv
    }
}

/// Effective compiler path for this call: the config override, else
/// [`DEFAULT_BINARY`].
pub fn resolve_binary(config: &EngineConfig) -> PathBuf {
    config
        .binary
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BINARY))
}

/// Build the flag list from `options`, in their iteration order.
///
/// Empty values are skipped, `true` becomes a bare `--key`, and any other
/// value becomes `--key <value>`.
pub fn build_command(binary: impl Into<PathBuf>, options: &CompilerOptions) -> CompilerCommand {
    let flags = options
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| CompilerFlag {
            name: key.to_string(),
            value: match value {
                OptionValue::Value(v) => Some(v.clone()),
                _ => None,
            },
        })
        .collect();
    CompilerCommand {
        program: binary.into(),
        flags,
    }
}

/// Check preconditions and build the command.
///
/// Fails with a configuration error, before anything is spawned, when the
/// binary is not executable or the output directory cannot be created.
/// Returns the command together with the (now existing) output directory.
pub async fn prepare(
    config: &EngineConfig,
    fs: &dyn FileSystem,
) -> Result<(CompilerCommand, PathBuf), RenderError> {
    let binary = resolve_binary(config);
    if !fs.is_executable(&binary).await {
        return Err(RenderError::BinaryNotExecutable { path: binary });
    }

    let output_dir = config.output_directory().ok_or_else(|| {
        RenderError::InvalidConfig("option 'output-directory' must name a directory".into())
    })?;
    if !fs.is_dir(&output_dir).await {
        debug!("Creating output directory {}", output_dir.display());
        fs.create_dir_all(&output_dir)
            .await
            .map_err(|source| RenderError::OutputDirectoryUnavailable {
                path: output_dir.clone(),
                source,
            })?;
    }

    let command = build_command(binary, &config.options);
    debug!("Compiler command: {}", command.command_line());
    Ok((command, output_dir))
}

/// Quote `value` for a POSIX shell: wrap in single quotes and rewrite each
/// embedded `'` as `'\''`.
pub fn shell_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('\'');
    for c in value.chars() {
        if c == '\'' {
            escaped.push_str("'\\''");
        } else {
            escaped.push(c);
        }
    }
    escaped.push('\'');
    escaped
}
