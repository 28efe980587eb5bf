//! Process runner: spawn the compiler and capture what it says.
//!
//! ## Why feed stdin and drain both pipes concurrently?
//!
//! The compiler gets the staged path as an argument *and* the source on
//! stdin. If we wrote all of stdin before reading stdout, a chatty compiler
//! would fill its stdout pipe, block, stop reading stdin, and deadlock both
//! processes. Writing stdin on its own future while `wait_with_output`
//! drains stdout/stderr avoids that.
//!
//! ## Deadline
//!
//! The whole exchange runs under `tokio::time::timeout`. On expiry the
//! in-flight future is dropped, which drops the `Child`; `kill_on_drop(true)`
//! then kills the compiler so a hung TeX run cannot block the caller forever.

use crate::command::CompilerCommand;
use crate::error::RenderError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Everything the compiler produced besides its files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit status; `-1` when the process was terminated by a signal.
    pub exit_code: i32,
}

impl ProcessOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Capability to run one compiler invocation.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` with `staged` appended as the last argument, write
    /// `stdin` to the child, and collect its output.
    async fn run(
        &self,
        command: &CompilerCommand,
        staged: &Path,
        stdin: &[u8],
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, RenderError>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        command: &CompilerCommand,
        staged: &Path,
        stdin: &[u8],
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, RenderError> {
        let mut child = Command::new(&command.program)
            .args(command.argv_with(staged))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderError::SpawnFailed {
                binary: command.program.clone(),
                source,
            })?;
        debug!("Spawned {} (pid {:?})", command.program.display(), child.id());

        let stdin_pipe = child.stdin.take();
        let input = stdin.to_vec();
        let feed = async move {
            if let Some(mut pipe) = stdin_pipe {
                match pipe.write_all(&input).await {
                    Ok(()) => {}
                    // The compiler only needs the path; it may exit without reading stdin.
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                        debug!("Compiler closed stdin early");
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
                pipe.shutdown().await.or_else(|e| {
                    if e.kind() == std::io::ErrorKind::BrokenPipe {
                        Ok(())
                    } else {
                        Err(e)
                    }
                })?;
            }
            Ok(())
        };

        let exchange = async move {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            fed.map_err(RenderError::ProcessIo)?;
            output.map_err(RenderError::ProcessIo)
        };

        let output = match timeout {
            Some(limit) => match tokio::time::timeout(limit, exchange).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(
                        "{} exceeded {}s deadline; killed",
                        command.program.display(),
                        limit.as_secs()
                    );
                    return Err(RenderError::Timeout {
                        secs: limit.as_secs(),
                    });
                }
            },
            None => exchange.await?,
        };

        Ok(ProcessOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}
