//! One-shot JSON exchange with a child process
//!
//! The payload goes to the child's stdin, which is then closed. Stdout is
//! returned once the child exits with status 0. The whole exchange runs
//! under a timeout and the child is killed if it is dropped early.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not answer within {seconds}s")]
    Timeout { program: String, seconds: u64 },

    #[error("{program} exited with code {code:?}: {stderr}")]
    ExitStatus {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Pipe error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct JsonProcess {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl JsonProcess {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    fn name(&self) -> String {
        self.program.display().to_string()
    }

    /// Run the program once with `payload` on stdin and return its stdout.
    pub async fn exchange(&self, payload: &[u8]) -> Result<Vec<u8>, ProcessError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: self.name(),
                source,
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let mut stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let mut stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        let exchange = async {
            stdin.write_all(payload).await?;
            drop(stdin);

            let mut out = Vec::new();
            let mut err = Vec::new();
            let (read_out, read_err) =
                tokio::join!(stdout.read_to_end(&mut out), stderr.read_to_end(&mut err));
            read_out?;
            read_err?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, out, err))
        };

        let (status, out, err) = match timeout(self.timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ProcessError::Timeout {
                    program: self.name(),
                    seconds: self.timeout.as_secs(),
                })
            }
        };

        if !status.success() {
            return Err(ProcessError::ExitStatus {
                program: self.name(),
                code: status.code(),
                stderr: String::from_utf8_lossy(&err).trim().to_string(),
            });
        }
        Ok(out)
    }
}

fn missing_pipe(name: &str) -> ProcessError {
    ProcessError::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("{} was not captured", name),
    ))
}

/// Drive `future` to completion from synchronous code.
///
/// Reuses the ambient runtime when called from a blocking task of one, and
/// starts a throwaway current-thread runtime otherwise. Must not be called
/// from inside an async task.
pub fn block_on<F: Future>(future: F) -> std::io::Result<F::Output> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Ok(handle.block_on(future)),
        Err(_) => Ok(tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(future)),
    }
}
