//! Process execution utilities with timeout support
//!
//! Provides helpers for running the extraction backend with a hard deadline so
//! a hung probe cannot pin a handler task forever.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Failure of a timed child process
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to start process: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("process timed out after {0}s")]
    Timeout(u64),
}

/// Run an async Command with a timeout.
///
/// The child is killed when the deadline passes (`kill_on_drop`).
pub async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, ProcessError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(ProcessError::Spawn(e)),
        Err(_) => Err(ProcessError::Timeout(timeout.as_secs())),
    }
}
