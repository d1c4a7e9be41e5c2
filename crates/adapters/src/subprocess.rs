// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Default timeout for command consumers.
pub const COMMAND_CONSUMER_TIMEOUT: Duration = Duration::from_secs(60);

/// Run a subprocess with `input` on stdin and a timeout.
///
/// Stdout and stderr are captured. The child is killed if the timeout
/// elapses (the tokio `Child` is dropped with `kill_on_drop`).
pub async fn run_with_input(
    mut cmd: Command,
    input: &[u8],
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let mut child = cmd
        .spawn()
        .map_err(|e| format!("{} failed: {}", description, e))?;

    if let Some(mut stdin) = child.stdin.take() {
        let input = input.to_vec();
        // Separate task so a child that writes before reading cannot deadlock
        tokio::spawn(async move {
            // A broken pipe only means the command ignored its input
            let _ = stdin.write_all(&input).await;
        });
    }

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
