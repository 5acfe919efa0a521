//! Bounded execution of external tools (key generator, `keytool`).

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info};

const MAX_OUTPUT_BYTES: usize = 64 * 1024;

#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs `program` with `args`, killing it after `timeout`.
///
/// Arguments are never logged since they may carry passwords.
///
/// # Errors
/// Returns an error if the program cannot be spawned, times out, or exits
/// with a non-zero status. The error carries the captured stderr.
pub async fn run_tool(
    label: &str,
    program: &str,
    args: &[String],
    timeout: Duration,
) -> anyhow::Result<ToolOutput> {
    info!("Running {label} ({program})");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| anyhow::anyhow!("Failed to spawn {label} ({program}): {e}"))?;

    let stdout_handle = tokio::spawn(read_stream_limited(child.stdout.take()));
    let stderr_handle = tokio::spawn(read_stream_limited(child.stderr.take()));

    let Ok(status) = tokio::time::timeout(timeout, child.wait()).await else {
        child
            .kill()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to kill timed out {label}: {e}"))?;
        let _ = child.wait().await;
        let _ = stdout_handle.await;
        let _ = stderr_handle.await;
        anyhow::bail!("{label} timed out after {}s", timeout.as_secs());
    };
    let status = status.map_err(|e| anyhow::anyhow!("{label} failed: {e}"))?;
    let stdout = stdout_handle
        .await
        .map_err(|e| anyhow::anyhow!("{label} stdout task failed: {e}"))??;
    let stderr = stderr_handle
        .await
        .map_err(|e| anyhow::anyhow!("{label} stderr task failed: {e}"))??;

    if !stdout.trim().is_empty() {
        debug!("{label} stdout: {}", stdout.trim());
    }
    if !status.success() {
        anyhow::bail!("{label} exited with {status}: {}", stderr.trim());
    }
    Ok(ToolOutput { stdout, stderr })
}

async fn read_stream_limited<R>(stream: Option<R>) -> anyhow::Result<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let Some(mut stream) = stream else {
        return Ok(String::new());
    };

    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read tool output: {e}"))?;
        if read == 0 {
            break;
        }
        // Keep draining past the limit so the child never blocks on a full pipe.
        let remaining = MAX_OUTPUT_BYTES.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..read.min(remaining)]);
    }
    Ok(String::from_utf8_lossy(&buf).to_string())
}
