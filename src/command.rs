//! Bounded invocation of external query tools

use std::time::Duration;
use tokio::process::Command;

/// Run `program args..` and return its stdout when it exits successfully
///
/// Spawn failures, non-zero exits and timeouts are logged and yield `None`.
/// The child is killed if the timeout elapses.
pub async fn query_tool(program: &str, args: &[&str], timeout: Duration) -> Option<String> {
    let mut cmd = Command::new(program);
    cmd.args(args).kill_on_drop(true);

    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(Ok(output)) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(
                program = %program,
                status = %output.status,
                stderr = %stderr.trim(),
                "Query tool exited with failure"
            );
            None
        }
        Ok(Err(e)) => {
            tracing::debug!(program = %program, error = %e, "Failed to run query tool");
            None
        }
        Err(_) => {
            tracing::warn!(
                program = %program,
                timeout_secs = timeout.as_secs(),
                "Query tool timed out"
            );
            None
        }
    }
}
