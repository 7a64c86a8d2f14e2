//! External tool invocation.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::ToolError;

/// Captured result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code (`-1` when killed by a signal).
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ToolOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration_ms: 0,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// `invoke(tool, args) -> (exit_code, stdout, stderr)` plus a PATH lookup.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    fn is_present(&self, tool: &str) -> bool;

    async fn invoke(&self, tool: &str, args: &[String]) -> Result<ToolOutput, ToolError>;
}

/// Runs tools as child processes with a per-invocation timeout.
pub struct ProcessToolRunner {
    timeout: Duration,
}

impl ProcessToolRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ToolRunner for ProcessToolRunner {
    fn is_present(&self, tool: &str) -> bool {
        which::which(tool).is_ok()
    }

    async fn invoke(&self, tool: &str, args: &[String]) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        debug!(tool = %tool, args = ?args, "invoking tool");

        let child = Command::new(tool)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    ToolError::NotFound {
                        tool: tool.to_string(),
                    }
                } else {
                    ToolError::Spawn {
                        tool: tool.to_string(),
                        source,
                    }
                }
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ToolError::Timeout {
                tool: tool.to_string(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|source| ToolError::Spawn {
                tool: tool.to_string(),
                source,
            })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(tool = %tool, exit = ?output.status.code(), duration_ms, "tool finished");

        Ok(ToolOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> ProcessToolRunner {
        ProcessToolRunner::new(Duration::from_secs(30))
    }

    #[test]
    fn presence_lookup() {
        assert!(!runner().is_present("kbseed-definitely-not-a-real-tool"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let out = runner()
            .invoke("sh", &["-c".into(), "echo hello; echo oops >&2; exit 3".into()])
            .await
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(!out.success());
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn missing_tool_is_not_found() {
        let err = runner()
            .invoke("kbseed-definitely-not-a-real-tool", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_tool_times_out() {
        let err = ProcessToolRunner::new(Duration::from_millis(100))
            .invoke("sleep", &["5".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }
}
