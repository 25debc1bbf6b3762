// src/core/compile/process.rs
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Result, StrataError};

/// An external build command, run once per attempt
#[derive(Debug, Clone)]
pub struct BuildCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl BuildCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Wrapper scripts go through the platform shell so a missing exec bit does not matter
    pub fn script(path: &Path) -> Self {
        if cfg!(windows) {
            Self::new("cmd").arg("/c").arg(path)
        } else {
            Self::new("sh").arg(path)
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run in `cwd`. Non-zero exit or an elapsed timeout is an error; on timeout
    /// the child is killed when its future is dropped.
    pub async fn run(&self, cwd: &Path, timeout: Duration) -> Result<()> {
        info!("🔨 {} (in {})", self.display(), cwd.display());

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(result) => result.map_err(|e| {
                StrataError::BuildAttempt(format!("could not start {}: {}", self.display(), e))
            })?,
            Err(_) => {
                warn!("⏱️ {} timed out after {}s, killed", self.display(), timeout.as_secs());
                return Err(StrataError::BuildAttempt(format!(
                    "{} timed out after {}s",
                    self.display(),
                    timeout.as_secs()
                )));
            }
        };

        log_output(&output.stdout);
        log_output(&output.stderr);

        if output.status.success() {
            Ok(())
        } else {
            Err(StrataError::BuildAttempt(format!(
                "{} exited with {}",
                self.display(),
                output.status
            )))
        }
    }
}

fn log_output(bytes: &[u8]) {
    for line in String::from_utf8_lossy(bytes).lines() {
        debug!("[build] {}", line);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_success_and_failure() {
        let temp = tempfile::tempdir().unwrap();

        let ok = BuildCommand::new("sh").args(["-c", "exit 0"]);
        assert!(ok.run(temp.path(), Duration::from_secs(10)).await.is_ok());

        let failing = BuildCommand::new("sh").args(["-c", "echo broken >&2; exit 3"]);
        let err = failing.run(temp.path(), Duration::from_secs(10)).await.unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let temp = tempfile::tempdir().unwrap();
        let started = Instant::now();

        let slow = BuildCommand::new("sleep").arg("30");
        let err = slow.run(temp.path(), Duration::from_millis(200)).await.unwrap_err();

        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let temp = tempfile::tempdir().unwrap();
        let cmd = BuildCommand::new("definitely-not-a-build-tool-xyz");
        let err = cmd.run(temp.path(), Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, StrataError::BuildAttempt(_)));
    }
}
