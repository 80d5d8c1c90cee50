//! Subprocess execution for the tool-based detectors.
//!
//! Detectors never spawn processes directly; they go through
//! [`CommandRunner`] so tests can substitute canned output and so every
//! external tool runs under the same timeout.

use std::env;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::{Error, Result};

/// Default per-command timeout for detection tools.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(3);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the process exited successfully.
    pub success: bool,
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

impl CommandOutput {
    /// A successful result with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Runs external programs for detectors.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    /// Runs `program` with `args` and captures its output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DetectionUnavailable`] if the program cannot be
    /// spawned or does not finish before the timeout.
    fn run(&self, program: &str, args: &[&'static str]) -> Result<CommandOutput>;

    /// Returns `true` if `program` can be found on the search path.
    fn exists(&self, program: &str) -> bool;
}

/// Production runner built on `std::process` with a hard timeout.
///
/// A child still running at the deadline is killed and reaped.
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    /// Creates a runner with the given per-command timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns the configured timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

fn unavailable(program: &str, reason: impl Into<String>) -> Error {
    Error::DetectionUnavailable {
        method: program.to_string(),
        reason: reason.into(),
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&'static str]) -> Result<CommandOutput> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| unavailable(program, format!("failed to spawn: {e}")))?;

        // Pipes are drained on their own threads so a chatty child cannot
        // block on a full pipe buffer while we poll for exit.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(unavailable(
                        program,
                        format!("timed out after {}ms", self.timeout.as_millis()),
                    ));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(unavailable(program, format!("wait failed: {e}")));
                }
            }
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        Ok(CommandOutput {
            success: status.success(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    fn exists(&self, program: &str) -> bool {
        let Some(paths) = env::var_os("PATH") else {
            return false;
        };
        env::split_paths(&paths).any(|dir| is_executable(&dir, program))
    }
}

fn is_executable(dir: &Path, program: &str) -> bool {
    if dir.join(program).is_file() {
        return true;
    }
    cfg!(windows) && dir.join(format!("{program}.exe")).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_detection_unavailable() {
        let runner = SystemCommandRunner::default();
        let err = runner
            .run("berth-definitely-not-a-real-tool", &[])
            .unwrap_err();
        assert!(matches!(err, Error::DetectionUnavailable { .. }));
        assert!(!runner.exists("berth-definitely-not-a-real-tool"));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout() {
        let runner = SystemCommandRunner::default();
        let out = runner.run("sh", &["-c", "echo hello"]).unwrap();
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");
        assert!(runner.exists("sh"));
    }

    #[cfg(unix)]
    #[test]
    fn test_kills_on_timeout() {
        let runner = SystemCommandRunner::new(Duration::from_millis(100));
        let started = Instant::now();
        let err = runner.run("sleep", &["5"]).unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(format!("{err}").contains("timed out"));
    }

    #[test]
    fn test_mock_runner_returns_canned_output() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .times(1)
            .returning(|program, _args| match program {
                "ss" => Ok(CommandOutput::ok("tcp LISTEN 0 5 0.0.0.0:3000 0.0.0.0:*")),
                other => Err(unavailable(other, "not mocked")),
            });
        let out = runner.run("ss", &["-tulnpH"]).unwrap();
        assert!(out.stdout.contains("3000"));
    }
}
