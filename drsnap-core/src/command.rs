//! External command execution with bounded, fixed-delay retry.
//!
//! Every call drsnap makes to the cloud provider is an external process. The
//! [`CommandRunner`] trait is the single seam for spawning one; the
//! [`CommandExecutor`] layers the retry loop on top and never raises on a
//! failed command. Callers inspect [`CommandResult::success`] themselves.

use std::fmt::{self, Display, Formatter};
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{Result, SnapError};

/// Exit code reported when a process could not be spawned or was killed by a signal.
pub const ABNORMAL_EXIT_CODE: i32 = -1;

/// A program plus its arguments. Arguments are passed verbatim, no shell is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }
}

impl Display for CommandSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Captured outcome of one process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Successful result with the given standard output.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::new(stdout, "", 0)
    }

    /// Failed result with the given exit code and standard error.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self::new("", stderr, exit_code)
    }

    /// Build a result from a finished process, trimming both streams.
    pub fn from_output(output: &Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code().unwrap_or(ABNORMAL_EXIT_CODE),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Spawns a single command and captures its output. No retry at this layer.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandSpec) -> Result<CommandResult>;
}

/// Runs commands as child processes on the tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandResult> {
        debug!(command = %command, "Spawning command");
        let output = tokio::process::Command::new(command.program())
            .args(command.arguments())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SnapError::spawn(e, command.to_string()))?;

        Ok(CommandResult::from_output(&output))
    }
}

/// How many times a command is attempted and how long to wait in between.
///
/// `max_attempts` counts every invocation, the first one included: a policy
/// with `max_attempts = 3` runs a persistently failing command exactly three
/// times. The delay is fixed, with no jitter and no growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    pub fn single_attempt() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

/// Runs commands through a [`CommandRunner`] with bounded retry.
#[derive(Clone)]
pub struct CommandExecutor {
    runner: Arc<dyn CommandRunner>,
}

impl CommandExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Executor backed by real child processes.
    pub fn process() -> Self {
        Self::new(Arc::new(ProcessRunner))
    }

    /// Run `command` until it exits zero or the policy's attempts are used up.
    ///
    /// Returns the first successful result, or the last failed one. A spawn
    /// failure counts as an attempt and is reported with [`ABNORMAL_EXIT_CODE`].
    pub async fn execute(&self, command: &CommandSpec, policy: RetryPolicy) -> CommandResult {
        let attempts = policy.max_attempts.max(1);
        let mut last = CommandResult::failed(ABNORMAL_EXIT_CODE, "command was not attempted");

        for attempt in 1..=attempts {
            let result = match self.runner.run(command).await {
                Ok(result) => result,
                Err(e) => CommandResult::failed(ABNORMAL_EXIT_CODE, e.to_string()),
            };

            if result.success() {
                debug!(command = %command, attempt, "Command succeeded");
                return result;
            }

            warn!(
                command = %command,
                attempt,
                max_attempts = attempts,
                exit_code = result.exit_code,
                stderr = %result.stderr,
                "Command failed"
            );
            last = result;

            if attempt < attempts {
                info!("Retrying in {} seconds...", policy.delay.as_secs_f32());
                tokio::time::sleep(policy.delay).await;
            }
        }

        last
    }
}

impl fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandExecutor").finish_non_exhaustive()
    }
}
