//! Command execution behind a narrow runner trait
//!
//! All external CLI work goes through [`CommandRunner`] so orchestration
//! logic can be tested against a scripted runner and the CLI can later be
//! replaced by a native API client without touching the engine.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{PlatformError, Result};

/// A single external command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute
    pub program: String,

    /// Arguments, in order
    pub args: Vec<String>,

    /// Working directory; the caller's current directory when absent
    pub cwd: Option<PathBuf>,

    /// Hard execution timeout
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: Duration::from_secs(120),
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

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The full command line, for logging and assertions.
    pub fn display_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured output of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Captured stdout
    pub stdout: String,

    /// Captured stderr
    pub stderr: String,

    /// Process exit code; -1 when terminated by a signal
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Successful output with the given stdout, for tests and dry runs.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    /// Failed output with the given stderr and exit code.
    pub fn failed(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }
}

/// Executes external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion, capturing its output.
    ///
    /// A non-zero exit code is a successful `run` returning a failed
    /// [`CommandOutput`]; errors are reserved for spawn failures, stream
    /// I/O problems and timeouts.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runner backed by a real subprocess
///
/// The child is spawned with piped stdio and killed if it outlives the
/// spec's timeout.
#[derive(Debug, Default, Clone)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        debug!(command = %spec.display_line(), "spawning command");

        let child = cmd.spawn().map_err(|source| PlatformError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        // Dropping the future on timeout kills the child via kill_on_drop.
        let output = match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(PlatformError::Io)?,
            Err(_) => {
                warn!(
                    command = %spec.display_line(),
                    timeout_secs = spec.timeout.as_secs(),
                    "command timed out"
                );
                return Err(PlatformError::Timeout {
                    program: spec.program.clone(),
                    timeout_secs: spec.timeout.as_secs(),
                });
            }
        };

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

/// Scripted runner for tests
///
/// Returns queued results in order and records every invocation. When the
/// queue is empty it returns an empty successful output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    queue: Mutex<VecDeque<Result<CommandOutput>>>,
    invocations: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next result to return.
    pub fn push(&self, result: Result<CommandOutput>) {
        self.queue
            .lock()
            .expect("scripted runner queue poisoned")
            .push_back(result);
    }

    /// Queue a successful output with the given stdout.
    pub fn push_ok(&self, stdout: impl Into<String>) {
        self.push(Ok(CommandOutput::ok(stdout)));
    }

    /// Queue a failed output with the given stderr.
    pub fn push_failed(&self, stderr: impl Into<String>) {
        self.push(Ok(CommandOutput::failed(stderr, 1)));
    }

    /// Every command run so far, in order.
    pub fn invocations(&self) -> Vec<CommandSpec> {
        self.invocations
            .lock()
            .expect("scripted runner invocations poisoned")
            .clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations
            .lock()
            .expect("scripted runner invocations poisoned")
            .len()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.invocations
            .lock()
            .expect("scripted runner invocations poisoned")
            .push(spec.clone());

        let next = self
            .queue
            .lock()
            .expect("scripted runner queue poisoned")
            .pop_front();

        match next {
            Some(result) => result,
            None => Ok(CommandOutput::default()),
        }
    }
}
