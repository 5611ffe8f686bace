//! External command execution
//!
//! Every tool the build layer drives (git, gclient, gn, ninja, gsutil, helper
//! scripts) is described by a [`CommandSpec`] and executed through a
//! [`CommandRunner`]. A non-zero exit is fatal unless the command explicitly
//! tolerates failure, in which case the exit code is the answer.

use crate::error::{BuildError, BuildResult};
use crate::transform::Transform;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// A single external command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory
    pub cwd: PathBuf,
    /// Extra environment variables
    pub env: BTreeMap<String, String>,
    /// Treat a non-zero exit as an answer rather than an error
    pub tolerate_failure: bool,
    /// Stream stdout through a transformer instead of capturing it
    pub stream: Option<Transform>,
}

impl CommandSpec {
    /// Create a command run in `cwd`
    pub fn new(program: impl Into<String>, cwd: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.as_ref().to_path_buf(),
            env: BTreeMap::new(),
            tolerate_failure: false,
            stream: None,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Interpret the exit code instead of failing on it
    pub fn tolerate_failure(mut self) -> Self {
        self.tolerate_failure = true;
        self
    }

    /// Stream stdout through `transform`
    pub fn streamed(mut self, transform: Transform) -> Self {
        self.stream = Some(transform);
        self
    }

    /// Program and arguments as a shell-like string
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&shell_quote(arg));
        }
        line
    }
}

/// Single-quote `arg` unless every character is shell-safe
fn shell_quote(arg: &str) -> String {
    let is_safe = |c: char| c.is_ascii_alphanumeric() || "-_./=:,+@%^".contains(c);
    if !arg.is_empty() && arg.chars().all(is_safe) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', "'\\''"))
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Command execution result
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code
    pub exit_code: i32,
    /// Captured stdout (empty when streamed)
    pub stdout: String,
    /// Captured stderr (empty when streamed)
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn with_stdout(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code
    pub fn failed(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Self::default()
        }
    }

    /// Check if the command succeeded
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes [`CommandSpec`]s
pub trait CommandRunner {
    /// Run the command and report its exit code, whatever it is
    fn execute(&self, spec: &CommandSpec) -> BuildResult<CommandOutput>;

    /// Run the command, failing on a non-zero exit unless the command tolerates it
    fn run(&self, spec: &CommandSpec) -> BuildResult<CommandOutput> {
        let output = self.execute(spec)?;
        if !output.success() && !spec.tolerate_failure {
            return Err(BuildError::ToolInvocation {
                command: spec.command_line(),
                cwd: spec.cwd.clone(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}

/// Runs commands as child processes of this one
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(&spec.env);
        command
    }

    fn capture(spec: &CommandSpec) -> BuildResult<CommandOutput> {
        let output = Self::command(spec)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| spawn_error(spec, e))?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn stream(spec: &CommandSpec, transform: Transform) -> BuildResult<CommandOutput> {
        Self::stream_to(spec, transform, &mut io::stdout().lock())
    }

    fn stream_to(
        spec: &CommandSpec,
        transform: Transform,
        terminal: &mut impl Write,
    ) -> BuildResult<CommandOutput> {
        let mut child = Self::command(spec)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| spawn_error(spec, e))?;

        let pumped = match child.stdout.take() {
            Some(stdout) => pump_lines(stdout, transform, terminal, &spec.cwd),
            None => Ok(()),
        };
        if let Err(err) = pumped {
            // Reap the child; the error is what gets reported.
            let _ = child.kill();
            let _ = child.wait();
            return Err(err);
        }

        let status = child.wait().map_err(|e| BuildError::io(&spec.cwd, e))?;
        Ok(CommandOutput::failed(status.code().unwrap_or(1)))
    }
}

/// Copy `stdout` to `terminal` line by line through `transform`
fn pump_lines(
    stdout: impl io::Read,
    transform: Transform,
    terminal: &mut impl Write,
    cwd: &Path,
) -> BuildResult<()> {
    let mut transformer = transform.transformer();
    for line in BufReader::new(stdout).split(b'\n') {
        let line = line.map_err(|e| BuildError::io(cwd, e))?;
        let line = String::from_utf8_lossy(&line);
        if let Some(text) = transformer.process_line(line.trim_end_matches('\r')) {
            write_terminal(terminal, &text)?;
        }
    }
    if let Some(text) = transformer.finish() {
        write_terminal(terminal, &text)?;
    }
    Ok(())
}

impl CommandRunner for SystemRunner {
    fn execute(&self, spec: &CommandSpec) -> BuildResult<CommandOutput> {
        debug!(command = %spec, cwd = %spec.cwd.display(), "running command");
        match spec.stream {
            Some(transform) => Self::stream(spec, transform),
            None => Self::capture(spec),
        }
    }
}

fn write_terminal(terminal: &mut impl Write, text: &str) -> BuildResult<()> {
    terminal
        .write_all(text.as_bytes())
        .and_then(|_| terminal.flush())
        .map_err(|e| BuildError::io("<stdout>", e))
}

fn spawn_error(spec: &CommandSpec, error: io::Error) -> BuildError {
    if error.kind() == io::ErrorKind::NotFound {
        BuildError::ToolNotInstalled {
            binary: spec.program.clone(),
        }
    } else {
        BuildError::io(&spec.cwd, error)
    }
}
