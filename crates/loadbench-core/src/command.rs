//! External command invocation.
//!
//! Every subprocess the cycle runs (build, node control, environment setup,
//! the data sender, the load generator) is described by a [`CommandSpec`] and
//! executed through a [`CommandRunner`], so the orchestrator never touches
//! `std::process` directly.

use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use crate::error::{BenchError, Result};
use crate::types::ProcessId;

// ---------------------------------------------------------------------------
// CommandSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
        }
    }

    /// Build from a configured argv; the first element is the program.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| BenchError::InvalidConfig("empty command".into()))?;
        if program.trim().is_empty() {
            return Err(BenchError::InvalidConfig("empty program name".into()));
        }
        Ok(Self::new(program.clone()).args(args.iter().cloned()))
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Whether `flag` appears followed immediately by `value`.
    pub fn has_flag_value(&self, flag: &str, value: &str) -> bool {
        self.args
            .windows(2)
            .any(|w| w[0] == flag && w[1] == value)
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }
}

/// Shell-like rendering used in logs and `--dry-run` output.
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.env {
            write!(f, "{k}={v} ")?;
        }
        f.write_str(&self.program)?;
        for a in &self.args {
            write!(f, " {a}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// BackgroundHandle
// ---------------------------------------------------------------------------

/// A started, not-awaited background process. Kept only so it can be
/// stopped later on request; dropping the handle leaves the process running.
#[derive(Debug)]
pub struct BackgroundHandle {
    pid: ProcessId,
    child: Option<Child>,
}

impl BackgroundHandle {
    /// A handle with no owned child, e.g. for a process started elsewhere.
    pub fn detached(pid: ProcessId) -> Self {
        Self { pid, child: None }
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Forcibly stop the process if this handle owns it.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(child) = self.child.as_mut() {
            child.kill()?;
            child.wait()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

pub trait CommandRunner {
    /// Run to completion with inherited stdio and return the exit code.
    fn run(&self, spec: &CommandSpec) -> Result<i32>;

    /// Start without waiting. Output goes to `log` (appended) when given,
    /// otherwise it is discarded.
    fn spawn_background(&self, spec: &CommandSpec, log: Option<&Path>) -> Result<BackgroundHandle>;
}

/// Runs commands on the host via `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<i32> {
        tracing::debug!(command = %spec, "running");
        let status = spec
            .to_command()
            .stdin(Stdio::null())
            .status()
            .map_err(|source| BenchError::Spawn {
                program: spec.program.clone(),
                source,
            })?;
        Ok(exit_code(status))
    }

    fn spawn_background(&self, spec: &CommandSpec, log: Option<&Path>) -> Result<BackgroundHandle> {
        let mut cmd = spec.to_command();
        cmd.stdin(Stdio::null());
        match log {
            Some(path) => {
                let out = OpenOptions::new().create(true).append(true).open(path)?;
                let err = out.try_clone()?;
                cmd.stdout(out).stderr(err);
            }
            None => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }
        let child = cmd.spawn().map_err(|source| BenchError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
        tracing::debug!(command = %spec, pid = child.id(), "spawned in background");
        Ok(BackgroundHandle {
            pid: ProcessId(child.id()),
            child: Some(child),
        })
    }
}

/// Exit code as a shell would report it: the process's own code, or
/// `128 + signal` when it was killed by a signal.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }
    -1
}
