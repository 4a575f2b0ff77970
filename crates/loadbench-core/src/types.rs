use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    CheckSync,
    Skip,
    Drain,
    Rebuild,
    RestartNode,
    Warmup,
    Launch,
    Done,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::CheckSync => "check_sync",
            Stage::Skip => "skip",
            Stage::Drain => "drain",
            Stage::Rebuild => "rebuild",
            Stage::RestartNode => "restart_node",
            Stage::Warmup => "warmup",
            Stage::Launch => "launch",
            Stage::Done => "done",
        }
    }

    /// Legal successor states. `Done` is terminal.
    pub fn successors(self) -> &'static [Stage] {
        match self {
            Stage::Idle => &[Stage::CheckSync],
            Stage::CheckSync => &[Stage::Skip, Stage::Drain],
            Stage::Skip => &[Stage::Done],
            Stage::Drain => &[Stage::Rebuild],
            Stage::Rebuild => &[Stage::RestartNode],
            Stage::RestartNode => &[Stage::Warmup],
            Stage::Warmup => &[Stage::Launch],
            Stage::Launch => &[Stage::Done],
            Stage::Done => &[],
        }
    }

    pub fn can_advance_to(self, next: Stage) -> bool {
        self.successors().contains(&next)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ProcessId / Signal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    /// Graceful stop; the target may flush before exiting.
    Term,
    /// Forced stop.
    Kill,
}

impl Signal {
    /// Name as accepted by `kill -<NAME>`.
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Term => "TERM",
            Signal::Kill => "KILL",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIG{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RevisionPair
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionPair {
    pub local: String,
    pub remote: String,
}

impl RevisionPair {
    /// Exact-equality comparison; no prefix or ancestry matching.
    pub fn is_current(&self) -> bool {
        self.local == self.remote
    }
}

// ---------------------------------------------------------------------------
// ManagedProcess
// ---------------------------------------------------------------------------

/// An external process discovered by pattern and asked to stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedProcess {
    pub pattern: String,
    pub pid: ProcessId,
    pub signal: Signal,
}

// ---------------------------------------------------------------------------
// BenchmarkRunConfig
// ---------------------------------------------------------------------------

/// Everything the load generator is launched with. Built once per cycle and
/// only ever handed out by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRunConfig {
    /// Load generator executable (usually inside the prepared venv).
    pub program: PathBuf,
    pub endpoint: String,
    pub locustfile: PathBuf,
    pub credential_path: PathBuf,
    /// Environment variable the credential path is exported under.
    pub credential_env: String,
    pub users: u32,
    pub spawn_rate: u32,
    pub processes: u32,
    pub headless: bool,
}

// ---------------------------------------------------------------------------
// NodeNetworkHandle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeNetworkHandle {
    pub binary_path: PathBuf,
    pub home: PathBuf,
    pub num_nodes: u32,
    pub num_shards: u32,
    pub override_state: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
