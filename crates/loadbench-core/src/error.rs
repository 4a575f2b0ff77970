use crate::types::{ProcessId, Stage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("revision resolution failed during '{step}': {message}")]
    Revision { step: String, message: String },

    #[error("build failed with exit code {code}")]
    BuildFailed { code: i32 },

    #[error("node network start failed with exit code {code}")]
    NodeStartFailed { code: i32 },

    #[error("benchmark environment preparation failed at '{command}' (exit code {code})")]
    EnvironmentPrep { command: String, code: i32 },

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process table query failed for pattern '{pattern}': {message}")]
    ProcessTable { pattern: String, message: String },

    #[error("no such process: {0}")]
    NoSuchProcess(ProcessId),

    #[error("failed to signal process {pid}: {message}")]
    SignalFailed { pid: ProcessId, message: String },

    #[error("required program not found on PATH: {0}")]
    MissingProgram(String),

    #[error("cycle already ran (stopped at '{0}'); build a new orchestrator")]
    CycleAlreadyRun(Stage),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, BenchError>;
