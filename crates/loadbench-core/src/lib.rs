//! Core of the `loadbench` cycle runner.
//!
//! One cycle moves a long-running localnet benchmark from its previous state
//! to a fresh run against the newest source:
//!
//! ```text
//! IDLE → CHECK_SYNC ─┬─ SKIP ─────────────────────────────────────────┐
//!                    └─ DRAIN → REBUILD → RESTART_NODE → WARMUP → LAUNCH ─┴→ DONE
//! ```
//!
//! Every external collaborator (git, the process table, the build, the node
//! network, the load generator) sits behind a trait so the state machine in
//! [`orchestrator`] can be driven by fakes in tests.

pub mod command;
pub mod config;
pub mod error;
pub mod io;
pub mod launcher;
pub mod orchestrator;
pub mod paths;
pub mod preflight;
pub mod process;
pub mod sync_gate;
pub mod types;

pub use error::{BenchError, Result};
