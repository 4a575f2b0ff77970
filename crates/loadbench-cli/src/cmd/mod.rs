pub mod check;
pub mod config;
pub mod drain;
pub mod launch;
pub mod run;

use clap::Args;
use loadbench_core::config::Config;

// ---------------------------------------------------------------------------
// RunOverrides — command-line values layered over loadbench.yaml
// ---------------------------------------------------------------------------

#[derive(Args, Debug, Default, Clone)]
pub struct RunOverrides {
    /// Concurrent simulated users
    #[arg(long, short = 'u')]
    pub users: Option<u32>,

    /// Users started per second
    #[arg(long, short = 'r')]
    pub spawn_rate: Option<u32>,

    /// Load generator worker processes
    #[arg(long)]
    pub processes: Option<u32>,

    /// Target RPC endpoint (host:port)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Run the load generator with its interactive web UI instead of headless
    #[arg(long)]
    pub interactive: bool,

    /// Seconds between graceful and forced stops during drain
    #[arg(long)]
    pub grace_period: Option<u64>,
}

impl RunOverrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(u) = self.users {
            config.benchmark.users = u;
        }
        if let Some(r) = self.spawn_rate {
            config.benchmark.spawn_rate = r;
        }
        if let Some(p) = self.processes {
            config.benchmark.processes = p;
        }
        if let Some(e) = &self.endpoint {
            config.benchmark.endpoint = e.clone();
        }
        if self.interactive {
            config.benchmark.headless = false;
        }
        if let Some(g) = self.grace_period {
            config.drain.grace_period_secs = g;
        }
    }
}

// ---------------------------------------------------------------------------
// CycleExit — the load generator's non-zero status, surfaced unchanged
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum CycleExit {
    LoadGenerator(i32),
}

impl CycleExit {
    pub fn exit_code(&self) -> i32 {
        match self {
            CycleExit::LoadGenerator(c) => *c,
        }
    }
}

impl std::fmt::Display for CycleExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleExit::LoadGenerator(code) => {
                write!(f, "load generator exited with code {code}")
            }
        }
    }
}

impl std::error::Error for CycleExit {}

/// `Ok` for a zero status, otherwise a [`CycleExit`] carrying it.
pub fn exit_status(code: i32) -> anyhow::Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(CycleExit::LoadGenerator(code).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_given_fields() {
        let mut cfg = Config::default();
        let o = RunOverrides {
            users: Some(20),
            interactive: true,
            ..Default::default()
        };
        o.apply(&mut cfg);
        assert_eq!(cfg.benchmark.users, 20);
        assert_eq!(cfg.benchmark.spawn_rate, 10);
        assert!(!cfg.benchmark.headless);
        assert_eq!(cfg.drain.grace_period_secs, 10);
    }

    #[test]
    fn nonzero_status_downcasts_to_cycle_exit() {
        assert!(exit_status(0).is_ok());
        let err = exit_status(3).unwrap_err();
        let exit = err.downcast_ref::<CycleExit>().unwrap();
        assert_eq!(exit.exit_code(), 3);
    }
}
