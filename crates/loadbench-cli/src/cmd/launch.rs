use anyhow::Context;
use loadbench_core::{
    command::SystemRunner, config::Config, launcher::BenchmarkLauncher, orchestrator::CyclePlan,
};
use std::path::Path;

use crate::cmd::{exit_status, RunOverrides};

/// Launch against an already running node, using the venv a previous
/// cycle prepared.
pub fn run(root: &Path, overrides: &RunOverrides) -> anyhow::Result<()> {
    let mut config = Config::load(root).context("failed to load config")?;
    overrides.apply(&mut config);
    let plan = CyclePlan::from_config(&config, root).context("invalid configuration")?;

    let code = BenchmarkLauncher::new(&SystemRunner)
        .run(&plan.benchmark)
        .context("failed to launch load generator")?;
    exit_status(code)
}
