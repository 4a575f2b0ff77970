use anyhow::Context;
use loadbench_core::{
    config::Config,
    orchestrator::{Collaborators, CycleOptions, CyclePlan, Orchestrator},
    preflight,
};
use std::path::Path;

use crate::output::print_json;

pub fn run(root: &Path, grace_period: Option<u64>, json: bool) -> anyhow::Result<()> {
    let mut config = Config::load(root).context("failed to load config")?;
    if let Some(g) = grace_period {
        config.drain.grace_period_secs = g;
    }
    let plan = CyclePlan::from_config(&config, root).context("invalid configuration")?;
    preflight::check_programs(["pgrep", "kill", plan.stop_network.program.as_str()])
        .context("preflight failed")?;

    let orchestrator = Orchestrator::new(
        plan,
        Collaborators::system(root, &config.sync),
        CycleOptions::default(),
    );
    let summary = orchestrator.drain_previous_run();
    let network_stopped = orchestrator.stop_node_network();

    if json {
        let value = serde_json::json!({
            "drain": summary,
            "network_stopped": network_stopped,
        });
        return print_json(&value);
    }

    println!(
        "Sent SIGTERM to {} data sender(s), SIGKILL to {} load generator(s).",
        summary.graceful.signaled.len(),
        summary.forced.signaled.len()
    );
    if !network_stopped {
        println!("warning: node network stop command failed");
    }
    Ok(())
}
