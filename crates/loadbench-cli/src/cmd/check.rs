use anyhow::Context;
use loadbench_core::{
    config::Config,
    sync_gate::{Git, SyncGate},
};
use std::path::Path;

use crate::output::print_json;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let git = Git::new(root, config.sync.remote.clone(), config.sync.branch.clone());
    let pair = SyncGate::new(Box::new(git))
        .status()
        .context("failed to resolve revisions")?;

    if json {
        let value = serde_json::json!({
            "local": pair.local,
            "remote": pair.remote,
            "current": pair.is_current(),
        });
        return print_json(&value);
    }

    println!("local:  {}", pair.local);
    println!("remote: {}", pair.remote);
    if pair.is_current() {
        println!("Checkout is current; a cycle would be skipped.");
    } else {
        println!("Checkout is stale; a cycle would update and rerun the benchmark.");
    }
    Ok(())
}
