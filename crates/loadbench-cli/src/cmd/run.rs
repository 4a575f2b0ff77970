use anyhow::Context;
use loadbench_core::{
    config::Config,
    orchestrator::{Collaborators, CycleOptions, CycleOutcome, CyclePlan, CycleReport, Orchestrator},
    preflight,
    types::Stage,
};
use std::path::Path;

use crate::cmd::{exit_status, RunOverrides};
use crate::output::{print_json, print_table};

pub fn run(
    root: &Path,
    overrides: &RunOverrides,
    dry_run: bool,
    force: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut config = Config::load(root).context("failed to load config")?;
    overrides.apply(&mut config);
    let plan = CyclePlan::from_config(&config, root).context("invalid configuration")?;

    if dry_run {
        return print_plan(&plan, &config, json);
    }

    preflight::check_programs(plan.required_programs()).context("preflight failed")?;

    let collaborators = Collaborators::system(root, &config.sync);
    let mut orchestrator = Orchestrator::new(plan, collaborators, CycleOptions { force });
    let result = orchestrator.run_cycle();

    let report = orchestrator.report();
    if json {
        print_json(report)?;
    } else {
        print_summary(report);
    }

    result.with_context(|| format!("cycle failed at stage '{}'", orchestrator.stage()))?;
    exit_status(report.process_exit_code())
}

// ---------------------------------------------------------------------------
// --dry-run
// ---------------------------------------------------------------------------

fn print_plan(plan: &CyclePlan, config: &Config, json: bool) -> anyhow::Result<()> {
    let mut rows: Vec<(Stage, String)> = vec![
        (Stage::CheckSync, sync_description(config)),
        (
            Stage::Drain,
            format!("SIGTERM processes matching '{}'", plan.data_sender_pattern),
        ),
        (
            Stage::Drain,
            format!("wait {}s", plan.grace_period.as_secs()),
        ),
        (
            Stage::Drain,
            format!("SIGKILL processes matching '{}'", plan.load_generator_pattern),
        ),
    ];
    rows.extend(
        plan.commands()
            .into_iter()
            .map(|(stage, spec)| (stage, spec.to_string())),
    );

    if json {
        let items: Vec<serde_json::Value> = rows
            .iter()
            .map(|(stage, step)| serde_json::json!({ "stage": stage, "step": step }))
            .collect();
        return print_json(&items);
    }

    print_table(
        &["STAGE", "STEP"],
        rows.into_iter()
            .map(|(stage, step)| vec![stage.to_string(), step])
            .collect(),
    );
    Ok(())
}

fn sync_description(config: &Config) -> String {
    let target = match &config.sync.branch {
        Some(b) => format!("{}/{}", config.sync.remote, b),
        None => "upstream".to_string(),
    };
    format!(
        "git fetch {}; fast-forward HEAD to {target} if it differs",
        config.sync.remote
    )
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

fn print_summary(report: &CycleReport) {
    if let Some(rev) = &report.revisions {
        println!("revision: {} -> {}", rev.local, rev.remote);
    }
    match report.outcome {
        CycleOutcome::Skipped => {
            println!("Checkout is current; nothing to do.");
            return;
        }
        CycleOutcome::Failed => {
            if let Some(stage) = report.failed_stage {
                println!("Cycle failed at stage '{stage}'.");
            }
        }
        CycleOutcome::Pending | CycleOutcome::Completed => {}
    }
    if let Some(drain) = &report.drain {
        println!(
            "drain: {} graceful, {} forced ({} already gone), grace period {}s",
            drain.graceful.signaled.len(),
            drain.forced.signaled.len(),
            drain.graceful.vanished + drain.forced.vanished,
            drain.grace_period_secs
        );
    }
    if let Some(pid) = report.data_sender_pid {
        println!("data sender: pid {pid}");
    }
    if report.degraded {
        println!("warning: data sender did not start; results are partial");
    }
    if let Some(code) = report.exit_code {
        println!("load generator exit code: {code}");
    }
    if let Some(secs) = report.duration_secs() {
        println!("duration: {secs:.1}s");
    }
}
