//! The benchmark cycle state machine.
//!
//! [`CyclePlan`] resolves a [`Config`] against the checkout into the exact
//! commands a cycle will run. [`Orchestrator`] walks
//! `IDLE → CHECK_SYNC → (SKIP | DRAIN → REBUILD → RESTART_NODE → WARMUP → LAUNCH) → DONE`
//! once, using the collaborators it was built with.

pub mod report;


use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::{BackgroundHandle, CommandRunner, CommandSpec, SystemRunner};
use crate::config::{Config, SyncConfig};
use crate::error::{BenchError, Result};
use crate::launcher::BenchmarkLauncher;
use crate::paths;
use crate::preflight::BASE_PROGRAMS;
use crate::process::{
    DrainSummary, KillCommand, Pgrep, ProcessController, ProcessFinder, ProcessSignaler, Sleeper,
    ThreadSleeper,
};
use crate::sync_gate::{Git, RevisionControl, SyncGate};
use crate::types::{BenchmarkRunConfig, NodeNetworkHandle, Stage};

pub use report::{CycleOutcome, CycleReport};

// ---------------------------------------------------------------------------
// CyclePlan
// ---------------------------------------------------------------------------

/// Fully resolved inputs of one cycle: every path absolute, every command
/// built. Constructed once and owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct CyclePlan {
    pub root: PathBuf,
    pub data_sender_pattern: String,
    pub load_generator_pattern: String,
    pub grace_period: Duration,
    pub stop_network: CommandSpec,
    pub build: CommandSpec,
    pub node: NodeNetworkHandle,
    pub start_node: CommandSpec,
    pub data_sender: CommandSpec,
    pub data_sender_log: Option<PathBuf>,
    pub prepare_env: Vec<CommandSpec>,
    pub benchmark: BenchmarkRunConfig,
}

impl CyclePlan {
    pub fn from_config(config: &Config, root: &Path) -> Result<Self> {
        config.ensure_valid()?;
        let in_root = |spec: CommandSpec| spec.current_dir(root);

        let node = NodeNetworkHandle {
            binary_path: paths::resolve(root, &config.node.binary_path)?,
            home: paths::resolve(root, &config.node.home)?,
            num_nodes: config.node.num_nodes,
            num_shards: config.node.num_shards,
            override_state: config.node.override_state,
        };
        let mut start_node = CommandSpec::from_argv(&config.node.start_command)?
            .arg("--binary-path")
            .arg(node.binary_path.to_string_lossy())
            .arg("--home")
            .arg(node.home.to_string_lossy())
            .args(["--num-nodes".to_string(), node.num_nodes.to_string()])
            .args(["--num-shards".to_string(), node.num_shards.to_string()]);
        if node.override_state {
            start_node = start_node.arg("--override");
        }

        let venv = paths::resolve(root, &config.warmup.venv_dir)?;
        let pip = paths::venv_bin(&venv, "pip").to_string_lossy().into_owned();
        let mut prepare_env = vec![in_root(
            CommandSpec::new(config.warmup.python.as_str())
                .args(["-m", "venv"])
                .arg(venv.to_string_lossy()),
        )];
        for req in &config.warmup.requirements {
            prepare_env.push(in_root(
                CommandSpec::new(pip.as_str())
                    .args(["install", "--quiet", "-r"])
                    .arg(paths::resolve(root, req)?.to_string_lossy()),
            ));
        }
        if !config.warmup.packages.is_empty() {
            prepare_env.push(in_root(
                CommandSpec::new(pip.as_str())
                    .args(["install", "--quiet"])
                    .args(config.warmup.packages.iter().cloned()),
            ));
        }

        let bench = &config.benchmark;
        let program = if bench.program.contains('/') {
            paths::resolve(root, Path::new(&bench.program))?
        } else {
            paths::venv_bin(&venv, &bench.program)
        };
        let benchmark = BenchmarkRunConfig {
            program,
            endpoint: bench.endpoint.clone(),
            locustfile: paths::resolve(root, &bench.locustfile)?,
            credential_path: paths::resolve(root, &config.credential_path())?,
            credential_env: bench.credential_env.clone(),
            users: bench.users,
            spawn_rate: bench.spawn_rate,
            processes: bench.processes,
            headless: bench.headless,
        };

        let data_sender_log = match &config.warmup.data_sender_log {
            Some(p) => Some(paths::resolve(root, p)?),
            None => None,
        };

        Ok(Self {
            root: root.to_path_buf(),
            data_sender_pattern: config.drain.data_sender_pattern.clone(),
            load_generator_pattern: config.drain.load_generator_pattern.clone(),
            grace_period: Duration::from_secs(config.drain.grace_period_secs),
            stop_network: in_root(CommandSpec::from_argv(&config.drain.stop_network)?),
            build: in_root(CommandSpec::from_argv(&config.build.command)?),
            node,
            start_node: in_root(start_node),
            data_sender: in_root(CommandSpec::from_argv(&config.warmup.data_sender)?),
            data_sender_log,
            prepare_env,
            benchmark,
        })
    }

    /// Programs that must exist before the cycle starts. Venv executables
    /// are created during warm-up and are not included.
    pub fn required_programs(&self) -> Vec<&str> {
        let mut programs: Vec<&str> = BASE_PROGRAMS.to_vec();
        let configured = [
            &self.stop_network,
            &self.build,
            &self.start_node,
            &self.data_sender,
        ]
        .into_iter()
        .chain(self.prepare_env.first())
        .map(|spec| spec.program.as_str());
        for program in configured {
            if !programs.contains(&program) {
                programs.push(program);
            }
        }
        programs
    }

    /// Every external command in execution order, tagged with its stage.
    pub fn commands(&self) -> Vec<(Stage, CommandSpec)> {
        let mut out = vec![
            (Stage::Drain, self.stop_network.clone()),
            (Stage::Rebuild, self.build.clone()),
            (Stage::RestartNode, self.start_node.clone()),
            (Stage::Warmup, self.data_sender.clone()),
        ];
        out.extend(self.prepare_env.iter().cloned().map(|c| (Stage::Warmup, c)));
        out.push((Stage::Launch, BenchmarkLauncher::command(&self.benchmark)));
        out
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// The external world, one trait object per seam.
pub struct Collaborators {
    pub revisions: Box<dyn RevisionControl>,
    pub finder: Box<dyn ProcessFinder>,
    pub signaler: Box<dyn ProcessSignaler>,
    pub sleeper: Box<dyn Sleeper>,
    pub runner: Box<dyn CommandRunner>,
}

impl Collaborators {
    pub fn system(root: &Path, sync: &SyncConfig) -> Self {
        Self {
            revisions: Box::new(Git::new(root, sync.remote.clone(), sync.branch.clone())),
            finder: Box::new(Pgrep),
            signaler: Box::new(KillCommand),
            sleeper: Box::new(ThreadSleeper),
            runner: Box::new(SystemRunner),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct CycleOptions {
    /// Run the full cycle even when the checkout is already current.
    pub force: bool,
}

pub struct Orchestrator {
    plan: CyclePlan,
    options: CycleOptions,
    gate: SyncGate,
    processes: ProcessController,
    runner: Box<dyn CommandRunner>,
    stage: Stage,
    report: CycleReport,
    data_sender: Option<BackgroundHandle>,
}

impl Orchestrator {
    pub fn new(plan: CyclePlan, collaborators: Collaborators, options: CycleOptions) -> Self {
        let Collaborators {
            revisions,
            finder,
            signaler,
            sleeper,
            runner,
        } = collaborators;
        Self {
            plan,
            options,
            gate: SyncGate::new(revisions),
            processes: ProcessController::new(finder, signaler, sleeper),
            runner,
            stage: Stage::Idle,
            report: CycleReport::new(),
            data_sender: None,
        }
    }

    pub fn plan(&self) -> &CyclePlan {
        &self.plan
    }

    /// Current state; after a fatal error, the stage that failed.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn report(&self) -> &CycleReport {
        &self.report
    }

    /// The data sender started during warm-up, if it started.
    pub fn data_sender(&mut self) -> Option<&mut BackgroundHandle> {
        self.data_sender.as_mut()
    }

    /// Run one cycle to DONE, or stop at the first fatal error.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        if self.stage != Stage::Idle {
            return Err(BenchError::CycleAlreadyRun(self.stage));
        }
        match self.run_stages() {
            Ok(()) => Ok(self.report.clone()),
            Err(e) => {
                tracing::error!(stage = %self.stage, error = %e, "cycle aborted");
                self.report.failed_stage = Some(self.stage);
                self.report.error = Some(e.to_string());
                self.report.finish(CycleOutcome::Failed);
                Err(e)
            }
        }
    }

    fn run_stages(&mut self) -> Result<()> {
        self.advance(Stage::CheckSync);
        if !self.check_sync()? {
            self.advance(Stage::Skip);
            self.report.finish(CycleOutcome::Skipped);
            self.advance(Stage::Done);
            return Ok(());
        }

        self.advance(Stage::Drain);
        let drained = self.drain_previous_run();
        self.report.drain = Some(drained);
        self.report.network_stopped = self.stop_node_network();

        self.advance(Stage::Rebuild);
        self.rebuild()?;

        self.advance(Stage::RestartNode);
        self.restart_node()?;
        self.report.node = Some(self.plan.node.clone());

        self.advance(Stage::Warmup);
        self.start_data_sender();
        self.prepare_environment()?;

        self.advance(Stage::Launch);
        let code = BenchmarkLauncher::new(&*self.runner).run(&self.plan.benchmark)?;
        self.report.exit_code = Some(code);
        self.report.finish(CycleOutcome::Completed);
        self.advance(Stage::Done);
        Ok(())
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal transition {} -> {}",
            self.stage,
            next
        );
        tracing::info!(from = %self.stage, stage = %next, "entering stage");
        self.stage = next;
        self.report.stages.push(next);
    }

    fn check_sync(&mut self) -> Result<bool> {
        let decision = self.gate.sync()?;
        let proceed = decision.proceed() || self.options.force;
        if !decision.proceed() && self.options.force {
            tracing::info!("checkout is current; continuing because of --force");
        }
        self.report.revisions = Some(decision.revisions().clone());
        Ok(proceed)
    }

    /// Gracefully stop data senders, wait the grace period, then kill load
    /// generators. Never fails.
    pub fn drain_previous_run(&self) -> DrainSummary {
        self.processes.drain(
            &self.plan.data_sender_pattern,
            &self.plan.load_generator_pattern,
            self.plan.grace_period,
        )
    }

    /// Best-effort stop of the previous node network.
    pub fn stop_node_network(&self) -> bool {
        match self.runner.run(&self.plan.stop_network) {
            Ok(0) => true,
            Ok(code) => {
                tracing::warn!(command = %self.plan.stop_network, exit_code = code, "node network stop failed; continuing");
                false
            }
            Err(e) => {
                tracing::warn!(command = %self.plan.stop_network, error = %e, "node network stop failed; continuing");
                false
            }
        }
    }

    fn rebuild(&self) -> Result<()> {
        let code = self.runner.run(&self.plan.build)?;
        if code != 0 {
            return Err(BenchError::BuildFailed { code });
        }
        tracing::info!(command = %self.plan.build, "build succeeded");
        Ok(())
    }

    fn restart_node(&self) -> Result<()> {
        let code = self.runner.run(&self.plan.start_node)?;
        if code != 0 {
            return Err(BenchError::NodeStartFailed { code });
        }
        tracing::info!(
            home = %self.plan.node.home.display(),
            num_nodes = self.plan.node.num_nodes,
            num_shards = self.plan.node.num_shards,
            "node network started"
        );
        Ok(())
    }

    /// Fire-and-forget. A sender that fails to start degrades the run but
    /// does not stop it.
    fn start_data_sender(&mut self) {
        let log = self.plan.data_sender_log.as_deref();
        match self.runner.spawn_background(&self.plan.data_sender, log) {
            Ok(handle) => {
                tracing::info!(pid = %handle.pid(), "data sender started");
                self.report.data_sender_pid = Some(handle.pid());
                self.data_sender = Some(handle);
            }
            Err(e) => {
                tracing::warn!(command = %self.plan.data_sender, error = %e, "data sender failed to start; run is degraded");
                self.report.degraded = true;
            }
        }
    }

    fn prepare_environment(&self) -> Result<()> {
        for spec in &self.plan.prepare_env {
            let code = self.runner.run(spec)?;
            if code != 0 {
                return Err(BenchError::EnvironmentPrep {
                    command: spec.to_string(),
                    code,
                });
            }
        }
        Ok(())
    }
}
