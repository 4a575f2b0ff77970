mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, RunOverrides};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "loadbench",
    about = "Run one localnet benchmark cycle: sync, drain, rebuild, restart, launch",
    version,
    propagate_version = true
)]
struct Cli {
    /// Benchmarked checkout (default: auto-detect from loadbench.yaml or .git/)
    #[arg(long, global = true, env = "LOADBENCH_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Debug-level logging
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one full cycle; exits with the load generator's status
    Run {
        /// Print every command the cycle would run, without running anything
        #[arg(long)]
        dry_run: bool,

        /// Run the cycle even if the checkout is already current
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        overrides: RunOverrides,
    },

    /// Compare local and remote revisions without updating the checkout
    Check,

    /// Stop data senders, load generators and the node network of a previous run
    Drain {
        /// Seconds to wait between graceful and forced stops
        #[arg(long)]
        grace_period: Option<u64>,
    },

    /// Launch only the load generator against the running node
    Launch {
        #[command(flatten)]
        overrides: RunOverrides,
    },

    /// Inspect, validate, or create loadbench.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        match &cli.command {
            Commands::Run { .. } | Commands::Drain { .. } | Commands::Launch { .. } => {
                tracing::Level::INFO
            }
            _ => tracing::Level::WARN,
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Run {
            dry_run,
            force,
            overrides,
        } => cmd::run::run(&root, &overrides, dry_run, force, cli.json),
        Commands::Check => cmd::check::run(&root, cli.json),
        Commands::Drain { grace_period } => cmd::drain::run(&root, grace_period, cli.json),
        Commands::Launch { overrides } => cmd::launch::run(&root, &overrides),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        if let Some(exit) = e.downcast_ref::<cmd::CycleExit>() {
            eprintln!("error: {exit}");
            std::process::exit(exit.exit_code());
        }
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
