//! Board simulator CLI.
//!
//! This binary provides the entry point for configuration checks and runs. It performs:
//! 1. **Validate:** Parse a JSON configuration and compose its topology without running anything.
//! 2. **Run:** Build the board, attach a workload (or restore a checkpoint), and run to completion.
//!
//! The process exit code follows the simulator's exit status: 0 completed,
//! 2 configuration error, 3 resource error, 4 simulation fault, 5 cancelled.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use boardsim_core::common::error::{CheckpointError, ExitStatus, ResourceNotFoundError, SimError};
use boardsim_core::sim::{Checkpoint, DirectoryProvider, SimulationDriver};
use boardsim_core::stats::STATS_SECTIONS;
use boardsim_core::{Board, Config, RequirementValidator};

#[derive(Parser, Debug)]
#[command(
    name = "sim",
    author,
    version,
    about = "Board composition and core-switching simulator",
    long_about = "Compose a board from a JSON configuration and run a workload on it.\n\nExamples:\n  sim validate -c configs/two_core_switch.json\n  sim run -c configs/two_core_switch.json -w software/bin\n  sim run -c configs/two_core_switch.json --restore m5out/cpt.1000.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a configuration and print the composed topology.
    Validate {
        /// JSON configuration file.
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Run a workload to completion.
    Run {
        /// JSON configuration file (built-in defaults when omitted).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory workload identifiers are resolved against.
        #[arg(short, long, default_value = ".")]
        workload_dir: PathBuf,

        /// Workload identifier; overrides `workload.resource`.
        #[arg(long)]
        workload: Option<String>,

        /// Continue from a checkpoint instead of attaching a workload.
        #[arg(long)]
        restore: Option<PathBuf>,

        /// Write gem5-style `name value # description` statistics here.
        #[arg(long)]
        stats_file: Option<PathBuf>,

        /// Print the derived summary as JSON instead of the text report.
        #[arg(long)]
        stats_json: bool,

        /// Statistics sections to print (default: all).
        #[arg(long, value_delimiter = ',', value_parser = clap::builder::PossibleValuesParser::new(STATS_SECTIONS.iter().copied()))]
        sections: Vec<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let status = match cli.command {
        Commands::Validate { config } => cmd_validate(&config),
        Commands::Run {
            config,
            workload_dir,
            workload,
            restore,
            stats_file,
            stats_json,
            sections,
        } => cmd_run(&RunArgs {
            config,
            workload_dir,
            workload,
            restore,
            stats_file,
            stats_json,
            sections,
        }),
    };
    let status = status.unwrap_or_else(|e| {
        error!(error = %e, "simulation failed");
        eprintln!("error: {e}");
        e.exit_status()
    });
    process::exit(status.code());
}

struct RunArgs {
    config: Option<PathBuf>,
    workload_dir: PathBuf,
    workload: Option<String>,
    restore: Option<PathBuf>,
    stats_file: Option<PathBuf>,
    stats_json: bool,
    sections: Vec<String>,
}

fn cmd_validate(path: &Path) -> Result<ExitStatus, SimError> {
    let config = Config::from_file(path)?;
    let topology = config.build_topology(&RequirementValidator::default())?;
    let text = serde_json::to_string_pretty(&topology)
        .map_err(CheckpointError::from)?;
    println!("{text}");
    Ok(ExitStatus::Completed)
}

fn cmd_run(args: &RunArgs) -> Result<ExitStatus, SimError> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let topology = config.build_topology(&RequirementValidator::default())?;
    let mut board = Board::new(topology)?;
    let options = config.simulation_options();
    let policy = config.switching.policy.build();

    let mut driver = if let Some(path) = &args.restore {
        let checkpoint = Checkpoint::load(path)?;
        info!(path = %path.display(), "restoring checkpoint");
        SimulationDriver::restore(board, checkpoint, options)?.with_policy(policy)
    } else {
        let id = args
            .workload
            .as_deref()
            .or(config.workload.resource.as_deref())
            .ok_or(ResourceNotFoundError::NoWorkload)?;
        let provider = DirectoryProvider::new(args.workload_dir.clone());
        board.set_workload(&provider, id)?;
        SimulationDriver::new(board, options).with_policy(policy)
    };

    // Statistics are dumped even when the run faults.
    let outcome = driver.run_to_completion();
    match &outcome {
        Ok(exit) => println!("\n[*] Exit at tick {}: {:?}", exit.tick, exit.cause),
        Err(_) => println!("\n[!] Simulation fault at tick {}", driver.state().tick),
    }

    let stats = driver.stats();
    if args.stats_json {
        let text = serde_json::to_string_pretty(&stats.summary())
            .map_err(CheckpointError::from)?;
        println!("{text}");
    } else {
        stats.print_sections(&args.sections);
    }
    if let Some(path) = &args.stats_file {
        stats
            .write_stats_txt(path)
            .map_err(|source| CheckpointError::Io {
                path: path.clone(),
                source,
            })?;
    }
    let _ = outcome?;
    Ok(driver.state().exit_status.unwrap_or(ExitStatus::Completed))
}
