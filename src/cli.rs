use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::blocks::PrimitiveTable;
use crate::config::Config;
use crate::project::{load_project, Project};
use crate::runtime::{MonotonicClock, Runtime};
use crate::value::{self, Value};

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "Stagehand - run block scripts on a cooperative tick scheduler", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a project, click the green flag and run it
    Run {
        /// Project JSON file
        project: PathBuf,

        /// Stop after this many ticks
        #[arg(short = 't', long = "ticks")]
        ticks: Option<u64>,

        /// Pace ticks at the configured framerate instead of running flat out
        #[arg(long)]
        realtime: bool,
    },

    /// Load a project and check every opcode is known
    Check {
        /// Project JSON file
        project: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

/// Resolve configuration for a parsed command line
pub fn load_config(cli: &Cli) -> Result<Config> {
    Config::builder()
        .config_path(cli.config.clone())
        .build()
        .context("failed to load configuration")
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    run(cli, config).await
}

/// Handle a parsed command with already-loaded configuration
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Run {
            project,
            ticks,
            realtime,
        } => {
            let project = open_project(&project)?;
            let runtime = run_project(&project, &config, ticks, realtime).await?;
            print_report(&runtime);
        }

        Commands::Check { project } => {
            let loaded = open_project(&project)?;
            let scripts: usize = loaded.targets.iter().map(|t| t.scripts.len()).sum();
            println!(
                "✓ {} is valid: {} target(s), {} script(s), {} opcode(s)",
                project.display(),
                loaded.targets.len(),
                scripts,
                loaded.opcodes().len()
            );
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn open_project(path: &Path) -> Result<Project> {
    let project = load_project(path)?;
    project
        .validate(&PrimitiveTable::standard())
        .with_context(|| format!("project {} failed validation", path.display()))?;
    Ok(project)
}

/// Green flag, then step until nothing is running, the tick limit is hit or
/// (in real time) Ctrl-C arrives
pub async fn run_project(
    project: &Project,
    config: &Config,
    max_ticks: Option<u64>,
    realtime: bool,
) -> Result<Runtime> {
    let mut runtime = Runtime::new(config.scheduler.clone(), Arc::new(MonotonicClock::new()));
    runtime.load_project(project);
    runtime.green_flag();

    let period = Duration::from_secs_f64(1.0 / f64::from(config.scheduler.framerate));
    let mut interval = tokio::time::interval(period);

    loop {
        if realtime {
            tokio::select! {
                _ = interval.tick() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            }
        }

        let summary = runtime.step_threads();
        if summary.active == 0 {
            info!(ticks = summary.tick, "All threads finished");
            break;
        }
        if max_ticks.map_or(false, |max| summary.tick >= max) {
            info!(ticks = summary.tick, active = summary.active, "Tick limit reached");
            break;
        }
    }

    Ok(runtime)
}

fn print_report(runtime: &Runtime) {
    println!("Ticks: {}", runtime.current_tick());
    println!("Threads still running: {}", runtime.active_thread_count());

    for entity in runtime.entities() {
        let kind = if entity.is_stage {
            "stage"
        } else if entity.is_original {
            "sprite"
        } else {
            "clone"
        };
        println!("\n{} ({})", entity.name, kind);
        for (name, value) in &entity.variables {
            println!("  {} = {}", name, value::to_string(value));
        }
    }

    println!("\nCounter: {}", value::to_string(&Value::Num(runtime.counter())));

    if let Some(error) = runtime.last_error() {
        println!("\nLast error:");
        println!(
            "  [{}] thread {} on {}: {}",
            error.at, error.thread, error.target, error.message
        );
    }
}
