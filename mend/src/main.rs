//! Bounded repair-loop runner CLI.
//!
//! `mend run` copies a target directory into `.mend/sandbox/`, drives the
//! audit/fix/validate loop over every source file, writes run artifacts under
//! `.mend/runs/<run-id>/`, and prints the session report as JSON.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use mend::batch::{BatchConfig, run_batch};
use mend::controller::CancelFlag;
use mend::exit_codes;
use mend::io::analyzer::CommandAnalyzer;
use mend::io::config::{MendConfig, load_config, write_config};
use mend::io::fixer::CommandFixer;
use mend::io::session_log::{JsonlEventSink, RunPaths, write_report};
use mend::io::test_runner::CommandTestRunner;
use mend::io::workspace::Workspace;
use mend::logging;

const CONFIG_PATH: &str = ".mend/config.toml";
const SANDBOX_PATH: &str = ".mend/sandbox";

#[derive(Parser)]
#[command(
    name = "mend",
    version,
    about = "Bounded audit/fix/validate repair loop for source files"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default `.mend/config.toml`.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Copy the target directory into the sandbox and run the repair loop.
    Run {
        /// Directory containing the code to repair.
        #[arg(long)]
        target_dir: PathBuf,
        /// Override the configured iteration budget per file.
        #[arg(long)]
        max_iterations: Option<u32>,
        /// Override the configured quality threshold (0-10).
        #[arg(long)]
        quality_threshold: Option<f64>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(force),
        Command::Run {
            target_dir,
            max_iterations,
            quality_threshold,
        } => cmd_run(&target_dir, max_iterations, quality_threshold),
    }
}

fn cmd_init(force: bool) -> Result<i32> {
    let path = Path::new(CONFIG_PATH);
    if path.exists() && !force {
        anyhow::bail!("{CONFIG_PATH} already exists (use --force to overwrite)");
    }
    write_config(path, &MendConfig::default())?;
    println!("wrote {CONFIG_PATH}");
    Ok(exit_codes::OK)
}

fn cmd_run(
    target_dir: &Path,
    max_iterations: Option<u32>,
    quality_threshold: Option<f64>,
) -> Result<i32> {
    let mut cfg = load_config(Path::new(CONFIG_PATH))?;
    if let Some(value) = max_iterations {
        cfg.max_iterations = value;
    }
    if let Some(value) = quality_threshold {
        cfg.quality_threshold = value;
    }
    cfg.validate()?;

    let workspace = Workspace::new(SANDBOX_PATH);
    let copied = workspace
        .copy_from(target_dir)
        .with_context(|| format!("copy {} into sandbox", target_dir.display()))?;
    if copied == 0 {
        anyhow::bail!("no files found in {}", target_dir.display());
    }

    let run_id = new_run_id()?;
    let paths = RunPaths::new(Path::new("."), &run_id);
    let sink = JsonlEventSink::create(&paths.events_path)?;

    let analyzer = CommandAnalyzer::from_config(&cfg, workspace.root());
    let fixer = CommandFixer::from_config(&cfg, workspace.root());
    let test_runner = CommandTestRunner::from_config(&cfg, workspace.root());
    let batch_config = BatchConfig {
        max_iterations: cfg.max_iterations,
        quality_threshold: cfg.quality_threshold,
    };

    // The flag is wired through the whole loop; embedders can cancel it from
    // another thread. The CLI itself installs no signal handler.
    let cancel = CancelFlag::new();

    let report = run_batch(
        &workspace,
        &cfg.source_extension,
        &analyzer,
        &fixer,
        &test_runner,
        &batch_config,
        &sink,
        &cancel,
    )?;

    write_report(&paths.report_path, &report)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.incomplete {
        return Ok(exit_codes::INTERRUPTED);
    }
    if report.failed > 0 {
        return Ok(exit_codes::PARTIAL);
    }
    Ok(exit_codes::OK)
}

fn new_run_id() -> Result<String> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before epoch")?
        .as_secs();
    Ok(format!("run-{secs}"))
}
