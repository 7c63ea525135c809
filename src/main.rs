//! Binary entry point for tablecopy.
//!
//! Runs `COPY` commands against the bundled in-memory session, loaded from a
//! JSON dataset with `--data`.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tablecopy::config::CopyConfig;
use tablecopy::io::{CopyService, is_copy_command, parse_copy_command};
use tablecopy::models::Target;
use tablecopy::observability::{self, LoggingConfig};
use tablecopy::session::MemorySession;

/// Tablecopy - bulk COPY import/export for tabular databases.
#[derive(Parser)]
#[command(name = "tablecopy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "TABLECOPY_CONFIG")]
    config: Option<PathBuf>,

    /// JSON dataset loaded into the in-memory session.
    #[arg(short, long, global = true, env = "TABLECOPY_DATA")]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run one COPY command.
    Exec {
        /// The command, e.g. `COPY ks.users TO 'users.csv' WITH HEADER=true`.
        command: String,
    },

    /// Read COPY commands from stdin, one per line.
    Shell,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init(LoggingConfig::from_settings(
        Some(&config.logging),
        cli.verbose,
    )) {
        eprintln!("Failed to initialize observability: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli, config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<CopyConfig> {
    let config = match path {
        Some(path) => CopyConfig::load_from_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => CopyConfig::load_default(),
    };
    Ok(config.with_env_overrides())
}

/// Returns whether every command succeeded.
fn run(cli: Cli, config: CopyConfig) -> anyhow::Result<bool> {
    let session = match &cli.data {
        Some(path) => MemorySession::load(path)
            .with_context(|| format!("loading dataset {}", path.display()))?,
        None => MemorySession::new(),
    };
    let service = CopyService::new(&session)
        .with_schema_cache(&session)
        .with_defaults(config.defaults);

    match cli.command {
        Commands::Exec { command } => Ok(run_line(&service, &command)),
        Commands::Shell => {
            // Stdin is locked per line so `COPY ... FROM STDIN` can read
            // the lines that follow it.
            let mut all_ok = true;
            let mut line = String::new();
            loop {
                line.clear();
                if std::io::stdin().read_line(&mut line).context("reading stdin")? == 0 {
                    break;
                }
                let command = line.trim();
                if !command.is_empty() {
                    all_ok &= run_line(&service, command);
                }
            }
            Ok(all_ok)
        },
    }
}

/// Runs one command and prints its status.
///
/// The status goes to stderr when rows go to stdout.
fn run_line(service: &CopyService<'_>, line: &str) -> bool {
    if !is_copy_command(line) {
        eprintln!("Unsupported command: {line}");
        return false;
    }
    match parse_copy_command(line).and_then(|spec| Ok((service.run(&spec)?, spec.target))) {
        Ok((summary, Target::Stdout)) => {
            eprintln!("{summary}");
            true
        },
        Ok((summary, _)) => {
            println!("{summary}");
            true
        },
        Err(e) => {
            eprintln!("Error: {e}");
            false
        },
    }
}
