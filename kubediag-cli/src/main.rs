//! kubediag CLI - Command-line interface
//!
//! Runs a standalone agent over JSON manifests, validates processor results,
//! and manages the configuration file.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kubediag::config::config_file_path;

use commands::config::ConfigCommands;
use commands::run::RunArgs;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "kubediag", version)]
#[command(about = "Diagnose and recover abnormal conditions on cluster nodes", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.kubediag/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process abnormals from a manifest directory until they finish
    Run(RunArgs),

    /// Check a processor result against the abnormal it was produced from
    Validate {
        /// Abnormal as sent to the processor
        #[arg(long)]
        current: PathBuf,

        /// Abnormal returned by the processor
        #[arg(long)]
        result: PathBuf,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(config_file_path);

    let result = match cli.command {
        Commands::Run(args) => CliRunner::new(&config_path, cli.debug)
            .and_then(|runner| commands::run::run(args, &runner)),
        Commands::Validate { current, result } => commands::validate::run(&current, &result),
        Commands::Config { command } => commands::config::run(command, &config_path),
    };

    if let Err(e) = result {
        e.exit();
    }
}
