//! Configuration management CLI commands.

use std::path::Path;

use clap::Subcommand;
use kubediag::config::{ConfigFile, NODE_NAME_ENV};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration
    Show,

    /// Create the configuration file with defaults if it does not exist
    Init,
}

/// Run a config subcommand against the file at `path`.
pub fn run(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => run_show(path),
        ConfigCommands::Init => run_init(path),
    }
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;
    if !path.exists() {
        println!("; {} does not exist, showing defaults", path.display());
    }
    print!("{}", render(&config));
    Ok(())
}

fn run_init(path: &Path) -> Result<(), CliError> {
    if ConfigFile::ensure_exists_at(path)? {
        println!("Created {}", path.display());
    } else {
        println!("{} already exists, left unchanged", path.display());
    }
    Ok(())
}

fn render(config: &ConfigFile) -> String {
    let node_name = match &config.agent.node_name {
        Some(name) => name.clone(),
        None => format!("(from ${})", NODE_NAME_ENV),
    };

    format!(
        "[agent]\nnode_name = {}\nbind_address = {}\n\n\
         [engine]\nchannel_capacity = {}\nretry_delay_secs = {}\n\n\
         [embedded]\ncommand_executor = {}\nprofiler = {}\ndata_root = {}\n\n\
         [logging]\nfile = {}\n",
        node_name,
        config.agent.bind_address,
        config.engine.channel_capacity,
        config.engine.retry_delay_secs,
        config.embedded.command_executor,
        config.embedded.profiler,
        config.embedded.data_root.display(),
        config.logging.file.display(),
    )
}
