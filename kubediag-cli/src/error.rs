//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use kubediag::agent::AgentError;
use kubediag::config::ConfigFileError;
use kubediag::store::manifest::ManifestError;
use kubediag::validation::ValidationError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to load or save the config file
    ConfigFile(ConfigFileError),
    /// Failed to load manifests
    Manifest(ManifestError),
    /// Failed to assemble or start the agent
    Agent(AgentError),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Failed to read an input file
    FileRead { path: PathBuf, error: std::io::Error },
    /// Input file is not a valid abnormal
    Decode { path: PathBuf, error: serde_json::Error },
    /// A processor result was rejected
    Rejected(ValidationError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Agent(AgentError::MissingNodeName) => {
                eprintln!();
                eprintln!("Set the node name in one of these ways:");
                eprintln!("  1. Pass --node-name <NAME>");
                eprintln!("  2. Set node_name in the [agent] section of config.ini");
                eprintln!("  3. Export the NODE_NAME environment variable");
            }
            CliError::Agent(AgentError::Bind { .. }) => {
                eprintln!();
                eprintln!("Another process may be using the address.");
                eprintln!("Change bind_address in config.ini or run without --serve.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Manifest(e) => write!(f, "Failed to load manifests: {}", e),
            CliError::Agent(e) => write!(f, "Agent error: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read '{}': {}", path.display(), error)
            }
            CliError::Decode { path, error } => {
                write!(f, "'{}' is not a valid Abnormal: {}", path.display(), error)
            }
            CliError::Rejected(e) => write!(f, "Result rejected: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Manifest(e) => Some(e),
            CliError::Agent(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::FileRead { error, .. } => Some(error),
            CliError::Decode { error, .. } => Some(error),
            CliError::Rejected(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<ManifestError> for CliError {
    fn from(e: ManifestError) -> Self {
        CliError::Manifest(e)
    }
}

impl From<AgentError> for CliError {
    fn from(e: AgentError) -> Self {
        CliError::Agent(e)
    }
}
