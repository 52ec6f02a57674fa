//! CLI runner for common setup.
//!
//! Loads the config file and initializes logging for commands that run the
//! agent.

use std::path::Path;

use kubediag::config::ConfigFile;
use kubediag::logging::{init_logging, LoggingGuard, DEFAULT_LOG_FILE};
use tracing::info;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Keeps logging active while the runner exists
    _logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Loads `config_path` and initializes logging.
    ///
    /// # Arguments
    ///
    /// * `debug_mode` - Enables debug-level logging when RUST_LOG is unset
    pub fn new(config_path: &Path, debug_mode: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load_from(config_path)?;

        let log_path = &config.logging.file;
        let log_dir = log_path.parent().unwrap_or_else(|| Path::new("."));
        let log_file = log_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());

        let logging_guard = init_logging(log_dir, &log_file, true, debug_mode)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            _logging_guard: logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("kubediag v{}", kubediag::VERSION);
        info!("kubediag CLI: {} command", command);
    }
}
