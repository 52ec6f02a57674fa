//! Settings structs, one per `[section]` of the INI file.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Complete agent configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub agent: AgentSettings,
    pub engine: EngineSettings,
    pub embedded: EmbeddedSettings,
    pub logging: LoggingSettings,
}

/// `[agent]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    /// Node this agent serves. `None` defers to the `NODE_NAME` variable.
    pub node_name: Option<String>,
    /// Address of the inspection endpoint.
    pub bind_address: SocketAddr,
}

/// `[engine]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Capacity of each stage queue.
    pub channel_capacity: usize,
    /// Delay before a failed sync is retried, in seconds.
    pub retry_delay_secs: u64,
}

/// `[embedded]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedSettings {
    /// Run command executors locally.
    pub command_executor: bool,
    /// Run profilers locally.
    pub profiler: bool,
    /// Working directory of embedded processors.
    pub data_root: PathBuf,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
