//! Default values for every configuration setting.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use super::file::config_directory;
use super::settings::*;
use crate::logging::DEFAULT_LOG_FILE;
use crate::queue::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_RETRY_DELAY};

// =============================================================================
// [agent]
// =============================================================================

/// Environment variable consulted when no node name is configured.
pub const NODE_NAME_ENV: &str = "NODE_NAME";

/// Default port of the inspection endpoint.
pub const DEFAULT_BIND_PORT: u16 = 8090;

pub fn default_bind_address() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_BIND_PORT)
}

// =============================================================================
// [engine]
// =============================================================================

/// Smallest accepted retry delay, in seconds.
pub const MIN_RETRY_DELAY_SECS: u64 = 1;

// =============================================================================
// [embedded]
// =============================================================================

pub const DEFAULT_COMMAND_EXECUTOR_ENABLED: bool = true;
pub const DEFAULT_PROFILER_ENABLED: bool = false;
pub const DEFAULT_DATA_ROOT: &str = "/var/lib/kubediag";

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            agent: AgentSettings {
                node_name: None,
                bind_address: default_bind_address(),
            },
            engine: EngineSettings {
                channel_capacity: DEFAULT_CHANNEL_CAPACITY,
                retry_delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
            },
            embedded: EmbeddedSettings {
                command_executor: DEFAULT_COMMAND_EXECUTOR_ENABLED,
                profiler: DEFAULT_PROFILER_ENABLED,
                data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            },
            logging: LoggingSettings {
                file: config_directory().join(DEFAULT_LOG_FILE),
            },
        }
    }
}
