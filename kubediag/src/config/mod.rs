//! Agent configuration loaded from an INI file.
//!
//! ```ini
//! [agent]
//! node_name = worker-1
//! bind_address = 127.0.0.1:8090
//!
//! [engine]
//! channel_capacity = 1000
//! retry_delay_secs = 30
//!
//! [embedded]
//! command_executor = true
//! profiler = false
//! data_root = /var/lib/kubediag
//!
//! [logging]
//! file = ~/.kubediag/kubediag.log
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{
    default_bind_address, DEFAULT_BIND_PORT, DEFAULT_COMMAND_EXECUTOR_ENABLED, DEFAULT_DATA_ROOT,
    DEFAULT_PROFILER_ENABLED, MIN_RETRY_DELAY_SECS, NODE_NAME_ENV,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{AgentSettings, ConfigFile, EmbeddedSettings, EngineSettings, LoggingSettings};
