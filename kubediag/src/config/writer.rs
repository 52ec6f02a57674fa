//! INI serialization: `ConfigFile` → commented INI string.

use std::path::Path;

use super::settings::ConfigFile;

/// Renders the commented INI written to `config.ini`.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[agent]
; Node this agent serves. Abnormals targeting other nodes are ignored.
; Leave empty to use the NODE_NAME environment variable.
node_name = {}
; Address of the processor inspection endpoint
bind_address = {}

[engine]
; Capacity of each stage queue
channel_capacity = {}
; Seconds before a sync interrupted by a store error is retried (minimum 1)
retry_delay_secs = {}

[embedded]
; Run command executors declared on abnormals
command_executor = {}
; Run profilers declared on abnormals
profiler = {}
; Working directory of embedded processors
data_root = {}

[logging]
; Log file, cleared at every start
file = {}
"#,
        config.agent.node_name.as_deref().unwrap_or(""),
        config.agent.bind_address,
        config.engine.channel_capacity,
        config.engine.retry_delay_secs,
        config.embedded.command_executor,
        config.embedded.profiler,
        path_to_string(&config.embedded.data_root),
        path_to_string(&config.logging.file),
    )
}

/// Renders a path, abbreviating the home directory to `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
