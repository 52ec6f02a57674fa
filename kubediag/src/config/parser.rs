//! INI parsing: `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::defaults::MIN_RETRY_DELAY_SECS;
use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parses an `Ini` into a `ConfigFile`, overlaying defaults.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [agent] section
    if let Some(section) = ini.section(Some("agent")) {
        if let Some(v) = section.get("node_name") {
            let v = v.trim();
            config.agent.node_name = (!v.is_empty()).then(|| v.to_string());
        }
        if let Some(v) = parse_value(section, "agent", "bind_address", "must be an address like 127.0.0.1:8090")? {
            config.agent.bind_address = v;
        }
    }

    // [engine] section
    if let Some(section) = ini.section(Some("engine")) {
        if let Some(v) = parse_value::<usize>(section, "engine", "channel_capacity", "must be a positive integer")? {
            if v == 0 {
                return Err(invalid("engine", "channel_capacity", "0", "must be a positive integer"));
            }
            config.engine.channel_capacity = v;
        }
        if let Some(v) = parse_value::<u64>(
            section,
            "engine",
            "retry_delay_secs",
            "must be a positive integer (seconds)",
        )? {
            if v < MIN_RETRY_DELAY_SECS {
                return Err(invalid(
                    "engine",
                    "retry_delay_secs",
                    &v.to_string(),
                    "must be at least 1 second",
                ));
            }
            config.engine.retry_delay_secs = v;
        }
    }

    // [embedded] section
    if let Some(section) = ini.section(Some("embedded")) {
        if let Some(v) = section.get("command_executor") {
            config.embedded.command_executor = parse_bool(v)
                .ok_or_else(|| invalid("embedded", "command_executor", v, "must be true or false"))?;
        }
        if let Some(v) = section.get("profiler") {
            config.embedded.profiler =
                parse_bool(v).ok_or_else(|| invalid("embedded", "profiler", v, "must be true or false"))?;
        }
        if let Some(v) = section.get("data_root") {
            let v = v.trim();
            if !v.is_empty() {
                config.embedded.data_root = expand_tilde(v);
            }
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn parse_value<T: FromStr>(
    section: &Properties,
    name: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    match section.get(key) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(name, key, v, reason)),
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parses a boolean, accepting the usual spellings.
pub(super) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Expands a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
