//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, P2pConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided it replaces the local override. It is returned
/// even when missing so that loading reports the bad path.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/p2pstream/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("p2pstream/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("p2pstream.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Overlay the values set in a TOML file onto `config`.
pub fn load_from_file(config: &mut P2pConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    apply_toml(config, &contents, path)
}

/// Overlay the keys present in `contents`. Keys the file leaves out keep
/// whatever an earlier layer set.
pub(crate) fn apply_toml(config: &mut P2pConfig, contents: &str, path: &Path) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let field = Fields { path };

    if let Some(stream) = field.section(&table, "stream")? {
        if let Some(v) = field.uint(stream, "stream", "writer_endpoint")? {
            config.stream.writer_endpoint = v;
        }
        if let Some(v) = field.uint(stream, "stream", "reader_endpoint")? {
            config.stream.reader_endpoint = v;
        }
        if let Some(v) = field.boolean(stream, "stream", "enable_on_create")? {
            config.stream.enable_on_create = v;
        }
    }

    if let Some(timeouts) = field.section(&table, "timeouts")? {
        if let Some(v) = field.millis(timeouts, "timeouts", "flush_ms")? {
            config.timeouts.flush_ms = v;
        }
        if let Some(v) = field.millis(timeouts, "timeouts", "wait_ms")? {
            config.timeouts.wait_ms = v;
        }
    }

    if let Some(controller) = field.section(&table, "controller")? {
        if let Some(v) = field.boolean(controller, "controller", "teardown_on_fatal")? {
            config.controller.teardown_on_fatal = v;
        }
    }

    if let Some(simulator) = field.section(&table, "simulator")? {
        if let Some(v) = field.uint(simulator, "simulator", "fifo_depth")? {
            config.simulator.fifo_depth = v;
        }
    }

    if let Some(telemetry) = field.section(&table, "telemetry")? {
        if let Some(v) = field.string(telemetry, "telemetry", "log_level")? {
            config.telemetry.log_level = v;
        }
    }

    Ok(())
}

/// Typed lookups that turn a mistyped value into a parse error naming the key.
struct Fields<'a> {
    path: &'a Path,
}

impl Fields<'_> {
    fn error(&self, section: &str, key: &str, expected: &str) -> ConfigError {
        ConfigError::Parse {
            path: self.path.to_path_buf(),
            message: format!("{}.{} must be {}", section, key, expected),
        }
    }

    fn section<'t>(&self, table: &'t toml::Table, name: &str) -> Result<Option<&'t toml::Table>, ConfigError> {
        match table.get(name) {
            None => Ok(None),
            Some(v) => v.as_table().map(Some).ok_or_else(|| ConfigError::Parse {
                path: self.path.to_path_buf(),
                message: format!("[{}] must be a table", name),
            }),
        }
    }

    fn uint(&self, table: &toml::Table, section: &str, key: &str) -> Result<Option<u32>, ConfigError> {
        match table.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_integer()
                .and_then(|n| u32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| self.error(section, key, "a non-negative integer")),
        }
    }

    fn millis(&self, table: &toml::Table, section: &str, key: &str) -> Result<Option<i32>, ConfigError> {
        match table.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_integer()
                .and_then(|n| i32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| self.error(section, key, "an integer number of milliseconds")),
        }
    }

    fn boolean(&self, table: &toml::Table, section: &str, key: &str) -> Result<Option<bool>, ConfigError> {
        match table.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_bool()
                .map(Some)
                .ok_or_else(|| self.error(section, key, "true or false")),
        }
    }

    fn string(&self, table: &toml::Table, section: &str, key: &str) -> Result<Option<String>, ConfigError> {
        match table.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_str()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| self.error(section, key, "a string")),
        }
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut P2pConfig, sources: &mut ConfigSources) {
    apply_overrides(config, sources, env::vars());
}

/// Overrides from an explicit variable list. Values that don't parse are
/// ignored and not recorded as sources.
pub(crate) fn apply_overrides(
    config: &mut P2pConfig,
    sources: &mut ConfigSources,
    vars: impl IntoIterator<Item = (String, String)>,
) {
    let mut rust_log = None;

    for (key, value) in vars {
        let applied = match key.as_str() {
            "P2PSTREAM_WRITER" => set(&mut config.stream.writer_endpoint, value.parse().ok()),
            "P2PSTREAM_READER" => set(&mut config.stream.reader_endpoint, value.parse().ok()),
            "P2PSTREAM_ENABLE_ON_CREATE" => set(&mut config.stream.enable_on_create, parse_bool(&value)),
            "P2PSTREAM_FLUSH_MS" => set(&mut config.timeouts.flush_ms, value.parse().ok()),
            "P2PSTREAM_WAIT_MS" => set(&mut config.timeouts.wait_ms, value.parse().ok()),
            "P2PSTREAM_TEARDOWN_ON_FATAL" => {
                set(&mut config.controller.teardown_on_fatal, parse_bool(&value))
            }
            "P2PSTREAM_FIFO_DEPTH" => set(&mut config.simulator.fifo_depth, value.parse().ok()),
            "P2PSTREAM_LOG_LEVEL" => set(&mut config.telemetry.log_level, Some(value)),
            "RUST_LOG" => {
                // Applied last so it beats P2PSTREAM_LOG_LEVEL regardless of order.
                rust_log = Some(value);
                false
            }
            _ => false,
        };
        if applied {
            sources.env_overrides.push(key);
        }
    }

    if let Some(filter) = rust_log {
        config.telemetry.log_level = filter;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

fn set<T>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(v) => {
            *slot = v;
            true
        }
        None => false,
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
