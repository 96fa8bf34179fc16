//! Configuration loading for p2pstream hosts.
//!
//! # Usage
//!
//! ```rust,no_run
//! use p2pconf::P2pConfig;
//!
//! let config = P2pConfig::load().expect("Failed to load config");
//! println!(
//!     "stream {} -> {}",
//!     config.stream.writer_endpoint, config.stream.reader_endpoint
//! );
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins, key by key):
//! 1. `/etc/p2pstream/config.toml` (system)
//! 2. `~/.config/p2pstream/config.toml` (user)
//! 3. `./p2pstream.toml` (local override), or a path given on the command line
//! 4. Environment variables (`P2PSTREAM_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [stream]
//! writer_endpoint = 0
//! reader_endpoint = 1
//! enable_on_create = false
//!
//! [timeouts]
//! flush_ms = 1000
//! wait_ms = -1        # negative waits forever
//!
//! [controller]
//! teardown_on_fatal = true
//!
//! [simulator]
//! fifo_depth = 1024
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files, discover_config_files_with_override, ConfigSources};
pub use sections::{ControllerSection, SimulatorConfig, StreamConfig, TelemetryConfig, TimeoutsConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct P2pConfig {
    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub controller: ControllerSection,

    #[serde(default)]
    pub simulator: SimulatorConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl P2pConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/p2pstream/config.toml`
    /// 3. `~/.config/p2pstream/config.toml`
    /// 4. `./p2pstream.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./p2pstream.toml` override and must exist. System and user configs
    /// still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and return information about sources.
    pub fn load_with_sources() -> Result<(Self, ConfigSources), ConfigError> {
        Self::load_with_sources_from(None)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = P2pConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            loader::load_from_file(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Built by hand so section order and comments are stable.
        let mut output = String::new();

        output.push_str("# p2pstream configuration\n\n");

        output.push_str("[stream]\n");
        output.push_str(&format!("writer_endpoint = {}\n", self.stream.writer_endpoint));
        output.push_str(&format!("reader_endpoint = {}\n", self.stream.reader_endpoint));
        output.push_str(&format!("enable_on_create = {}\n", self.stream.enable_on_create));

        output.push_str("\n[timeouts]\n");
        output.push_str(&format!("flush_ms = {}\n", self.timeouts.flush_ms));
        output.push_str(&format!("wait_ms = {}\n", self.timeouts.wait_ms));

        output.push_str("\n[controller]\n");
        output.push_str(&format!(
            "teardown_on_fatal = {}\n",
            self.controller.teardown_on_fatal
        ));

        output.push_str("\n[simulator]\n");
        output.push_str(&format!("fifo_depth = {}\n", self.simulator.fifo_depth));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!(
            "log_level = {}\n",
            toml::Value::String(self.telemetry.log_level.clone())
        ));

        output
    }
}
