//! Individual config sections.

use serde::{Deserialize, Serialize};

/// Which endpoints the host stream connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Endpoint id data is written into.
    /// Default: 0
    #[serde(default = "StreamConfig::default_writer_endpoint")]
    pub writer_endpoint: u32,

    /// Endpoint id data is read from.
    /// Default: 1
    #[serde(default = "StreamConfig::default_reader_endpoint")]
    pub reader_endpoint: u32,

    /// Enable the stream in the same driver call that creates it.
    /// Default: false
    #[serde(default)]
    pub enable_on_create: bool,
}

impl StreamConfig {
    fn default_writer_endpoint() -> u32 {
        0
    }

    fn default_reader_endpoint() -> u32 {
        1
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            writer_endpoint: Self::default_writer_endpoint(),
            reader_endpoint: Self::default_reader_endpoint(),
            enable_on_create: false,
        }
    }
}

/// Timeouts in milliseconds. Negative means wait forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Default: 1000
    #[serde(default = "TimeoutsConfig::default_ms")]
    pub flush_ms: i32,

    /// Default: 1000
    #[serde(default = "TimeoutsConfig::default_ms")]
    pub wait_ms: i32,
}

impl TimeoutsConfig {
    fn default_ms() -> i32 {
        1000
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            flush_ms: Self::default_ms(),
            wait_ms: Self::default_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSection {
    /// Tear the stream down after a fatal driver status.
    /// Default: true
    #[serde(default = "ControllerSection::default_teardown_on_fatal")]
    pub teardown_on_fatal: bool,
}

impl ControllerSection {
    fn default_teardown_on_fatal() -> bool {
        true
    }
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            teardown_on_fatal: Self::default_teardown_on_fatal(),
        }
    }
}

/// Settings for the in-process simulated driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Depth of both the writer and reader FIFOs, in elements.
    /// Default: 1024
    #[serde(default = "SimulatorConfig::default_fifo_depth")]
    pub fifo_depth: u32,
}

impl SimulatorConfig {
    fn default_fifo_depth() -> u32 {
        1024
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            fifo_depth: Self::default_fifo_depth(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level or full `EnvFilter` directive.
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
