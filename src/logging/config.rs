//! Logging configuration
//!
//! Per-component log levels and output destinations for the alignment
//! pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    pub global_level: String,

    /// Enable console output
    pub console_output: bool,

    /// Directory for log files (None = no file logging)
    pub log_directory: Option<PathBuf>,

    /// Include file location in logs
    pub include_file_location: bool,

    /// Level for the three-pass aligner
    pub aligner_level: String,

    /// Level for warping and averaging
    pub compositor_level: String,

    /// Level for loading and writing photos
    pub io_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_level: "info".to_string(),
            console_output: true,
            log_directory: None,
            include_file_location: false,
            aligner_level: "info".to_string(),
            compositor_level: "info".to_string(),
            io_level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Create a development configuration with verbose logging
    pub fn development() -> Self {
        Self {
            global_level: "debug".to_string(),
            console_output: true,
            log_directory: Some(PathBuf::from("logs")),
            include_file_location: true,
            aligner_level: "trace".to_string(),
            compositor_level: "debug".to_string(),
            io_level: "debug".to_string(),
        }
    }

    /// Same configuration with every level replaced by `level`.
    pub fn with_level(mut self, level: &str) -> Self {
        self.global_level = level.to_string();
        self.aligner_level = level.to_string();
        self.compositor_level = level.to_string();
        self.io_level = level.to_string();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        let levels = [
            ("global_level", &self.global_level),
            ("aligner_level", &self.aligner_level),
            ("compositor_level", &self.compositor_level),
            ("io_level", &self.io_level),
        ];

        for (name, level) in levels {
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(format!(
                    "Invalid {}: {}. Must be one of: {:?}",
                    name, level, VALID_LEVELS
                ));
            }
        }

        Ok(())
    }

    /// `EnvFilter` directives for the crate and its components.
    pub fn filter_directives(&self) -> String {
        let krate = env!("CARGO_PKG_NAME").replace('-', "_");
        format!(
            "{krate}={global},{krate}::pipeline::aligner={aligner},{krate}::geometry={aligner},{krate}::pipeline::compositor={compositor},{krate}::data={io}",
            krate = krate,
            global = self.global_level,
            aligner = self.aligner_level,
            compositor = self.compositor_level,
            io = self.io_level,
        )
    }
}
