use crate::geometry::Point2D;
use crate::logging::LoggingConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub canvas: CanvasConfig,
    pub output: OutputConfig,
    pub validation: ValidationConfig,
    pub logging: LoggingConfig,
}

/// Output canvas and where the pupils land on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    /// Horizontal distance of each pupil from its side, as a fraction of width.
    pub pupil_from_side: f64,
    /// Vertical distance of both pupils from the top, as a fraction of height.
    pub pupil_from_top: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub write_aligned: bool,
    pub aligned_extension: String,
    pub average_file_name: String,
    pub report_file_name: Option<String>,
    /// Stage timings of the run, written next to the report.
    pub metrics_file_name: Option<String>,
}

/// Parameters of the synthetic validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub photo_count: u32,
    pub rotation_range_degrees: (f64, f64),
    pub scale_range: (f64, f64),
    pub translation_range: (f64, f64),
    pub seed: u64,
    pub max_mean_residual_px: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 600,
            height: 800,
            pupil_from_side: 0.35,
            pupil_from_top: 0.4,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            write_aligned: true,
            aligned_extension: "jpg".to_string(),
            average_file_name: "average.jpg".to_string(),
            report_file_name: Some("report.json".to_string()),
            metrics_file_name: Some("metrics.json".to_string()),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            photo_count: 8,
            rotation_range_degrees: (-15.0, 15.0),
            scale_range: (0.8, 1.2),
            translation_range: (-40.0, 40.0),
            seed: 42,
            max_mean_residual_px: 2.0,
        }
    }
}

impl CanvasConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Canonical pupil positions, snapped down to whole pixels.
    pub fn pupil_targets(&self) -> [Point2D; 2] {
        let width = self.width as f64;
        let y = (self.height as f64 * self.pupil_from_top).floor();
        [
            Point2D::new((width * self.pupil_from_side).floor(), y),
            Point2D::new((width * (1.0 - self.pupil_from_side)).floor(), y),
        ]
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.width == 0 || self.height == 0 {
            errors.push(format!(
                "Canvas must be non-empty, got {}x{}",
                self.width, self.height
            ));
        }

        if !(self.pupil_from_side > 0.0 && self.pupil_from_side < 0.5) {
            errors.push(format!(
                "pupil_from_side must be in (0, 0.5), got {}",
                self.pupil_from_side
            ));
        }

        if !(self.pupil_from_top > 0.0 && self.pupil_from_top < 1.0) {
            errors.push(format!(
                "pupil_from_top must be in (0, 1), got {}",
                self.pupil_from_top
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        if content.trim_start().starts_with('{') {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: ConfigFormat) -> crate::Result<()> {
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = match self.canvas.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => errors,
        };

        if self.output.aligned_extension.trim().is_empty() {
            errors.push("Output aligned_extension must not be empty".to_string());
        }

        if self.output.average_file_name.trim().is_empty() {
            errors.push("Output average_file_name must not be empty".to_string());
        }

        let validation = &self.validation;
        if validation.photo_count == 0 {
            errors.push("Validation photo_count must be positive".to_string());
        }

        if validation.rotation_range_degrees.0 > validation.rotation_range_degrees.1 {
            errors.push("Validation rotation range is inverted".to_string());
        }

        if validation.scale_range.0 <= 0.0 || validation.scale_range.0 > validation.scale_range.1 {
            errors.push("Validation scale range must be positive and ordered".to_string());
        }

        if validation.translation_range.0 > validation.translation_range.1 {
            errors.push("Validation translation range is inverted".to_string());
        }

        if validation.max_mean_residual_px < 0.0 {
            errors.push("Validation max_mean_residual_px must be non-negative".to_string());
        }

        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl std::str::FromStr for ConfigFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            other => Err(anyhow::anyhow!("Unknown config format: {}", other)),
        }
    }
}

/// Load and validate `config_path`, or return the defaults when no path is
/// given. A file that cannot be read, parsed or validated is an error.
pub fn load_config(config_path: Option<&Path>) -> crate::Result<Config> {
    let Some(path) = config_path else {
        return Ok(Config::default());
    };

    let config = Config::load_from_file(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config.validate().map_err(|errors| {
        anyhow::anyhow!(
            "Invalid configuration in {}: {}",
            path.display(),
            errors.join("; ")
        )
    })?;
    Ok(config)
}
