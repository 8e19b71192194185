use std::{fmt, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Result, VisualiserError};

/// Smallest transform window the analyser accepts.
pub const MIN_RESOLUTION: u32 = 32;
/// Largest transform window the analyser accepts.
pub const MAX_RESOLUTION: u32 = 32_768;

/// Every resolution a UI may offer, smallest first.
pub const SUPPORTED_RESOLUTIONS: [u32; 11] =
    [32, 64, 128, 256, 512, 1024, 2048, 4096, 8192, 16_384, 32_768];

/// Returns `true` when `resolution` is a power of two inside the supported range.
pub fn is_supported_resolution(resolution: u32) -> bool {
    resolution.is_power_of_two() && (MIN_RESOLUTION..=MAX_RESOLUTION).contains(&resolution)
}

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub visual: VisualConfig,
    pub canvas: CanvasConfig,
    pub frame_rate: FrameRate,
}

impl AppConfig {
    /// Parses and validates a JSON document. Missing fields fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        tracing::debug!(?path, "loading configuration");
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()?;
        self.visual.validate()?;
        self.canvas.validate()?;
        if self.frame_rate.0 == 0 {
            return Err(VisualiserError::invalid("frame rate must be positive"));
        }
        Ok(())
    }
}

/// Frames per second of the host's animation cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameRate(pub u32);

impl Default for FrameRate {
    fn default() -> Self {
        Self(60)
    }
}

impl FrameRate {
    pub fn frame_seconds(self) -> f64 {
        1.0 / f64::from(self.0.max(1))
    }
}

/// Transform resolution and temporal smoothing of the analyser.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub resolution: u32,
    pub smoothing: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            resolution: 4096,
            smoothing: 0.95,
        }
    }
}

impl AnalysisConfig {
    /// Builds a validated configuration.
    pub fn new(resolution: u32, smoothing: f32) -> Result<Self> {
        let config = Self {
            resolution,
            smoothing,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !is_supported_resolution(self.resolution) {
            return Err(VisualiserError::invalid(format!(
                "resolution {} is not a power of two between {MIN_RESOLUTION} and {MAX_RESOLUTION}",
                self.resolution
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(VisualiserError::invalid(format!(
                "smoothing {} is outside [0, 1]",
                self.smoothing
            )));
        }
        Ok(())
    }

    /// Number of usable frequency bins for this resolution.
    pub fn frequency_bins(&self) -> usize {
        self.resolution as usize / 2
    }
}

/// Visualisation modes a user can select.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualMode {
    #[default]
    Waveform,
    Spectrum,
    /// Reserved placeholder. Selectable, but draws nothing.
    Spectrogram,
}

impl VisualMode {
    pub const ALL: [VisualMode; 3] = [
        VisualMode::Waveform,
        VisualMode::Spectrum,
        VisualMode::Spectrogram,
    ];

    /// Whether a drawing strategy exists for this mode.
    pub fn is_drawable(self) -> bool {
        !matches!(self, VisualMode::Spectrogram)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VisualMode::Waveform => "waveform",
            VisualMode::Spectrum => "spectrum",
            VisualMode::Spectrogram => "spectrogram",
        }
    }
}

impl fmt::Display for VisualMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisualMode {
    type Err = VisualiserError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        VisualMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| VisualiserError::invalid(format!("unknown visual mode `{name}`")))
    }
}

/// Settings read fresh by the drawing strategies every frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    pub mode: VisualMode,
    pub sensitivity: f32,
    pub line_width: f32,
    pub volume: f32,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            mode: VisualMode::Waveform,
            sensitivity: 1.0,
            line_width: 2.0,
            volume: 1.0,
        }
    }
}

impl VisualConfig {
    pub fn validate(&self) -> Result<()> {
        validate_positive("sensitivity", self.sensitivity)?;
        validate_positive("line width", self.line_width)?;
        validate_volume(self.volume)
    }
}

/// Logical size of the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: f32,
    pub height: f32,
    pub device_pixel_ratio: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 400.0,
            device_pixel_ratio: 1.0,
        }
    }
}

impl CanvasConfig {
    pub fn validate(&self) -> Result<()> {
        validate_positive("canvas width", self.width)?;
        validate_positive("canvas height", self.height)?;
        validate_positive("device pixel ratio", self.device_pixel_ratio)
    }
}

pub(crate) fn validate_positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(VisualiserError::invalid(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}

pub(crate) fn validate_volume(volume: f32) -> Result<()> {
    if (0.0..=1.0).contains(&volume) {
        Ok(())
    } else {
        Err(VisualiserError::invalid(format!(
            "volume {volume} is outside [0, 1]"
        )))
    }
}
