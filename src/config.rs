//! Configuration management for twincam
//!
//! Session defaults, capture policy and hardware device mapping, loaded from
//! TOML with optional `TWINCAM_*` environment overrides.

use crate::errors::CameraError;
use crate::types::{CameraPosition, FlashMode, FocusPoint, SessionPreset};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwinCamConfig {
    pub session: SessionConfig,
    pub capture: CaptureConfig,
    pub devices: DeviceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub preset: SessionPreset,
    /// Camera selected when the controller is created
    pub default_camera: CameraPosition,
    /// Initial normalized focus target [x, y]
    pub focus_point: [f32; 2],
    /// Whether focus-point configuration is attempted at all
    pub supports_focus_point: bool,
    /// Whether the preview connection follows device rotation
    pub rotate_preview: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub high_resolution: bool,
    pub default_flash: FlashMode,
    pub default_stabilization: bool,
    /// Report undecodable stills through the failure callback instead of dropping them
    pub report_decode_failures: bool,
    /// JPEG quality used by backends that encode frames themselves (1-100)
    pub jpeg_quality: u8,
}

/// Mapping of physical positions to backend device indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub front_index: u32,
    pub back_index: u32,
    /// Frames discarded after opening a stream so exposure can settle
    pub warmup_frames: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            preset: SessionPreset::Photo,
            default_camera: CameraPosition::Back,
            focus_point: [0.5, 0.5],
            supports_focus_point: true,
            rotate_preview: true,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            high_resolution: true,
            default_flash: FlashMode::Auto,
            default_stabilization: true,
            report_decode_failures: true,
            jpeg_quality: 92,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            front_index: 1,
            back_index: 0,
            warmup_frames: 3,
        }
    }
}

impl Default for TwinCamConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            capture: CaptureConfig::default(),
            devices: DeviceConfig::default(),
        }
    }
}

impl TwinCamConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            CameraError::InitializationError(format!("Failed to read config file: {}", e))
        })?;

        let config: TwinCamConfig = toml::from_str(&contents).map_err(|e| {
            CameraError::InitializationError(format!("Failed to parse config file: {}", e))
        })?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load the file (if present) then apply `TWINCAM_<SECTION>__<KEY>` overrides
    pub fn load_layered<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();
        let defaults = config::Config::try_from(&Self::default()).map_err(|e| {
            CameraError::InitializationError(format!("Failed to build default config: {}", e))
        })?;

        let layered = config::Config::builder()
            .add_source(defaults)
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("TWINCAM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CameraError::InitializationError(format!("Failed to load config: {}", e)))?;

        let config: TwinCamConfig = layered.try_deserialize().map_err(|e| {
            CameraError::InitializationError(format!("Failed to parse layered config: {}", e))
        })?;
        config
            .validate()
            .map_err(CameraError::InitializationError)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::InitializationError(format!(
                    "Failed to create config directory: {}",
                    e
                ))
            })?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            CameraError::InitializationError(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string).map_err(|e| {
            CameraError::InitializationError(format!("Failed to write config file: {}", e))
        })?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("twincam.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    pub fn focus_point(&self) -> FocusPoint {
        FocusPoint::new(self.session.focus_point[0], self.session.focus_point[1])
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !self
            .session
            .focus_point
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
        {
            return Err("Focus point coordinates must be between 0.0 and 1.0".to_string());
        }

        if self.capture.jpeg_quality == 0 || self.capture.jpeg_quality > 100 {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }

        if self.devices.front_index == self.devices.back_index {
            return Err("Front and back cameras must map to different devices".to_string());
        }

        if self.devices.warmup_frames > 60 {
            return Err("Warmup frames must be at most 60".to_string());
        }

        Ok(())
    }
}
