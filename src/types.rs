//! Value types shared by the session controller and the capture coordinator.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// One of the two physical capture devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraPosition {
    Front,
    #[default]
    Back,
}

impl CameraPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraPosition::Front => "front",
            CameraPosition::Back => "back",
        }
    }

    /// The opposite device
    pub fn other(&self) -> Self {
        match self {
            CameraPosition::Front => CameraPosition::Back,
            CameraPosition::Back => CameraPosition::Front,
        }
    }

    /// Only the back device carries a flash
    pub fn has_flash(&self) -> bool {
        matches!(self, CameraPosition::Back)
    }
}

impl fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "front" => Ok(CameraPosition::Front),
            "back" | "rear" => Ok(CameraPosition::Back),
            other => Err(format!("Unknown camera position: {}", other)),
        }
    }
}

/// Normalized focus coordinate, both axes in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocusPoint {
    pub x: f32,
    pub y: f32,
}

impl FocusPoint {
    pub const CENTER: FocusPoint = FocusPoint { x: 0.5, y: 0.5 };

    /// Create a focus point, clamping both axes into range.
    /// NaN collapses to the center of the axis.
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: normalize_axis(x),
            y: normalize_axis(y),
        }
    }

    pub fn is_normalized(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }
}

impl Default for FocusPoint {
    fn default() -> Self {
        Self::CENTER
    }
}

fn normalize_axis(v: f32) -> f32 {
    if v.is_nan() {
        0.5
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashMode {
    #[default]
    Auto,
    On,
    Off,
}

impl FromStr for FlashMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(FlashMode::Auto),
            "on" => Ok(FlashMode::On),
            "off" => Ok(FlashMode::Off),
            other => Err(format!("Unknown flash mode: {}", other)),
        }
    }
}

/// Session quality preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPreset {
    #[default]
    Photo,
    High,
    Medium,
}

/// Parameters for a single capture call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub flash: FlashMode,
    pub stabilization: bool,
    pub high_resolution: bool,
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self {
            flash: FlashMode::Auto,
            stabilization: true,
            high_resolution: true,
        }
    }
}

impl CaptureRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flash(mut self, flash: FlashMode) -> Self {
        self.flash = flash;
        self
    }

    pub fn with_stabilization(mut self, stabilization: bool) -> Self {
        self.stabilization = stabilization;
        self
    }

    pub fn with_high_resolution(mut self, high_resolution: bool) -> Self {
        self.high_resolution = high_resolution;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhotoCodec {
    Jpeg,
}

/// Settings handed to the photo output for one capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSettings {
    pub id: Uuid,
    pub codec: PhotoCodec,
    /// `None` means flash disabled
    pub flash: Option<FlashMode>,
    pub stabilization: bool,
    pub high_resolution: bool,
}

impl CaptureSettings {
    /// Resolve a request against the active device.
    pub fn for_request(request: &CaptureRequest, camera: CameraPosition) -> Self {
        Self {
            id: Uuid::new_v4(),
            codec: PhotoCodec::Jpeg,
            flash: camera.has_flash().then_some(request.flash),
            stabilization: request.stabilization,
            high_resolution: request.high_resolution,
        }
    }

    pub fn flash_enabled(&self) -> bool {
        matches!(self.flash, Some(FlashMode::On) | Some(FlashMode::Auto))
    }
}

/// Rotation of the live video connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

impl VideoOrientation {
    pub const ALL: [VideoOrientation; 4] = [
        VideoOrientation::Portrait,
        VideoOrientation::PortraitUpsideDown,
        VideoOrientation::LandscapeLeft,
        VideoOrientation::LandscapeRight,
    ];

    /// Physical device orientation to connection orientation.
    ///
    /// Landscape is mirrored: the device's right edge up means the sensor
    /// reads landscape-left.
    pub fn from_device(orientation: DeviceOrientation) -> Self {
        match orientation {
            DeviceOrientation::Portrait | DeviceOrientation::PortraitUpsideDown => {
                VideoOrientation::Portrait
            }
            DeviceOrientation::LandscapeRight => VideoOrientation::LandscapeLeft,
            DeviceOrientation::LandscapeLeft => VideoOrientation::LandscapeRight,
            DeviceOrientation::FaceUp | DeviceOrientation::FaceDown | DeviceOrientation::Unknown => {
                VideoOrientation::Portrait
            }
        }
    }

    /// Image orientation tag for a still taken through this connection
    pub fn image_orientation(&self) -> ImageOrientation {
        match self {
            VideoOrientation::Portrait => ImageOrientation::Right,
            VideoOrientation::PortraitUpsideDown => ImageOrientation::Left,
            VideoOrientation::LandscapeLeft => ImageOrientation::Down,
            VideoOrientation::LandscapeRight => ImageOrientation::Up,
        }
    }
}

/// Physical orientation reported by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceOrientation {
    #[default]
    Unknown,
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
}

/// How the decoded bitmap relates to its intended display orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageOrientation {
    Up,
    Down,
    Left,
    Right,
}

impl ImageOrientation {
    pub fn exif_tag(&self) -> u8 {
        match self {
            ImageOrientation::Up => 1,
            ImageOrientation::Down => 3,
            ImageOrientation::Right => 6,
            ImageOrientation::Left => 8,
        }
    }

    /// Rotate a bitmap so it displays upright
    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        match self {
            ImageOrientation::Up => image.clone(),
            ImageOrientation::Down => image::imageops::rotate180(image),
            ImageOrientation::Right => image::imageops::rotate90(image),
            ImageOrientation::Left => image::imageops::rotate270(image),
        }
    }
}

/// Completion payload from a photo output
#[derive(Debug, Clone, Default)]
pub struct RawPhoto {
    /// Encoded still-image data; `None` when the hardware produced no buffer
    pub buffer: Option<Bytes>,
    pub width: u32,
    pub height: u32,
}

impl RawPhoto {
    pub fn jpeg(data: impl Into<Bytes>, width: u32, height: u32) -> Self {
        Self {
            buffer: Some(data.into()),
            width,
            height,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Decoded still image tagged with its resolved orientation
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub id: Uuid,
    pub bitmap: RgbImage,
    pub orientation: ImageOrientation,
    pub camera: CameraPosition,
    pub captured_at: DateTime<Utc>,
}

impl CapturedImage {
    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }

    /// Bitmap rotated into its display orientation
    pub fn to_upright(&self) -> DynamicImage {
        DynamicImage::ImageRgb8(self.orientation.apply(&self.bitmap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_point_clamps() {
        let p = FocusPoint::new(-1.0, 2.5);
        assert_eq!(p, FocusPoint { x: 0.0, y: 1.0 });
        assert!(p.is_normalized());

        let nan = FocusPoint::new(f32::NAN, 0.25);
        assert_eq!(nan.x, 0.5);
        assert_eq!(nan.y, 0.25);
    }

    #[test]
    fn test_front_camera_never_flashes() {
        let request = CaptureRequest::new().with_flash(FlashMode::On);
        let settings = CaptureSettings::for_request(&request, CameraPosition::Front);
        assert_eq!(settings.flash, None);
        assert!(!settings.flash_enabled());

        let settings = CaptureSettings::for_request(&request, CameraPosition::Back);
        assert_eq!(settings.flash, Some(FlashMode::On));
        assert_eq!(settings.codec, PhotoCodec::Jpeg);
    }

    #[test]
    fn test_device_to_connection_orientation() {
        use DeviceOrientation::*;
        assert_eq!(VideoOrientation::from_device(Portrait), VideoOrientation::Portrait);
        assert_eq!(
            VideoOrientation::from_device(PortraitUpsideDown),
            VideoOrientation::Portrait
        );
        assert_eq!(
            VideoOrientation::from_device(LandscapeRight),
            VideoOrientation::LandscapeLeft
        );
        assert_eq!(
            VideoOrientation::from_device(LandscapeLeft),
            VideoOrientation::LandscapeRight
        );
        assert_eq!(VideoOrientation::from_device(FaceUp), VideoOrientation::Portrait);
        assert_eq!(VideoOrientation::from_device(Unknown), VideoOrientation::Portrait);
    }

    #[test]
    fn test_upright_rotation_swaps_dimensions() {
        let bitmap = RgbImage::new(4, 2);
        assert_eq!(ImageOrientation::Right.apply(&bitmap).dimensions(), (2, 4));
        assert_eq!(ImageOrientation::Left.apply(&bitmap).dimensions(), (2, 4));
        assert_eq!(ImageOrientation::Down.apply(&bitmap).dimensions(), (4, 2));
        assert_eq!(ImageOrientation::Up.apply(&bitmap).dimensions(), (4, 2));
    }

    #[test]
    fn test_position_parsing() {
        assert_eq!("FRONT".parse::<CameraPosition>(), Ok(CameraPosition::Front));
        assert_eq!("rear".parse::<CameraPosition>(), Ok(CameraPosition::Back));
        assert!("side".parse::<CameraPosition>().is_err());
        assert_eq!(CameraPosition::Front.other(), CameraPosition::Back);
    }
}
