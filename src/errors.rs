use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// Device or device input could not be constructed
    DeviceUnavailable(String),
    /// Exclusive configuration lock could not be acquired
    ConfigurationError(String),
    /// Hardware reported a failure while capturing
    CaptureError(String),
    /// Still-image buffer could not be turned into a bitmap
    DecodeError(String),
    PermissionDenied(String),
    /// A capture is still in flight
    Busy,
    InitializationError(String),
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CameraError::DeviceUnavailable(msg) => write!(f, "Camera device unavailable: {}", msg),
            CameraError::ConfigurationError(msg) => write!(f, "Camera configuration error: {}", msg),
            CameraError::CaptureError(msg) => write!(f, "Capture error: {}", msg),
            CameraError::DecodeError(msg) => write!(f, "Decode error: {}", msg),
            CameraError::PermissionDenied(msg) => write!(f, "Permission denied error: {}", msg),
            CameraError::Busy => write!(f, "Capture already in progress"),
            CameraError::InitializationError(msg) => write!(f, "Initialization error: {}", msg),
        }
    }
}

impl std::error::Error for CameraError {}

impl CameraError {
    /// Errors the controller absorbs into an inactive state instead of raising.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CameraError::DeviceUnavailable(_))
    }
}
