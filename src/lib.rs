//! TwinCam: front/back camera session management
//!
//! This crate owns the lifecycle of a two-camera capture session: device
//! discovery, input switching, focus configuration, preview start/stop and
//! single-shot photo capture with orientation-correct results.
//!
//! # Features
//! - Front/back camera switching with exactly one active input
//! - Focus target applied to both devices under configuration locks
//! - Permission-gated preview start with deferred session setup
//! - Photo capture reported once through a weak delegate or an async future
//! - Pluggable hardware backends (nokhwa-based native, synthetic for tests)
//!
//! # Usage
//! ```rust,ignore
//! use std::sync::Arc;
//! use twincam::{
//!     CaptureRequest, CaptureSessionController, ImmediateDispatcher, NokhwaBackend,
//!     SystemAuthorization, TwinCamConfig,
//! };
//!
//! let config = TwinCamConfig::load_or_default();
//! let backend = NokhwaBackend::new(config.devices.clone(), config.capture.jpeg_quality);
//! let controller = CaptureSessionController::create(
//!     Arc::new(backend),
//!     Arc::new(SystemAuthorization),
//!     Arc::new(ImmediateDispatcher),
//!     config,
//! );
//! controller.start_preview(true);
//! controller.capture_photo(CaptureRequest::default())?;
//! ```
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod dispatch;
pub mod errors;
pub mod invariant_ppt;
pub mod permissions;
pub mod platform;
pub mod session;
pub mod types;

// Testing utilities - scriptable backend and recording delegate
pub mod testing;

// Re-exports for convenience
pub use config::TwinCamConfig;
pub use controller::CaptureSessionController;
pub use coordinator::{CaptureDelegate, CaptureRequestCoordinator, CaptureState, Submission};
pub use dispatch::{ChannelDispatcher, Dispatcher, ImmediateDispatcher, MainQueue};
pub use errors::CameraError;
pub use permissions::{AuthorizationProvider, PermissionStatus, StaticAuthorization, SystemAuthorization};
pub use platform::{CaptureBackend, CaptureDevice, DeviceInput, NokhwaBackend, PhotoOutput};
pub use session::{CaptureSession, PreviewLayout, PreviewSink, VideoGravity};
pub use types::{
    CameraPosition, CaptureRequest, CaptureSettings, CapturedImage, DeviceOrientation, FlashMode,
    FocusPoint, ImageOrientation, RawPhoto, SessionPreset, VideoOrientation,
};

/// Initialize logging for the camera system
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "twincam=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        os: std::env::consts::OS.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub os: String,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "twincam");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
        assert!(!info.os.is_empty());
    }

    #[test]
    fn test_crate_info_serializes() {
        let json = serde_json::to_string(&get_info()).unwrap();
        assert!(json.contains("\"name\":\"twincam\""));
    }
}
