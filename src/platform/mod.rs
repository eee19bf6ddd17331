//! Hardware seams consumed by the session controller.
//!
//! A [`CaptureBackend`] hands out the two physical devices, wraps them as
//! session inputs, creates the photo output and runs the session. The
//! controller never talks to hardware except through these traits.

pub mod native;

use crate::errors::CameraError;
use crate::types::{CameraPosition, CaptureSettings, FocusPoint, RawPhoto};
use std::fmt;
use std::sync::Arc;

pub use self::native::NokhwaBackend;

/// Invoked exactly once per submitted capture, on a backend thread
pub type PhotoCompletion = Box<dyn FnOnce(Result<RawPhoto, CameraError>) + Send + 'static>;

pub trait CaptureBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Default wide-angle video device at the given position
    fn device(&self, position: CameraPosition) -> Result<Arc<dyn CaptureDevice>, CameraError>;

    /// Bind a device as a session source
    fn open_input(&self, device: Arc<dyn CaptureDevice>) -> Result<DeviceInput, CameraError>;

    /// Release the hardware held by an input that will never join a session
    fn close_input(&self, input: DeviceInput);

    fn create_photo_output(&self) -> Arc<dyn PhotoOutput>;

    /// Start delivering frames from `input`
    fn start_running(&self, input: &DeviceInput) -> Result<(), CameraError>;

    fn stop_running(&self);
}

pub trait CaptureDevice: Send + Sync {
    fn position(&self) -> CameraPosition;

    fn name(&self) -> String;

    /// Exclusive configuration lock; must be paired with `unlock_for_configuration`
    fn lock_for_configuration(&self) -> Result<(), CameraError>;

    fn unlock_for_configuration(&self);

    fn supports_focus_point(&self) -> bool;

    /// Only valid while the configuration lock is held
    fn set_focus_point(&self, point: FocusPoint);

    fn focus_point(&self) -> Option<FocusPoint>;
}

pub trait PhotoOutput: Send + Sync {
    fn set_high_resolution_capture_enabled(&self, enabled: bool);

    fn high_resolution_capture_enabled(&self) -> bool;

    /// Submit one capture; `completion` fires once, off the caller's thread
    fn capture_photo(&self, input: &DeviceInput, settings: CaptureSettings, completion: PhotoCompletion);
}

/// A device bound into a session as a source
#[derive(Clone)]
pub struct DeviceInput {
    device: Arc<dyn CaptureDevice>,
}

impl DeviceInput {
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &Arc<dyn CaptureDevice> {
        &self.device
    }

    pub fn position(&self) -> CameraPosition {
        self.device.position()
    }
}

impl fmt::Debug for DeviceInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceInput")
            .field("position", &self.position())
            .field("device", &self.device.name())
            .finish()
    }
}

impl PartialEq for DeviceInput {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.device, &other.device)
    }
}
