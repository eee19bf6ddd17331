//! Capture backend over the native camera APIs exposed by `nokhwa`.
//!
//! Desktop cameras carry no front/back position, so the two positions map to
//! device indices from [`DeviceConfig`]. Stills are grabbed from the stream on
//! a worker thread and JPEG-encoded before being handed to the completion.

use super::{CaptureBackend, CaptureDevice, DeviceInput, PhotoCompletion, PhotoOutput};
use crate::config::DeviceConfig;
use crate::errors::CameraError;
use crate::types::{CameraPosition, CaptureSettings, FocusPoint, RawPhoto};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
    CallbackCamera,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct Shared {
    devices_config: DeviceConfig,
    jpeg_quality: u8,
    devices: Mutex<HashMap<CameraPosition, Arc<NokhwaDevice>>>,
    running: Mutex<Option<CameraPosition>>,
}

impl Shared {
    fn device(&self, position: CameraPosition) -> Result<Arc<NokhwaDevice>, CameraError> {
        self.devices
            .lock()
            .map_err(|_| CameraError::DeviceUnavailable("device table lock poisoned".to_string()))?
            .get(&position)
            .cloned()
            .ok_or_else(|| {
                CameraError::DeviceUnavailable(format!("{} camera was never discovered", position))
            })
    }
}

#[derive(Clone)]
pub struct NokhwaBackend {
    shared: Arc<Shared>,
}

impl NokhwaBackend {
    pub fn new(devices_config: DeviceConfig, jpeg_quality: u8) -> Self {
        Self {
            shared: Arc::new(Shared {
                devices_config,
                jpeg_quality,
                devices: Mutex::new(HashMap::new()),
                running: Mutex::new(None),
            }),
        }
    }

    fn index_for(&self, position: CameraPosition) -> u32 {
        match position {
            CameraPosition::Front => self.shared.devices_config.front_index,
            CameraPosition::Back => self.shared.devices_config.back_index,
        }
    }

    /// Enumerate attached cameras as (index, name) pairs
    pub fn list_cameras() -> Result<Vec<(String, String)>, CameraError> {
        let cameras = query(ApiBackend::Auto).map_err(|e| {
            CameraError::DeviceUnavailable(format!("Failed to query cameras: {}", e))
        })?;
        Ok(cameras
            .into_iter()
            .map(|info| (info.index().to_string(), info.human_name()))
            .collect())
    }
}

impl CaptureBackend for NokhwaBackend {
    fn name(&self) -> &str {
        "nokhwa"
    }

    fn device(&self, position: CameraPosition) -> Result<Arc<dyn CaptureDevice>, CameraError> {
        let index = self.index_for(position);
        let cameras = query(ApiBackend::Auto).map_err(|e| {
            CameraError::DeviceUnavailable(format!("Failed to query cameras: {}", e))
        })?;
        let info = cameras
            .into_iter()
            .find(|info| matches!(info.index(), CameraIndex::Index(i) if *i == index))
            .ok_or_else(|| {
                CameraError::DeviceUnavailable(format!(
                    "No camera at index {} for {} position",
                    index, position
                ))
            })?;

        log::debug!("Discovered {} camera: {} (index {})", position, info.human_name(), index);

        let mut devices = self
            .shared
            .devices
            .lock()
            .map_err(|_| CameraError::DeviceUnavailable("device table lock poisoned".to_string()))?;
        let device = devices
            .entry(position)
            .or_insert_with(|| {
                Arc::new(NokhwaDevice {
                    position,
                    index,
                    name: info.human_name(),
                    camera: Mutex::new(None),
                    locked: AtomicBool::new(false),
                    focus: Mutex::new(None),
                })
            })
            .clone();
        Ok(device)
    }

    fn open_input(&self, device: Arc<dyn CaptureDevice>) -> Result<DeviceInput, CameraError> {
        let hardware = self.shared.device(device.position())?;
        let requested_format =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

        let camera = CallbackCamera::new(CameraIndex::Index(hardware.index), requested_format, |_| {})
            .map_err(|e| {
                CameraError::DeviceUnavailable(format!(
                    "Failed to open {} camera: {}",
                    hardware.position, e
                ))
            })?;

        *hardware
            .camera
            .lock()
            .map_err(|_| CameraError::DeviceUnavailable("camera lock poisoned".to_string()))? =
            Some(camera);

        Ok(DeviceInput::new(device))
    }

    fn close_input(&self, input: DeviceInput) {
        let Ok(hardware) = self.shared.device(input.position()) else {
            return;
        };
        let camera = match hardware.camera.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(mut camera) = camera {
            if camera.is_stream_open().unwrap_or(false) {
                if let Err(e) = camera.stop_stream() {
                    log::warn!("Failed to stop {} camera stream: {}", input.position(), e);
                }
            }
            log::debug!("Closed {} camera input", input.position());
        }
    }

    fn create_photo_output(&self) -> Arc<dyn PhotoOutput> {
        Arc::new(NokhwaPhotoOutput {
            shared: self.shared.clone(),
            high_resolution: AtomicBool::new(false),
        })
    }

    fn start_running(&self, input: &DeviceInput) -> Result<(), CameraError> {
        let hardware = self.shared.device(input.position())?;
        let mut guard = hardware
            .camera
            .lock()
            .map_err(|_| CameraError::InitializationError("Failed to lock camera".to_string()))?;
        let camera = guard.as_mut().ok_or_else(|| {
            CameraError::DeviceUnavailable(format!("{} camera input not open", input.position()))
        })?;

        if !camera.is_stream_open().unwrap_or(false) {
            camera.open_stream().map_err(|e| {
                CameraError::InitializationError(format!("Failed to start stream: {}", e))
            })?;
        }

        if let Ok(mut running) = self.shared.running.lock() {
            *running = Some(input.position());
        }
        Ok(())
    }

    fn stop_running(&self) {
        let running = self.shared.running.lock().ok().and_then(|mut r| r.take());
        let Some(position) = running else {
            return;
        };
        let Ok(hardware) = self.shared.device(position) else {
            return;
        };
        if let Ok(mut guard) = hardware.camera.lock() {
            if let Some(camera) = guard.as_mut() {
                if let Err(e) = camera.stop_stream() {
                    log::warn!("Failed to stop {} camera stream: {}", position, e);
                }
            }
        };
    }
}

pub struct NokhwaDevice {
    position: CameraPosition,
    index: u32,
    name: String,
    camera: Mutex<Option<CallbackCamera>>,
    locked: AtomicBool,
    focus: Mutex<Option<FocusPoint>>,
}

impl CaptureDevice for NokhwaDevice {
    fn position(&self) -> CameraPosition {
        self.position
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn lock_for_configuration(&self) -> Result<(), CameraError> {
        if self.locked.swap(true, Ordering::SeqCst) {
            return Err(CameraError::ConfigurationError(format!(
                "{} already locked for configuration",
                self.name
            )));
        }
        Ok(())
    }

    fn unlock_for_configuration(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }

    // UVC exposes focus distance only, no point of interest
    fn supports_focus_point(&self) -> bool {
        false
    }

    fn set_focus_point(&self, point: FocusPoint) {
        if let Ok(mut focus) = self.focus.lock() {
            *focus = Some(point);
        }
    }

    fn focus_point(&self) -> Option<FocusPoint> {
        self.focus.lock().ok().and_then(|f| *f)
    }
}

struct NokhwaPhotoOutput {
    shared: Arc<Shared>,
    high_resolution: AtomicBool,
}

impl PhotoOutput for NokhwaPhotoOutput {
    fn set_high_resolution_capture_enabled(&self, enabled: bool) {
        self.high_resolution.store(enabled, Ordering::SeqCst);
    }

    fn high_resolution_capture_enabled(&self) -> bool {
        self.high_resolution.load(Ordering::SeqCst)
    }

    fn capture_photo(&self, input: &DeviceInput, settings: CaptureSettings, completion: PhotoCompletion) {
        let position = input.position();
        let shared = self.shared.clone();

        if settings.flash_enabled() || settings.stabilization {
            log::debug!("Flash and stabilization are not available through nokhwa, ignoring");
        }

        // Shared so a failed spawn can still complete the capture
        let slot = Arc::new(Mutex::new(Some(completion)));
        let worker_slot = slot.clone();

        let spawned = std::thread::Builder::new()
            .name("twincam-capture".to_string())
            .spawn(move || {
                let result = shared
                    .device(position)
                    .map_err(|e| CameraError::CaptureError(e.to_string()))
                    .and_then(|hardware| {
                        grab_still(&hardware, shared.devices_config.warmup_frames, shared.jpeg_quality)
                    });
                if let Some(completion) = take_completion(&worker_slot) {
                    completion(result);
                }
            });

        if let Err(e) = spawned {
            log::error!("Failed to spawn capture thread: {}", e);
            if let Some(completion) = take_completion(&slot) {
                completion(Err(CameraError::CaptureError(format!(
                    "Failed to spawn capture thread: {}",
                    e
                ))));
            }
        }
    }
}

fn take_completion(slot: &Mutex<Option<PhotoCompletion>>) -> Option<PhotoCompletion> {
    match slot.lock() {
        Ok(mut slot) => slot.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}

fn grab_still(hardware: &NokhwaDevice, warmup_frames: u32, quality: u8) -> Result<RawPhoto, CameraError> {
    let mut guard = hardware
        .camera
        .lock()
        .map_err(|_| CameraError::CaptureError("Failed to lock camera".to_string()))?;
    let camera = guard
        .as_mut()
        .ok_or_else(|| CameraError::CaptureError("camera input not open".to_string()))?;

    let opened_here = !camera.is_stream_open().unwrap_or(false);
    if opened_here {
        camera
            .open_stream()
            .map_err(|e| CameraError::CaptureError(format!("Failed to start stream: {}", e)))?;
        for _ in 0..warmup_frames {
            let _ = camera.poll_frame();
        }
    }

    let frame = camera
        .poll_frame()
        .map_err(|e| CameraError::CaptureError(format!("Failed to capture frame: {}", e)));

    if opened_here {
        if let Err(e) = camera.stop_stream() {
            log::warn!("Failed to stop stream after capture: {}", e);
        }
    }

    let decoded = frame?
        .decode_image::<RgbFormat>()
        .map_err(|e| CameraError::CaptureError(format!("Failed to convert frame: {}", e)))?;
    let (width, height) = (decoded.width(), decoded.height());
    let pixels = decoded.into_raw();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode(&pixels, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| CameraError::CaptureError(format!("Failed to encode still: {}", e)))?;

    Ok(RawPhoto::jpeg(jpeg, width, height))
}
