//! Scriptable in-memory capture backend
//!
//! Stands in for camera hardware in tests and demos. Every interaction is
//! journaled so tests can assert on lock ordering, settings and lifecycle.

use super::synthetic_data::{corrupt_jpeg, synthetic_jpeg};
use crate::errors::CameraError;
use crate::platform::{CaptureBackend, CaptureDevice, DeviceInput, PhotoCompletion, PhotoOutput};
use crate::types::{CameraPosition, CaptureSettings, FocusPoint, RawPhoto};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// What the next capture produces
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoOutcome {
    Jpeg { width: u32, height: u32 },
    Error(String),
    EmptyBuffer,
    Corrupt,
    /// The completion is dropped without ever being called
    Lost,
}

/// How completions are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Spawn a worker thread per capture
    Thread,
    /// Hold completions until `complete_pending` is called
    Manual,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HardwareEvent {
    Locked(CameraPosition),
    Unlocked(CameraPosition),
    Focused(CameraPosition, FocusPoint),
    Started(CameraPosition),
    Stopped,
}

#[derive(Default)]
struct Script {
    missing: HashSet<CameraPosition>,
    failing_inputs: HashSet<CameraPosition>,
    no_focus: HashSet<CameraPosition>,
    lock_failures: HashSet<CameraPosition>,
    outcomes: VecDeque<PhotoOutcome>,
}

struct Shared {
    script: Mutex<Script>,
    delivery: Mutex<Delivery>,
    devices: Mutex<HashMap<CameraPosition, Arc<SyntheticDevice>>>,
    journal: Mutex<Vec<HardwareEvent>>,
    settings: Mutex<Vec<CaptureSettings>>,
    pending: Mutex<Vec<(PhotoCompletion, Result<RawPhoto, CameraError>)>>,
    inputs_opened: AtomicU64,
    inputs_closed: AtomicU64,
    outputs_created: AtomicU64,
    capture_seed: AtomicU64,
}

impl Shared {
    fn log(&self, event: HardwareEvent) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(event);
        }
    }
}

#[derive(Clone)]
pub struct SyntheticBackend {
    shared: Arc<Shared>,
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                script: Mutex::new(Script::default()),
                delivery: Mutex::new(Delivery::Thread),
                devices: Mutex::new(HashMap::new()),
                journal: Mutex::new(Vec::new()),
                settings: Mutex::new(Vec::new()),
                pending: Mutex::new(Vec::new()),
                inputs_opened: AtomicU64::new(0),
                inputs_closed: AtomicU64::new(0),
                outputs_created: AtomicU64::new(0),
                capture_seed: AtomicU64::new(0),
            }),
        }
    }

    fn script(&self, f: impl FnOnce(&mut Script)) {
        if let Ok(mut script) = self.shared.script.lock() {
            f(&mut script);
        }
    }

    pub fn without_device(self, position: CameraPosition) -> Self {
        self.script(|s| {
            s.missing.insert(position);
        });
        self
    }

    pub fn with_failing_input(self, position: CameraPosition) -> Self {
        self.script(|s| {
            s.failing_inputs.insert(position);
        });
        self
    }

    pub fn without_focus_point(self, position: CameraPosition) -> Self {
        self.script(|s| {
            s.no_focus.insert(position);
        });
        self
    }

    pub fn with_lock_failure(self, position: CameraPosition) -> Self {
        self.script(|s| {
            s.lock_failures.insert(position);
        });
        self
    }

    pub fn with_delivery(self, delivery: Delivery) -> Self {
        if let Ok(mut d) = self.shared.delivery.lock() {
            *d = delivery;
        }
        self
    }

    /// Queue the outcome of a future capture; unscripted captures succeed
    pub fn push_outcome(&self, outcome: PhotoOutcome) {
        self.script(|s| s.outcomes.push_back(outcome));
    }

    /// Fire every held completion; returns how many fired
    pub fn complete_pending(&self) -> usize {
        let pending = match self.shared.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => return 0,
        };
        let count = pending.len();
        for (completion, result) in pending {
            completion(result);
        }
        count
    }

    pub fn pending_completions(&self) -> usize {
        self.shared.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn journal(&self) -> Vec<HardwareEvent> {
        self.shared.journal.lock().map(|j| j.clone()).unwrap_or_default()
    }

    pub fn clear_journal(&self) {
        if let Ok(mut journal) = self.shared.journal.lock() {
            journal.clear();
        }
    }

    /// Settings of every submitted capture, in order
    pub fn submitted_settings(&self) -> Vec<CaptureSettings> {
        self.shared.settings.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn inputs_opened(&self) -> u64 {
        self.shared.inputs_opened.load(Ordering::SeqCst)
    }

    /// Inputs opened and not yet closed
    pub fn open_inputs(&self) -> u64 {
        self.inputs_opened() - self.shared.inputs_closed.load(Ordering::SeqCst)
    }

    pub fn outputs_created(&self) -> u64 {
        self.shared.outputs_created.load(Ordering::SeqCst)
    }

    /// The device handed out for `position`, if any was requested yet
    pub fn device_handle(&self, position: CameraPosition) -> Option<Arc<SyntheticDevice>> {
        self.shared.devices.lock().ok()?.get(&position).cloned()
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn device(&self, position: CameraPosition) -> Result<Arc<dyn CaptureDevice>, CameraError> {
        let script = self
            .shared
            .script
            .lock()
            .map_err(|_| CameraError::DeviceUnavailable("script lock poisoned".to_string()))?;
        if script.missing.contains(&position) {
            return Err(CameraError::DeviceUnavailable(format!(
                "no {} camera present",
                position
            )));
        }

        let mut devices = self
            .shared
            .devices
            .lock()
            .map_err(|_| CameraError::DeviceUnavailable("device lock poisoned".to_string()))?;
        let device = devices
            .entry(position)
            .or_insert_with(|| {
                Arc::new(SyntheticDevice {
                    position,
                    supports_focus: !script.no_focus.contains(&position),
                    fail_lock: AtomicBool::new(script.lock_failures.contains(&position)),
                    locked: AtomicBool::new(false),
                    focus: Mutex::new(None),
                    shared: self.shared.clone(),
                })
            })
            .clone();
        Ok(device)
    }

    fn open_input(&self, device: Arc<dyn CaptureDevice>) -> Result<DeviceInput, CameraError> {
        let failing = self
            .shared
            .script
            .lock()
            .map(|s| s.failing_inputs.contains(&device.position()))
            .unwrap_or(true);
        if failing {
            return Err(CameraError::DeviceUnavailable(format!(
                "cannot open {} camera input",
                device.position()
            )));
        }
        self.shared.inputs_opened.fetch_add(1, Ordering::SeqCst);
        Ok(DeviceInput::new(device))
    }

    fn close_input(&self, _input: DeviceInput) {
        self.shared.inputs_closed.fetch_add(1, Ordering::SeqCst);
    }

    fn create_photo_output(&self) -> Arc<dyn PhotoOutput> {
        self.shared.outputs_created.fetch_add(1, Ordering::SeqCst);
        Arc::new(SyntheticPhotoOutput {
            shared: self.shared.clone(),
            high_resolution: AtomicBool::new(false),
        })
    }

    fn start_running(&self, input: &DeviceInput) -> Result<(), CameraError> {
        self.shared.log(HardwareEvent::Started(input.position()));
        Ok(())
    }

    fn stop_running(&self) {
        self.shared.log(HardwareEvent::Stopped);
    }
}

pub struct SyntheticDevice {
    position: CameraPosition,
    supports_focus: bool,
    fail_lock: AtomicBool,
    locked: AtomicBool,
    focus: Mutex<Option<FocusPoint>>,
    shared: Arc<Shared>,
}

impl SyntheticDevice {
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    pub fn set_lock_failure(&self, fail: bool) {
        self.fail_lock.store(fail, Ordering::SeqCst);
    }
}

impl CaptureDevice for SyntheticDevice {
    fn position(&self) -> CameraPosition {
        self.position
    }

    fn name(&self) -> String {
        format!("Synthetic {} camera", self.position)
    }

    fn lock_for_configuration(&self) -> Result<(), CameraError> {
        if self.fail_lock.load(Ordering::SeqCst) {
            return Err(CameraError::ConfigurationError(format!(
                "{} camera is locked by another client",
                self.position
            )));
        }
        if self.locked.swap(true, Ordering::SeqCst) {
            return Err(CameraError::ConfigurationError(format!(
                "{} camera already locked",
                self.position
            )));
        }
        self.shared.log(HardwareEvent::Locked(self.position));
        Ok(())
    }

    fn unlock_for_configuration(&self) {
        if self.locked.swap(false, Ordering::SeqCst) {
            self.shared.log(HardwareEvent::Unlocked(self.position));
        }
    }

    fn supports_focus_point(&self) -> bool {
        self.supports_focus
    }

    fn set_focus_point(&self, point: FocusPoint) {
        if !self.is_locked() {
            log::warn!("Focus set on unlocked {} camera", self.position);
        }
        if let Ok(mut focus) = self.focus.lock() {
            *focus = Some(point);
        }
        self.shared.log(HardwareEvent::Focused(self.position, point));
    }

    fn focus_point(&self) -> Option<FocusPoint> {
        self.focus.lock().ok().and_then(|f| *f)
    }
}

struct SyntheticPhotoOutput {
    shared: Arc<Shared>,
    high_resolution: AtomicBool,
}

impl PhotoOutput for SyntheticPhotoOutput {
    fn set_high_resolution_capture_enabled(&self, enabled: bool) {
        self.high_resolution.store(enabled, Ordering::SeqCst);
    }

    fn high_resolution_capture_enabled(&self) -> bool {
        self.high_resolution.load(Ordering::SeqCst)
    }

    fn capture_photo(&self, _input: &DeviceInput, settings: CaptureSettings, completion: PhotoCompletion) {
        if let Ok(mut submitted) = self.shared.settings.lock() {
            submitted.push(settings);
        }

        let outcome = self
            .shared
            .script
            .lock()
            .ok()
            .and_then(|mut s| s.outcomes.pop_front())
            .unwrap_or(PhotoOutcome::Jpeg {
                width: 64,
                height: 48,
            });
        let seed = self.shared.capture_seed.fetch_add(1, Ordering::SeqCst);

        if outcome == PhotoOutcome::Lost {
            drop(completion);
            return;
        }

        let result = match outcome {
            PhotoOutcome::Jpeg { width, height } => {
                Ok(RawPhoto::jpeg(synthetic_jpeg(seed, width, height), width, height))
            }
            PhotoOutcome::Error(message) => Err(CameraError::CaptureError(message)),
            PhotoOutcome::EmptyBuffer => Ok(RawPhoto::empty()),
            PhotoOutcome::Corrupt => Ok(RawPhoto::jpeg(corrupt_jpeg(), 0, 0)),
            PhotoOutcome::Lost => return,
        };

        let delivery = self
            .shared
            .delivery
            .lock()
            .map(|d| *d)
            .unwrap_or(Delivery::Thread);
        match delivery {
            Delivery::Thread => {
                std::thread::spawn(move || completion(result));
            }
            Delivery::Manual => {
                if let Ok(mut pending) = self.shared.pending.lock() {
                    pending.push((completion, result));
                }
            }
        }
    }
}
