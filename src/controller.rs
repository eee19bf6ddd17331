//! Camera session lifecycle
//!
//! [`CaptureSessionController`] owns the hardware session for a front/back
//! camera pair: device discovery, input wiring, the focus target, preview
//! start/stop and the delegate slot that capture results are reported to.
//!
//! All public calls are expected from one owning thread. Permission answers
//! and capture completions arrive on backend threads and are routed through
//! the [`Dispatcher`] given at construction before any state or delegate is
//! touched.
//!
//! An in-flight capture is not serialized against `set_camera_type` or
//! `set_focus_target`; the still may reflect either the old or new state.

use crate::config::TwinCamConfig;
use crate::coordinator::{
    CaptureDelegate, CaptureRequestCoordinator, CaptureState, CaptureTarget, DelegateSlot,
    Submission,
};
use crate::dispatch::Dispatcher;
use crate::errors::CameraError;
use crate::permissions::AuthorizationProvider;
use crate::platform::{CaptureBackend, DeviceInput};
use crate::session::{CaptureSession, PreviewSink};
use crate::types::{
    CameraPosition, CaptureRequest, CapturedImage, DeviceOrientation, FocusPoint,
    VideoOrientation,
};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use tokio::sync::oneshot;

struct ControllerState {
    camera_type: CameraPosition,
    focus_target: FocusPoint,
    front_input: Option<DeviceInput>,
    back_input: Option<DeviceInput>,
    session: Option<CaptureSession>,
    preview: Option<Arc<PreviewSink>>,
    coordinator: CaptureRequestCoordinator,
}

impl ControllerState {
    fn input_for(&self, position: CameraPosition) -> Option<&DeviceInput> {
        match position {
            CameraPosition::Front => self.front_input.as_ref(),
            CameraPosition::Back => self.back_input.as_ref(),
        }
    }
}

/// Shared between the controller and callbacks that outlive a single call
struct Core {
    backend: Arc<dyn CaptureBackend>,
    config: TwinCamConfig,
    state: Mutex<ControllerState>,
}

impl Core {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => {
                log::warn!("Controller state lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn setup_session(&self, state: &mut ControllerState) -> bool {
        if state.session.is_some() {
            return true;
        }

        let front = match self.discover(CameraPosition::Front) {
            Ok(input) => input,
            Err(e) => {
                log::warn!("Capture unavailable: {}", e);
                return false;
            }
        };
        let back = match self.discover(CameraPosition::Back) {
            Ok(input) => input,
            Err(e) => {
                log::warn!("Capture unavailable: {}", e);
                self.backend.close_input(front);
                return false;
            }
        };
        state.front_input = Some(front);
        state.back_input = Some(back);

        let mut session = CaptureSession::new();
        session.set_preset(self.config.session.preset);

        let output = self.backend.create_photo_output();
        output.set_high_resolution_capture_enabled(self.config.capture.high_resolution);
        session.add_output(output.clone());
        state.session = Some(session);

        if let Err(e) = self.apply_camera_type(state) {
            log::error!("Failed to attach {} camera: {}", state.camera_type, e);
        }
        if let Err(e) = self.apply_focus_target(state) {
            log::warn!("Initial focus target not applied: {}", e);
        }

        let preview = Arc::new(PreviewSink::new(self.config.session.rotate_preview));
        state.coordinator.attach(output, preview.clone());
        state.preview = Some(preview);

        log::info!(
            "Capture session configured on {} backend ({} camera active)",
            self.backend.name(),
            state.camera_type
        );
        true
    }

    fn discover(&self, position: CameraPosition) -> Result<DeviceInput, CameraError> {
        let device = self.backend.device(position)?;
        self.backend.open_input(device)
    }

    /// Swap the attached input to the selected camera in one configuration block
    fn apply_camera_type(&self, state: &mut ControllerState) -> Result<(), CameraError> {
        let selected = state.camera_type;
        let (Some(new_input), Some(old_input)) = (
            state.input_for(selected).cloned(),
            state.input_for(selected.other()).cloned(),
        ) else {
            return Ok(());
        };
        let Some(session) = state.session.as_mut() else {
            return Ok(());
        };

        session.configure(|s| {
            if s.has_inputs() {
                s.remove_input(&old_input);
            }
            s.add_input(new_input.clone())
        })?;

        if session.is_running() {
            self.backend.stop_running();
            if let Err(e) = self.backend.start_running(&new_input) {
                log::error!("Failed to restart session on {} camera: {}", selected, e);
                session.set_running(false);
            }
        }
        Ok(())
    }

    /// Lock front then back, focus whichever supports a point, unlock in reverse
    fn apply_focus_target(&self, state: &ControllerState) -> Result<(), CameraError> {
        if !self.config.session.supports_focus_point {
            return Ok(());
        }
        let (Some(front), Some(back)) = (state.front_input.as_ref(), state.back_input.as_ref()) else {
            return Ok(());
        };
        let point = state.focus_target;

        front
            .device()
            .lock_for_configuration()
            .map_err(as_configuration_error)?;
        if let Err(e) = back.device().lock_for_configuration() {
            front.device().unlock_for_configuration();
            return Err(as_configuration_error(e));
        }

        for input in [front, back] {
            if input.device().supports_focus_point() {
                input.device().set_focus_point(point);
            }
        }

        back.device().unlock_for_configuration();
        front.device().unlock_for_configuration();

        log::debug!("Focus target set to ({:.3}, {:.3})", point.x, point.y);
        Ok(())
    }

    fn start_session(&self) {
        let mut state = self.lock();
        if !self.setup_session(&mut state) {
            return;
        }
        let Some(session) = state.session.as_mut() else {
            return;
        };
        if session.is_running() {
            return;
        }
        let Some(input) = session.active_input().cloned() else {
            log::warn!("Cannot start session without a device input");
            return;
        };
        match self.backend.start_running(&input) {
            Ok(()) => {
                session.set_running(true);
                log::info!("Capture session running ({} camera)", input.position());
            }
            Err(e) => log::error!("Failed to start capture session: {}", e),
        }
    }
}

fn as_configuration_error(error: CameraError) -> CameraError {
    match error {
        CameraError::ConfigurationError(_) => error,
        other => CameraError::ConfigurationError(other.to_string()),
    }
}

/// Owner of the capture session for a front/back camera pair
pub struct CaptureSessionController {
    core: Arc<Core>,
    authorization: Arc<dyn AuthorizationProvider>,
    dispatcher: Arc<dyn Dispatcher>,
    delegate: DelegateSlot,
}

impl CaptureSessionController {
    /// Build a controller without touching hardware
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        authorization: Arc<dyn AuthorizationProvider>,
        dispatcher: Arc<dyn Dispatcher>,
        config: TwinCamConfig,
    ) -> Self {
        let state = ControllerState {
            camera_type: config.session.default_camera,
            focus_target: config.focus_point(),
            front_input: None,
            back_input: None,
            session: None,
            preview: None,
            coordinator: CaptureRequestCoordinator::new(
                dispatcher.clone(),
                config.capture.report_decode_failures,
            ),
        };

        Self {
            core: Arc::new(Core {
                backend,
                config,
                state: Mutex::new(state),
            }),
            authorization,
            dispatcher,
            delegate: Arc::new(RwLock::new(None)),
        }
    }

    /// `new` followed by `initialize`
    pub fn create(
        backend: Arc<dyn CaptureBackend>,
        authorization: Arc<dyn AuthorizationProvider>,
        dispatcher: Arc<dyn Dispatcher>,
        config: TwinCamConfig,
    ) -> Self {
        let controller = Self::new(backend, authorization, dispatcher, config);
        controller.initialize();
        controller
    }

    /// Build the session now if capture is already authorized
    pub fn initialize(&self) {
        if self.authorized_for_capture() {
            self.setup_session();
        } else {
            log::info!(
                "Camera not authorized ({}), deferring session setup",
                self.authorization.status()
            );
        }
    }

    /// Discover both cameras and build the session.
    ///
    /// Returns `false` and leaves the session unset when either camera or its
    /// input is unavailable.
    pub fn setup_session(&self) -> bool {
        let mut state = self.core.lock();
        self.core.setup_session(&mut state)
    }

    pub fn config(&self) -> &TwinCamConfig {
        &self.core.config
    }

    pub fn camera_type(&self) -> CameraPosition {
        self.core.lock().camera_type
    }

    pub fn set_camera_type(&self, camera_type: CameraPosition) {
        let mut state = self.core.lock();
        if state.camera_type == camera_type {
            return;
        }
        let previous = state.camera_type;
        state.camera_type = camera_type;
        match self.core.apply_camera_type(&mut state) {
            Ok(()) => log::info!("Switched camera from {} to {}", previous, camera_type),
            Err(e) => log::error!("Failed to switch to {} camera: {}", camera_type, e),
        }
    }

    pub fn focus_target(&self) -> FocusPoint {
        self.core.lock().focus_target
    }

    /// Store the focus target and push it to both devices.
    ///
    /// Best effort: a lock failure on the back device leaves the front device
    /// untouched, but nothing already applied is rolled back.
    pub fn set_focus_target(&self, point: FocusPoint) -> Result<(), CameraError> {
        let mut state = self.core.lock();
        state.focus_target = FocusPoint::new(point.x, point.y);
        self.core.apply_focus_target(&state)
    }

    pub fn authorized_for_capture(&self) -> bool {
        self.authorization.status().is_authorized()
    }

    pub fn is_session_configured(&self) -> bool {
        self.core.lock().session.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.core
            .lock()
            .session
            .as_ref()
            .is_some_and(|s| s.is_running())
    }

    /// Camera whose input is currently attached to the session
    pub fn active_camera(&self) -> Option<CameraPosition> {
        self.core
            .lock()
            .session
            .as_ref()
            .and_then(|s| s.active_input())
            .map(|i| i.position())
    }

    /// Positions of every attached input, in attach order
    pub fn attached_inputs(&self) -> Vec<CameraPosition> {
        self.core
            .lock()
            .session
            .as_ref()
            .map(|s| s.inputs().iter().map(|i| i.position()).collect())
            .unwrap_or_default()
    }

    /// Input add/remove operations applied to the session so far
    pub fn input_operations(&self) -> u64 {
        self.core
            .lock()
            .session
            .as_ref()
            .map_or(0, |s| s.input_operations())
    }

    /// Render target for the presentation layer; `None` until set up
    pub fn preview(&self) -> Option<Arc<PreviewSink>> {
        self.core.lock().preview.clone()
    }

    /// Report a layout pass from the presentation layer
    pub fn layout_preview(&self, width: u32, height: u32, device_orientation: DeviceOrientation) {
        let Some(preview) = self.preview() else {
            return;
        };
        preview.set_frame(width, height);
        let orientation = VideoOrientation::from_device(device_orientation);
        if preview.set_connection_orientation(orientation) {
            log::debug!("Preview connection orientation set to {:?}", orientation);
        }
    }

    pub fn capture_state(&self) -> CaptureState {
        self.core.lock().coordinator.state()
    }

    pub fn set_delegate<D: CaptureDelegate + 'static>(&self, delegate: &Arc<D>) {
        let weak: Weak<dyn CaptureDelegate> = Arc::downgrade(delegate) as Weak<dyn CaptureDelegate>;
        match self.delegate.write() {
            Ok(mut slot) => *slot = Some(weak),
            Err(poisoned) => *poisoned.into_inner() = Some(weak),
        }
    }

    pub fn clear_delegate(&self) {
        match self.delegate.write() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    /// Start the live session, prompting for access first if allowed.
    ///
    /// The prompt path returns immediately; the session starts from the
    /// dispatched permission callback once access is granted.
    pub fn start_preview(&self, request_permission_if_needed: bool) {
        if self.authorized_for_capture() {
            self.core.start_session();
            return;
        }

        if !request_permission_if_needed {
            log::debug!("Camera not authorized, not starting preview");
            return;
        }

        let core = Arc::downgrade(&self.core);
        let dispatcher = self.dispatcher.clone();
        self.authorization.request_access(Box::new(move |granted| {
            dispatcher.dispatch(Box::new(move || {
                if !granted {
                    log::info!("Camera access denied, preview not started");
                    return;
                }
                match core.upgrade() {
                    Some(core) => core.start_session(),
                    None => log::debug!("Controller dropped before camera access was granted"),
                }
            }));
        }));
    }

    pub fn stop_preview(&self) {
        let mut state = self.core.lock();
        if let Some(session) = state.session.as_mut() {
            if session.is_running() {
                self.core.backend.stop_running();
                session.set_running(false);
                log::info!("Capture session stopped");
            }
        }
    }

    /// Submit a capture; the outcome arrives through the delegate.
    ///
    /// A no-op returning [`Submission::Skipped`] when no session exists.
    /// Fails with [`CameraError::Busy`] while a previous capture is in flight.
    pub fn capture_photo(&self, request: CaptureRequest) -> Result<Submission, CameraError> {
        self.submit(request, CaptureTarget::Delegate(self.delegate.clone()))
    }

    /// Capture with configured default stabilization and flash
    pub fn capture_photo_with_defaults(&self) -> Result<Submission, CameraError> {
        let capture = &self.core.config.capture;
        self.capture_photo(
            CaptureRequest::new()
                .with_flash(capture.default_flash)
                .with_stabilization(capture.default_stabilization),
        )
    }

    /// Capture and await the outcome directly instead of through the delegate.
    ///
    /// The result is still routed through the dispatcher, so with a
    /// channel dispatcher the main queue must be pumped for this to resolve.
    pub async fn capture_photo_async(
        &self,
        request: CaptureRequest,
    ) -> Result<CapturedImage, CameraError> {
        let (sender, receiver) = oneshot::channel();
        let sink: Arc<dyn CaptureDelegate> = Arc::new(OneshotDelegate {
            sender: Mutex::new(Some(sender)),
        });

        match self.submit(request, CaptureTarget::Owned(sink))? {
            Submission::Submitted(_) => {}
            Submission::Skipped => {
                return Err(CameraError::DeviceUnavailable(
                    "no capture session configured".to_string(),
                ))
            }
        }

        receiver.await.map_err(|_| {
            CameraError::DecodeError("capture completed without producing an image".to_string())
        })?
    }

    fn submit(&self, request: CaptureRequest, target: CaptureTarget) -> Result<Submission, CameraError> {
        let state = self.core.lock();
        let input = state.session.as_ref().and_then(|s| s.active_input()).cloned();
        state.coordinator.capture_photo(request, input.as_ref(), target)
    }
}

impl Drop for CaptureSessionController {
    fn drop(&mut self) {
        self.stop_preview();
    }
}

struct OneshotDelegate {
    sender: Mutex<Option<oneshot::Sender<Result<CapturedImage, CameraError>>>>,
}

impl OneshotDelegate {
    fn send(&self, result: Result<CapturedImage, CameraError>) {
        let sender = self.sender.lock().ok().and_then(|mut s| s.take());
        if let Some(sender) = sender {
            let _ = sender.send(result);
        }
    }
}

impl CaptureDelegate for OneshotDelegate {
    fn did_capture_image(&self, image: CapturedImage) {
        self.send(Ok(image));
    }

    fn did_fail_to_capture_image(&self, error: CameraError) {
        self.send(Err(error));
    }
}
