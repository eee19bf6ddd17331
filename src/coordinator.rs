//! Single-shot photo capture
//!
//! Turns one [`CaptureRequest`] into exactly one delegate callback: the
//! decoded, orientation-tagged image or a typed failure. Completions arrive
//! on backend threads and are handed to the controller's [`Dispatcher`].

use crate::dispatch::Dispatcher;
use crate::errors::CameraError;
use crate::platform::{DeviceInput, PhotoOutput};
use crate::session::PreviewSink;
use crate::types::{
    CameraPosition, CaptureRequest, CaptureSettings, CapturedImage, FlashMode, ImageOrientation,
    RawPhoto, VideoOrientation,
};
use chrono::Utc;
use image::{ImageFormat, RgbImage};
use std::sync::{Arc, Mutex, RwLock, Weak};
use uuid::Uuid;

/// Receiver of capture outcomes
pub trait CaptureDelegate: Send + Sync {
    fn did_capture_image(&self, image: CapturedImage);

    fn did_fail_to_capture_image(&self, error: CameraError);
}

/// Non-owning delegate reference shared between controller and coordinator
pub(crate) type DelegateSlot = Arc<RwLock<Option<Weak<dyn CaptureDelegate>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Requested,
    Succeeded,
    Failed,
    /// Completed without a callback
    Dropped,
}

impl CaptureState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CaptureState::Requested)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Submitted(Uuid),
    /// No session output; nothing was captured
    Skipped,
}

/// Where a completed capture is reported
#[derive(Clone)]
pub(crate) enum CaptureTarget {
    Delegate(DelegateSlot),
    Owned(Arc<dyn CaptureDelegate>),
}

impl CaptureTarget {
    fn resolve(&self) -> Option<Arc<dyn CaptureDelegate>> {
        match self {
            CaptureTarget::Delegate(slot) => {
                let slot = match slot.read() {
                    Ok(slot) => slot,
                    Err(poisoned) => poisoned.into_inner(),
                };
                slot.as_ref().and_then(Weak::upgrade)
            }
            CaptureTarget::Owned(delegate) => Some(delegate.clone()),
        }
    }
}

struct Attachment {
    output: Arc<dyn PhotoOutput>,
    preview: Arc<PreviewSink>,
}

pub struct CaptureRequestCoordinator {
    attachment: Option<Attachment>,
    dispatcher: Arc<dyn Dispatcher>,
    state: Arc<Mutex<CaptureState>>,
    report_decode_failures: bool,
}

impl CaptureRequestCoordinator {
    pub fn new(dispatcher: Arc<dyn Dispatcher>, report_decode_failures: bool) -> Self {
        Self {
            attachment: None,
            dispatcher,
            state: Arc::new(Mutex::new(CaptureState::Idle)),
            report_decode_failures,
        }
    }

    /// Bind to the session's photo output and the preview whose connection
    /// orientation tags captured images
    pub fn attach(&mut self, output: Arc<dyn PhotoOutput>, preview: Arc<PreviewSink>) {
        self.attachment = Some(Attachment { output, preview });
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    pub fn state(&self) -> CaptureState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub(crate) fn capture_photo(
        &self,
        request: CaptureRequest,
        input: Option<&DeviceInput>,
        target: CaptureTarget,
    ) -> Result<Submission, CameraError> {
        let (Some(attachment), Some(input)) = (self.attachment.as_ref(), input) else {
            log::debug!("No photo output attached, ignoring capture request");
            return Ok(Submission::Skipped);
        };

        {
            let mut state = self.state.lock().map_err(|_| {
                CameraError::CaptureError("capture state lock poisoned".to_string())
            })?;
            if *state == CaptureState::Requested {
                log::warn!("Rejecting capture request: previous capture still in flight");
                return Err(CameraError::Busy);
            }
            *state = CaptureState::Requested;
        }

        let camera = input.position();
        let settings = CaptureSettings::for_request(&request, camera);
        let id = settings.id;
        if settings.flash.is_none() && request.flash != FlashMode::Off {
            log::debug!("Flash {:?} ignored on {} camera", request.flash, camera);
        }
        log::info!(
            "Capturing photo {} from {} camera (flash={:?}, stabilization={}, high_resolution={})",
            id,
            camera,
            settings.flash,
            settings.stabilization,
            settings.high_resolution
        );

        let completion = CompletionContext {
            id,
            camera,
            preview: attachment.preview.clone(),
            dispatcher: self.dispatcher.clone(),
            state: self.state.clone(),
            target,
            report_decode_failures: self.report_decode_failures,
            finished: false,
        };
        attachment
            .output
            .capture_photo(input, settings, Box::new(move |result| completion.finish(result)));

        Ok(Submission::Submitted(id))
    }
}

/// Everything a completion needs once it runs on the backend thread.
///
/// Dropped without `finish` (the backend lost the completion or its worker
/// panicked), it reports the capture as failed so the state leaves `Requested`.
struct CompletionContext {
    id: Uuid,
    camera: CameraPosition,
    preview: Arc<PreviewSink>,
    dispatcher: Arc<dyn Dispatcher>,
    state: Arc<Mutex<CaptureState>>,
    target: CaptureTarget,
    report_decode_failures: bool,
    finished: bool,
}

impl CompletionContext {
    fn finish(mut self, result: Result<RawPhoto, CameraError>) {
        self.finished = true;
        let outcome = result.and_then(|raw| {
            let bitmap = decode_photo(&raw)?;
            let orientation = self.preview.connection_orientation();
            Ok(CapturedImage {
                id: self.id,
                bitmap,
                orientation: resolve_orientation(orientation),
                camera: self.camera,
                captured_at: Utc::now(),
            })
        });
        self.deliver(outcome);
    }

    fn deliver(&self, outcome: Result<CapturedImage, CameraError>) {
        let terminal = match &outcome {
            Ok(_) => CaptureState::Succeeded,
            Err(CameraError::DecodeError(_)) if !self.report_decode_failures => CaptureState::Dropped,
            Err(_) => CaptureState::Failed,
        };
        match self.state.lock() {
            Ok(mut state) => *state = terminal,
            Err(poisoned) => *poisoned.into_inner() = terminal,
        }

        match outcome {
            Ok(image) => {
                log::info!(
                    "Captured photo {} ({}x{}, {:?})",
                    self.id,
                    image.width(),
                    image.height(),
                    image.orientation
                );
                let target = self.target.clone();
                self.dispatcher.dispatch(Box::new(move || match target.resolve() {
                    Some(delegate) => delegate.did_capture_image(image),
                    None => log::debug!("No delegate for captured photo"),
                }));
            }
            Err(error) if terminal == CaptureState::Dropped => {
                log::warn!("Dropping photo {}: {}", self.id, error);
            }
            Err(error) => {
                log::error!("Photo {} failed: {}", self.id, error);
                let target = self.target.clone();
                self.dispatcher.dispatch(Box::new(move || match target.resolve() {
                    Some(delegate) => delegate.did_fail_to_capture_image(error),
                    None => log::debug!("No delegate for capture failure"),
                }));
            }
        }
    }
}

impl Drop for CompletionContext {
    fn drop(&mut self) {
        if !self.finished {
            self.deliver(Err(CameraError::CaptureError("capture abandoned".to_string())));
        }
    }
}

/// Decode the still-image buffer of a completed capture
pub fn decode_photo(raw: &RawPhoto) -> Result<RgbImage, CameraError> {
    let buffer = raw
        .buffer
        .as_ref()
        .filter(|b| !b.is_empty())
        .ok_or_else(|| CameraError::DecodeError("no still-image buffer".to_string()))?;

    let decoded = image::load_from_memory_with_format(buffer, ImageFormat::Jpeg)
        .map_err(|e| CameraError::DecodeError(format!("JPEG decode failed: {}", e)))?;

    Ok(decoded.to_rgb8())
}

/// Image orientation for a still taken through a connection in `orientation`
pub fn resolve_orientation(orientation: VideoOrientation) -> ImageOrientation {
    orientation.image_orientation()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ImmediateDispatcher;
    use crate::platform::CaptureBackend;
    use crate::testing::{synthetic_jpeg, Delivery, PhotoOutcome, RecordingDelegate, SyntheticBackend};

    fn attached(
        backend: &SyntheticBackend,
        report: bool,
    ) -> (CaptureRequestCoordinator, DeviceInput, Arc<PreviewSink>) {
        let mut coordinator = CaptureRequestCoordinator::new(Arc::new(ImmediateDispatcher), report);
        let preview = Arc::new(PreviewSink::new(true));
        coordinator.attach(backend.create_photo_output(), preview.clone());
        let device = backend.device(CameraPosition::Back).unwrap();
        let input = backend.open_input(device).unwrap();
        (coordinator, input, preview)
    }

    #[test]
    fn test_orientation_table() {
        let expected = [
            (VideoOrientation::Portrait, ImageOrientation::Right),
            (VideoOrientation::PortraitUpsideDown, ImageOrientation::Left),
            (VideoOrientation::LandscapeLeft, ImageOrientation::Down),
            (VideoOrientation::LandscapeRight, ImageOrientation::Up),
        ];
        for (input, output) in expected {
            assert_eq!(resolve_orientation(input), output, "{:?}", input);
        }
    }

    #[test]
    fn test_decode_rejects_missing_and_corrupt_buffers() {
        assert!(matches!(
            decode_photo(&RawPhoto::empty()),
            Err(CameraError::DecodeError(_))
        ));
        assert!(matches!(
            decode_photo(&RawPhoto::jpeg(crate::testing::corrupt_jpeg(), 0, 0)),
            Err(CameraError::DecodeError(_))
        ));
        let bitmap = decode_photo(&RawPhoto::jpeg(synthetic_jpeg(1, 20, 10), 20, 10)).unwrap();
        assert_eq!(bitmap.dimensions(), (20, 10));
    }

    #[test]
    fn test_dropped_completion_fails_and_frees_coordinator() {
        let backend = SyntheticBackend::new().with_delivery(Delivery::Manual);
        backend.push_outcome(PhotoOutcome::Lost);
        let (coordinator, input, _) = attached(&backend, true);
        let delegate = RecordingDelegate::new();
        let target = CaptureTarget::Owned(delegate.clone());

        coordinator
            .capture_photo(CaptureRequest::default(), Some(&input), target.clone())
            .unwrap();

        assert_eq!(coordinator.state(), CaptureState::Failed);
        assert_eq!(
            delegate.failures(),
            vec![CameraError::CaptureError("capture abandoned".to_string())]
        );

        assert!(coordinator
            .capture_photo(CaptureRequest::default(), Some(&input), target)
            .is_ok());
        assert_eq!(backend.complete_pending(), 1);
        assert_eq!(coordinator.state(), CaptureState::Succeeded);
        assert_eq!(delegate.len(), 2);
    }

    #[test]
    fn test_unattached_coordinator_skips() {
        let coordinator = CaptureRequestCoordinator::new(Arc::new(ImmediateDispatcher), true);
        let delegate = RecordingDelegate::new();
        let submission = coordinator
            .capture_photo(CaptureRequest::default(), None, CaptureTarget::Owned(delegate.clone()))
            .unwrap();
        assert_eq!(submission, Submission::Skipped);
        assert_eq!(coordinator.state(), CaptureState::Idle);
        assert!(delegate.is_empty());
    }

    #[test]
    fn test_overlapping_request_is_busy() {
        let backend = SyntheticBackend::new().with_delivery(Delivery::Manual);
        let (coordinator, input, _) = attached(&backend, true);
        let delegate = RecordingDelegate::new();
        let target = CaptureTarget::Owned(delegate.clone());

        let first = coordinator
            .capture_photo(CaptureRequest::default(), Some(&input), target.clone())
            .unwrap();
        assert!(matches!(first, Submission::Submitted(_)));
        assert_eq!(coordinator.state(), CaptureState::Requested);

        let second = coordinator.capture_photo(CaptureRequest::default(), Some(&input), target.clone());
        assert_eq!(second, Err(CameraError::Busy));

        assert_eq!(backend.complete_pending(), 1);
        assert_eq!(coordinator.state(), CaptureState::Succeeded);
        assert_eq!(delegate.captured().len(), 1);

        assert!(coordinator
            .capture_photo(CaptureRequest::default(), Some(&input), target)
            .is_ok());
    }

    #[test]
    fn test_decode_failure_reporting_toggle() {
        for report in [true, false] {
            let backend = SyntheticBackend::new().with_delivery(Delivery::Manual);
            backend.push_outcome(PhotoOutcome::Corrupt);
            let (coordinator, input, _) = attached(&backend, report);
            let delegate = RecordingDelegate::new();

            coordinator
                .capture_photo(
                    CaptureRequest::default().with_flash(FlashMode::Off),
                    Some(&input),
                    CaptureTarget::Owned(delegate.clone()),
                )
                .unwrap();
            backend.complete_pending();

            if report {
                assert_eq!(coordinator.state(), CaptureState::Failed);
                let failures = delegate.failures();
                assert!(matches!(failures.as_slice(), [CameraError::DecodeError(_)]));
            } else {
                assert_eq!(coordinator.state(), CaptureState::Dropped);
                assert!(delegate.is_empty());
            }
        }
    }

    #[test]
    fn test_orientation_read_from_preview_layout() {
        let backend = SyntheticBackend::new().with_delivery(Delivery::Manual);
        let (coordinator, input, preview) = attached(&backend, true);
        let delegate = RecordingDelegate::new();

        preview.set_connection_orientation(VideoOrientation::LandscapeRight);
        coordinator
            .capture_photo(CaptureRequest::default(), Some(&input), CaptureTarget::Owned(delegate.clone()))
            .unwrap();
        backend.complete_pending();

        let images = delegate.captured();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].orientation, ImageOrientation::Up);
        assert_eq!(images[0].camera, CameraPosition::Back);
    }
}
