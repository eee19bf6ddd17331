use crate::coordinator::CaptureDelegate;
use crate::errors::CameraError;
use crate::types::CapturedImage;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub enum DelegateEvent {
    Captured(CapturedImage),
    Failed(CameraError),
}

/// Delegate that records every callback and the thread it arrived on
#[derive(Default)]
pub struct RecordingDelegate {
    events: Mutex<Vec<(DelegateEvent, ThreadId)>>,
    cv: Condvar,
}

impl RecordingDelegate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, event: DelegateEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push((event, std::thread::current().id()));
            self.cv.notify_all();
        }
    }

    pub fn events(&self) -> Vec<DelegateEvent> {
        self.events
            .lock()
            .map(|e| e.iter().map(|(event, _)| event.clone()).collect())
            .unwrap_or_default()
    }

    pub fn threads(&self) -> Vec<ThreadId> {
        self.events
            .lock()
            .map(|e| e.iter().map(|(_, thread)| *thread).collect())
            .unwrap_or_default()
    }

    pub fn captured(&self) -> Vec<CapturedImage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DelegateEvent::Captured(image) => Some(image),
                DelegateEvent::Failed(_) => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<CameraError> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DelegateEvent::Failed(error) => Some(error),
                DelegateEvent::Captured(_) => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until at least `count` callbacks arrived
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let Ok(mut events) = self.events.lock() else {
            return false;
        };
        while events.len() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.cv.wait_timeout(events, deadline - now) {
                Ok((guard, _)) => events = guard,
                Err(_) => return false,
            }
        }
        true
    }
}

impl CaptureDelegate for RecordingDelegate {
    fn did_capture_image(&self, image: CapturedImage) {
        self.record(DelegateEvent::Captured(image));
    }

    fn did_fail_to_capture_image(&self, error: CameraError) {
        self.record(DelegateEvent::Failed(error));
    }
}
