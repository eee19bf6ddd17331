use crate::assert_invariant;
use crate::errors::CameraError;
use crate::platform::{DeviceInput, PhotoOutput};
use crate::types::{SessionPreset, VideoOrientation};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

pub const SINGLE_INPUT: &str = "Session holds at most one device input";
pub const SINGLE_INPUT_AFTER_COMMIT: &str = "Configured session holds exactly one device input";

/// Hardware capture session: zero or one device input, one photo output
pub struct CaptureSession {
    preset: SessionPreset,
    inputs: Vec<DeviceInput>,
    output: Option<Arc<dyn PhotoOutput>>,
    running: bool,
    input_operations: u64,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            preset: SessionPreset::default(),
            inputs: Vec::with_capacity(1),
            output: None,
            running: false,
            input_operations: 0,
        }
    }

    pub fn preset(&self) -> SessionPreset {
        self.preset
    }

    pub fn set_preset(&mut self, preset: SessionPreset) {
        self.preset = preset;
    }

    /// Run `f` as one configuration block.
    ///
    /// Inputs may transiently drop to zero inside the block; a block that
    /// commits successfully leaves exactly one.
    pub fn configure<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, CameraError>,
    ) -> Result<T, CameraError> {
        let result = f(self);
        if result.is_ok() {
            assert_invariant!(
                self.inputs.len() == 1,
                SINGLE_INPUT_AFTER_COMMIT,
                "session::configure"
            );
        }
        result
    }

    pub fn add_input(&mut self, input: DeviceInput) -> Result<(), CameraError> {
        if let Some(existing) = self.inputs.first() {
            return Err(CameraError::ConfigurationError(format!(
                "cannot add {} input while {} input is attached",
                input.position(),
                existing.position()
            )));
        }
        self.inputs.push(input);
        self.input_operations += 1;
        assert_invariant!(self.inputs.len() <= 1, SINGLE_INPUT, "session::add_input");
        Ok(())
    }

    /// Returns whether the input was attached
    pub fn remove_input(&mut self, input: &DeviceInput) -> bool {
        let before = self.inputs.len();
        self.inputs.retain(|attached| attached != input);
        let removed = self.inputs.len() != before;
        if removed {
            self.input_operations += 1;
        }
        removed
    }

    pub fn inputs(&self) -> &[DeviceInput] {
        &self.inputs
    }

    pub fn active_input(&self) -> Option<&DeviceInput> {
        self.inputs.first()
    }

    pub fn has_inputs(&self) -> bool {
        !self.inputs.is_empty()
    }

    /// Count of add/remove operations applied since creation
    pub fn input_operations(&self) -> u64 {
        self.input_operations
    }

    pub fn add_output(&mut self, output: Arc<dyn PhotoOutput>) {
        self.output = Some(output);
    }

    pub fn output(&self) -> Option<&Arc<dyn PhotoOutput>> {
        self.output.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn set_running(&mut self, running: bool) {
        self.running = running;
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

/// How the live feed is scaled into the preview bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoGravity {
    #[default]
    ResizeAspect,
    ResizeAspectFill,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewLayout {
    pub width: u32,
    pub height: u32,
    pub gravity: VideoGravity,
    pub orientation: VideoOrientation,
}

/// Render target mirroring the live session, handed to the presentation layer
#[derive(Debug)]
pub struct PreviewSink {
    layout: RwLock<PreviewLayout>,
    supports_video_orientation: bool,
}

impl PreviewSink {
    pub fn new(supports_video_orientation: bool) -> Self {
        Self {
            layout: RwLock::new(PreviewLayout {
                width: 0,
                height: 0,
                gravity: VideoGravity::ResizeAspect,
                orientation: VideoOrientation::Portrait,
            }),
            supports_video_orientation,
        }
    }

    pub fn supports_video_orientation(&self) -> bool {
        self.supports_video_orientation
    }

    pub fn layout(&self) -> PreviewLayout {
        match self.layout.read() {
            Ok(layout) => *layout,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Connection orientation as last set by a layout pass
    pub fn connection_orientation(&self) -> VideoOrientation {
        self.layout().orientation
    }

    pub fn set_frame(&self, width: u32, height: u32) {
        self.update(|layout| {
            layout.width = width;
            layout.height = height;
        });
    }

    pub fn set_gravity(&self, gravity: VideoGravity) {
        self.update(|layout| layout.gravity = gravity);
    }

    /// Ignored when the connection cannot rotate
    pub fn set_connection_orientation(&self, orientation: VideoOrientation) -> bool {
        if !self.supports_video_orientation {
            return false;
        }
        self.update(|layout| layout.orientation = orientation);
        true
    }

    fn update(&self, f: impl FnOnce(&mut PreviewLayout)) {
        match self.layout.write() {
            Ok(mut layout) => f(&mut layout),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}
