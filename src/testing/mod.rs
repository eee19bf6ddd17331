//! Testing utilities for twincam
//!
//! Provides a scriptable synthetic backend, a recording delegate and
//! synthetic JPEG payloads for offline testing without camera hardware.

pub mod backend;
pub mod delegate;
pub mod synthetic_data;

pub use backend::{Delivery, HardwareEvent, PhotoOutcome, SyntheticBackend, SyntheticDevice};
pub use delegate::{DelegateEvent, RecordingDelegate};
pub use synthetic_data::{corrupt_jpeg, synthetic_bitmap, synthetic_jpeg};
