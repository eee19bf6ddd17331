//! Property-based tests for the session controller
//!
//! These tests drive arbitrary sequences of camera switches and focus updates
//! through the synthetic backend and check the session invariants after
//! every step.
//!
//! Run with: cargo test --test controller_props

use proptest::prelude::*;
use std::sync::Arc;
use twincam::permissions::StaticAuthorization;
use twincam::testing::{Delivery, SyntheticBackend};
use twincam::{
    CameraPosition, CaptureDevice, CaptureSessionController, FocusPoint, ImmediateDispatcher,
    TwinCamConfig,
};

fn controller(backend: &SyntheticBackend) -> CaptureSessionController {
    CaptureSessionController::create(
        Arc::new(backend.clone()),
        Arc::new(StaticAuthorization::granted()),
        Arc::new(ImmediateDispatcher),
        TwinCamConfig::default(),
    )
}

fn position() -> impl Strategy<Value = CameraPosition> {
    prop_oneof![Just(CameraPosition::Front), Just(CameraPosition::Back)]
}

proptest! {
    /// Exactly one input stays attached, and it matches the selected camera
    #[test]
    fn switches_keep_single_matching_input(
        sequence in prop::collection::vec(position(), 0..40),
        start_running in any::<bool>(),
    ) {
        let backend = SyntheticBackend::new().with_delivery(Delivery::Manual);
        let controller = controller(&backend);
        if start_running {
            controller.start_preview(false);
        }

        for camera in sequence {
            controller.set_camera_type(camera);
            prop_assert_eq!(controller.attached_inputs(), vec![camera]);
            prop_assert_eq!(controller.camera_type(), camera);
            prop_assert_eq!(controller.is_running(), start_running);
        }
    }

    /// Selecting the already-active camera performs no input operations
    #[test]
    fn repeated_selection_is_idempotent(
        camera in position(),
        repeats in 1usize..10,
    ) {
        let backend = SyntheticBackend::new().with_delivery(Delivery::Manual);
        let controller = controller(&backend);
        controller.set_camera_type(camera);
        let operations = controller.input_operations();

        for _ in 0..repeats {
            controller.set_camera_type(camera);
        }

        prop_assert_eq!(controller.input_operations(), operations);
    }

    /// Each effective switch costs exactly one remove and one add
    #[test]
    fn switch_cost_is_two_operations(sequence in prop::collection::vec(position(), 0..40)) {
        let backend = SyntheticBackend::new().with_delivery(Delivery::Manual);
        let controller = controller(&backend);

        let mut current = CameraPosition::Back;
        let mut switches = 0u64;
        for camera in sequence {
            if camera != current {
                switches += 1;
                current = camera;
            }
            controller.set_camera_type(camera);
        }

        prop_assert_eq!(controller.input_operations(), 1 + 2 * switches);
    }

    /// Stored focus targets are always normalized and no lock is left held
    #[test]
    fn focus_targets_stay_normalized(
        x in -10.0f32..10.0,
        y in -10.0f32..10.0,
    ) {
        let backend = SyntheticBackend::new().with_delivery(Delivery::Manual);
        let controller = controller(&backend);

        let target = FocusPoint { x, y };
        prop_assert!(controller.set_focus_target(target).is_ok());
        let stored = controller.focus_target();
        prop_assert!(stored.is_normalized());

        for camera in [CameraPosition::Front, CameraPosition::Back] {
            let device = backend.device_handle(camera).unwrap();
            prop_assert!(!device.is_locked());
            prop_assert_eq!(device.focus_point(), Some(stored));
        }
    }
}
