#[cfg(test)]
mod error_tests {
    use std::error::Error;
    use twincam::errors::CameraError;

    #[test]
    fn test_camera_error_device_unavailable() {
        let error = CameraError::DeviceUnavailable("no front camera".to_string());
        assert!(error.to_string().contains("Camera device unavailable"));
        assert!(error.to_string().contains("no front camera"));
    }

    #[test]
    fn test_camera_error_configuration() {
        let error = CameraError::ConfigurationError("back camera locked".to_string());
        assert!(error.to_string().contains("Camera configuration error"));
        assert!(error.to_string().contains("back camera locked"));
    }

    #[test]
    fn test_camera_error_display_trait() {
        let error = CameraError::CaptureError("Display test".to_string());
        assert_eq!(format!("{}", error), "Capture error: Display test");
        assert_eq!(CameraError::Busy.to_string(), "Capture already in progress");
    }

    #[test]
    fn test_camera_error_debug_format() {
        let error = CameraError::DecodeError("Debug test".to_string());
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("DecodeError"));
        assert!(debug_str.contains("Debug test"));
    }

    #[test]
    fn test_camera_error_implements_error_trait() {
        let error = CameraError::PermissionDenied("Error trait test".to_string());
        let _error_trait: &dyn Error = &error;
        assert!(error.source().is_none());
    }

    #[test]
    fn test_only_device_unavailable_is_recoverable() {
        let errors = vec![
            CameraError::DeviceUnavailable("a".to_string()),
            CameraError::ConfigurationError("b".to_string()),
            CameraError::CaptureError("c".to_string()),
            CameraError::DecodeError("d".to_string()),
            CameraError::PermissionDenied("e".to_string()),
            CameraError::Busy,
            CameraError::InitializationError("f".to_string()),
        ];
        let recoverable: Vec<_> = errors.iter().filter(|e| e.is_recoverable()).collect();
        assert_eq!(recoverable, vec![&CameraError::DeviceUnavailable("a".to_string())]);

        for error in &errors {
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn test_error_boxes_into_dyn_error() {
        fn fails() -> Result<(), Box<dyn Error>> {
            Err(CameraError::CaptureError("boxed".to_string()))?
        }
        let err = fails().unwrap_err();
        assert_eq!(err.to_string(), "Capture error: boxed");
    }
}
