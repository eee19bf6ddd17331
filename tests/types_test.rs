//! Tests for twincam core types
//!
//! Orientation tables, capture settings derivation and serialization of the
//! values that cross the config and CLI boundaries.

use twincam::types::{
    CameraPosition, CaptureRequest, CaptureSettings, DeviceOrientation, FlashMode, FocusPoint,
    ImageOrientation, PhotoCodec, VideoOrientation,
};

#[cfg(test)]
mod orientation_tests {
    use super::*;

    #[test]
    fn test_connection_to_image_orientation_is_total() {
        let table: Vec<(VideoOrientation, ImageOrientation)> = VideoOrientation::ALL
            .iter()
            .map(|o| (*o, o.image_orientation()))
            .collect();
        assert_eq!(
            table,
            vec![
                (VideoOrientation::Portrait, ImageOrientation::Right),
                (VideoOrientation::PortraitUpsideDown, ImageOrientation::Left),
                (VideoOrientation::LandscapeLeft, ImageOrientation::Down),
                (VideoOrientation::LandscapeRight, ImageOrientation::Up),
            ]
        );
    }

    #[test]
    fn test_image_orientations_are_distinct() {
        let mut tags: Vec<u8> = VideoOrientation::ALL
            .iter()
            .map(|o| o.image_orientation().exif_tag())
            .collect();
        tags.sort_unstable();
        assert_eq!(tags, vec![1, 3, 6, 8]);
    }

    #[test]
    fn test_device_orientation_fallbacks() {
        for device in [
            DeviceOrientation::FaceUp,
            DeviceOrientation::FaceDown,
            DeviceOrientation::Unknown,
            DeviceOrientation::PortraitUpsideDown,
        ] {
            assert_eq!(VideoOrientation::from_device(device), VideoOrientation::Portrait);
        }
        assert_eq!(
            VideoOrientation::from_device(DeviceOrientation::LandscapeLeft),
            VideoOrientation::LandscapeRight
        );
    }
}

#[cfg(test)]
mod settings_tests {
    use super::*;

    #[test]
    fn test_flash_only_on_back_camera() {
        for flash in [FlashMode::Auto, FlashMode::On, FlashMode::Off] {
            let request = CaptureRequest::new().with_flash(flash);

            let front = CaptureSettings::for_request(&request, CameraPosition::Front);
            assert_eq!(front.flash, None);
            assert!(!front.flash_enabled());

            let back = CaptureSettings::for_request(&request, CameraPosition::Back);
            assert_eq!(back.flash, Some(flash));
        }
    }

    #[test]
    fn test_settings_carry_request_flags() {
        let request = CaptureRequest::new()
            .with_stabilization(false)
            .with_high_resolution(false);
        let settings = CaptureSettings::for_request(&request, CameraPosition::Back);
        assert_eq!(settings.codec, PhotoCodec::Jpeg);
        assert!(!settings.stabilization);
        assert!(!settings.high_resolution);
    }

    #[test]
    fn test_each_settings_object_is_unique() {
        let request = CaptureRequest::default();
        let a = CaptureSettings::for_request(&request, CameraPosition::Back);
        let b = CaptureSettings::for_request(&request, CameraPosition::Back);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_request_defaults() {
        let request = CaptureRequest::default();
        assert_eq!(request.flash, FlashMode::Auto);
        assert!(request.stabilization);
        assert!(request.high_resolution);
    }
}

#[cfg(test)]
mod serialization_tests {
    use super::*;

    #[test]
    fn test_camera_position_serialization() {
        assert_eq!(serde_json::to_string(&CameraPosition::Front).unwrap(), "\"front\"");
        let back: CameraPosition = serde_json::from_str("\"back\"").unwrap();
        assert_eq!(back, CameraPosition::Back);
    }

    #[test]
    fn test_flash_mode_parsing() {
        assert_eq!("ON".parse::<FlashMode>().unwrap(), FlashMode::On);
        assert!("strobe".parse::<FlashMode>().is_err());
    }

    #[test]
    fn test_focus_point_serialization() {
        let point = FocusPoint::new(0.25, 0.75);
        let json = serde_json::to_string(&point).unwrap();
        let back: FocusPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, point);
    }
}
