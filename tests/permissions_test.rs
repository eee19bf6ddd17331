#[cfg(test)]
mod permissions_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use twincam::permissions::{
        check_permission, check_permission_detailed, AuthorizationProvider, PermissionStatus,
        StaticAuthorization,
    };

    #[test]
    fn test_check_permission_returns_status() {
        let result = check_permission();
        match result {
            PermissionStatus::Granted
            | PermissionStatus::Denied
            | PermissionStatus::NotDetermined
            | PermissionStatus::Restricted => {}
        }
    }

    #[test]
    fn test_check_permission_is_consistent() {
        let first = check_permission();
        for _ in 0..5 {
            assert_eq!(check_permission(), first, "Permission status should be consistent");
        }
    }

    #[test]
    fn test_detailed_matches_simple_check() {
        let info = check_permission_detailed();
        assert_eq!(info.status, check_permission());
        assert!(!info.message.is_empty());
    }

    #[test]
    fn test_check_permission_concurrent() {
        let handles: Vec<_> = (0..10)
            .map(|_| std::thread::spawn(check_permission))
            .collect();
        for handle in handles {
            let _ = handle.join().unwrap();
        }
    }

    #[test]
    fn test_static_provider_answers_every_request() {
        let provider = StaticAuthorization::undetermined(true);
        let answers = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let answers = answers.clone();
            provider.request_access(Box::new(move |granted| {
                assert!(granted);
                answers.fetch_add(1, Ordering::SeqCst);
            }));
        }

        assert_eq!(answers.load(Ordering::SeqCst), 3);
        assert_eq!(provider.prompt_count(), 1);
        assert_eq!(provider.status(), PermissionStatus::Granted);
    }

    #[test]
    fn test_restricted_is_not_authorized() {
        let provider = StaticAuthorization::new(PermissionStatus::Restricted, true);
        provider.request_access(Box::new(|granted| assert!(!granted)));
        assert_eq!(provider.prompt_count(), 0);
        assert!(!provider.status().is_authorized());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&PermissionStatus::Granted).unwrap();
        let back: PermissionStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PermissionStatus::Granted);
    }
}
