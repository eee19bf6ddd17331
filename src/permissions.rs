use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Permission status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PermissionStatus {
    /// Permission granted
    Granted,
    /// Permission denied
    Denied,
    /// Permission not determined (user hasn't been asked yet)
    NotDetermined,
    /// Permission restricted (parental controls, etc)
    Restricted,
}

impl PermissionStatus {
    pub fn is_authorized(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
            PermissionStatus::NotDetermined => write!(f, "not_determined"),
            PermissionStatus::Restricted => write!(f, "restricted"),
        }
    }
}

/// Callback receiving the outcome of a permission prompt
pub type AccessCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Read access to the process-wide camera authorization state.
///
/// Implementations may invoke the `request_access` callback on any thread.
pub trait AuthorizationProvider: Send + Sync {
    fn status(&self) -> PermissionStatus;

    /// Issue the one-shot user prompt. Already-decided states answer
    /// immediately without prompting.
    fn request_access(&self, callback: AccessCallback);
}

/// Authorization backed by the operating system permission store
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAuthorization;

impl AuthorizationProvider for SystemAuthorization {
    fn status(&self) -> PermissionStatus {
        check_permission()
    }

    fn request_access(&self, callback: AccessCallback) {
        let current = check_permission_detailed();
        if current.status.is_authorized() || !current.can_request {
            log::debug!("Skipping permission prompt: {}", current.message);
            callback(current.status.is_authorized());
            return;
        }

        #[cfg(target_os = "macos")]
        {
            request_permission_macos(callback);
        }

        #[cfg(not(target_os = "macos"))]
        {
            // No programmatic prompt outside macOS; access is granted out of band
            log::warn!("Cannot prompt for camera access: {}", current.message);
            callback(false);
        }
    }
}

/// In-memory authorization state with a scripted prompt answer
#[derive(Debug)]
pub struct StaticAuthorization {
    status: Mutex<PermissionStatus>,
    answer: bool,
    prompts: AtomicUsize,
}

impl StaticAuthorization {
    /// `answer` is what the simulated user picks if prompted
    pub fn new(status: PermissionStatus, answer: bool) -> Self {
        Self {
            status: Mutex::new(status),
            answer,
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn granted() -> Self {
        Self::new(PermissionStatus::Granted, true)
    }

    pub fn denied() -> Self {
        Self::new(PermissionStatus::Denied, false)
    }

    pub fn undetermined(answer: bool) -> Self {
        Self::new(PermissionStatus::NotDetermined, answer)
    }

    /// Number of prompts actually shown
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl AuthorizationProvider for StaticAuthorization {
    fn status(&self) -> PermissionStatus {
        self.status
            .lock()
            .map(|s| *s)
            .unwrap_or(PermissionStatus::NotDetermined)
    }

    fn request_access(&self, callback: AccessCallback) {
        let granted = match self.status.lock() {
            Ok(mut status) => {
                if *status == PermissionStatus::NotDetermined {
                    self.prompts.fetch_add(1, Ordering::SeqCst);
                    *status = if self.answer {
                        PermissionStatus::Granted
                    } else {
                        PermissionStatus::Denied
                    };
                }
                status.is_authorized()
            }
            Err(_) => false,
        };
        callback(granted);
    }
}

/// Check camera permission status
/// Returns permission status for the current platform
pub fn check_permission() -> PermissionStatus {
    check_permission_detailed().status
}

/// Check camera permission status with detailed information
pub fn check_permission_detailed() -> PermissionInfo {
    #[cfg(target_os = "macos")]
    {
        check_permission_macos()
    }

    #[cfg(target_os = "linux")]
    {
        check_permission_linux()
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        PermissionInfo {
            status: PermissionStatus::NotDetermined,
            message: "Platform not supported".to_string(),
            can_request: false,
        }
    }
}

/// Detailed permission information
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PermissionInfo {
    pub status: PermissionStatus,
    pub message: String,
    pub can_request: bool,
}

#[cfg(target_os = "macos")]
fn video_media_type() -> Option<*mut objc::runtime::Object> {
    use objc::runtime::{Class, Object};
    use objc::{msg_send, sel, sel_impl};

    // AVMediaTypeVideo is the four-char code "vide"
    let ns_string = Class::get("NSString")?;
    let raw = b"vide\0";
    let media_type: *mut Object =
        unsafe { msg_send![ns_string, stringWithUTF8String: raw.as_ptr()] };
    if media_type.is_null() {
        None
    } else {
        Some(media_type)
    }
}

#[cfg(target_os = "macos")]
fn check_permission_macos() -> PermissionInfo {
    use objc::runtime::Class;
    use objc::{msg_send, sel, sel_impl};

    let (Some(av_capture_device_class), Some(media_type)) =
        (Class::get("AVCaptureDevice"), video_media_type())
    else {
        return PermissionInfo {
            status: PermissionStatus::NotDetermined,
            message: "AVFoundation not available".to_string(),
            can_request: false,
        };
    };

    // AVAuthorizationStatus: 0 = NotDetermined, 1 = Restricted, 2 = Denied, 3 = Authorized
    let auth_status: i64 =
        unsafe { msg_send![av_capture_device_class, authorizationStatusForMediaType: media_type] };

    match auth_status {
        3 => PermissionInfo {
            status: PermissionStatus::Granted,
            message: "Camera access authorized".to_string(),
            can_request: false,
        },
        2 => PermissionInfo {
            status: PermissionStatus::Denied,
            message: "Camera access denied - enable in System Settings > Privacy & Security > Camera"
                .to_string(),
            can_request: false,
        },
        1 => PermissionInfo {
            status: PermissionStatus::Restricted,
            message: "Camera access restricted by system policy".to_string(),
            can_request: false,
        },
        _ => PermissionInfo {
            status: PermissionStatus::NotDetermined,
            message: "Camera permission not yet requested".to_string(),
            can_request: true,
        },
    }
}

#[cfg(target_os = "macos")]
fn request_permission_macos(callback: AccessCallback) {
    use block::ConcreteBlock;
    use objc::runtime::Class;
    use objc::{msg_send, sel, sel_impl};

    let (Some(av_capture_device_class), Some(media_type)) =
        (Class::get("AVCaptureDevice"), video_media_type())
    else {
        log::warn!("AVFoundation not available, cannot request camera access");
        callback(false);
        return;
    };

    log::info!("Requesting macOS camera permission");

    // The block may in theory fire more than once; only the first answer counts
    let slot = Mutex::new(Some(callback));
    let handler = ConcreteBlock::new(move |granted: bool| {
        let pending = slot.lock().ok().and_then(|mut g| g.take());
        if let Some(callback) = pending {
            log::info!("Camera permission {}", if granted { "granted" } else { "denied" });
            callback(granted);
        }
    });
    let handler = handler.copy();

    unsafe {
        let _: () = msg_send![av_capture_device_class, requestAccessForMediaType:media_type completionHandler:&*handler];
    }
}

#[cfg(target_os = "linux")]
fn check_permission_linux() -> PermissionInfo {
    use std::fs;
    use std::path::Path;

    let video_devices: Vec<_> = (0..10)
        .map(|i| format!("/dev/video{}", i))
        .filter(|path| Path::new(path).exists())
        .collect();

    let Some(first_device) = video_devices.first() else {
        return PermissionInfo {
            status: PermissionStatus::NotDetermined,
            message: "No video devices found at /dev/video*".to_string(),
            can_request: false,
        };
    };

    match fs::metadata(first_device) {
        Ok(_metadata) => {
            if check_linux_group_membership() {
                PermissionInfo {
                    status: PermissionStatus::Granted,
                    message: format!(
                        "Camera access granted (user in video group, {} found)",
                        first_device
                    ),
                    can_request: false,
                }
            } else {
                PermissionInfo {
                    status: PermissionStatus::Denied,
                    message: format!("Camera device {} exists but user not in video group - run: sudo usermod -a -G video $USER", first_device),
                    can_request: false,
                }
            }
        }
        Err(e) => PermissionInfo {
            status: PermissionStatus::Denied,
            message: format!("Cannot access {}: {}", first_device, e),
            can_request: false,
        },
    }
}

#[cfg(target_os = "linux")]
fn check_linux_group_membership() -> bool {
    use std::process::Command;

    let output = Command::new("groups").output().ok();

    if let Some(output) = output {
        if let Ok(groups) = String::from_utf8(output.stdout) {
            return groups.contains("video") || groups.contains("plugdev");
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_static_prompt_transitions_once() {
        let auth = StaticAuthorization::undetermined(true);
        assert_eq!(auth.status(), PermissionStatus::NotDetermined);

        let answers = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..3 {
            let answers = answers.clone();
            auth.request_access(Box::new(move |granted| answers.lock().unwrap().push(granted)));
        }

        assert_eq!(auth.status(), PermissionStatus::Granted);
        assert_eq!(auth.prompt_count(), 1);
        assert_eq!(*answers.lock().unwrap(), vec![true, true, true]);
    }

    #[test]
    fn test_static_denied_never_prompts() {
        let auth = StaticAuthorization::denied();
        let answered = Arc::new(Mutex::new(None));
        let slot = answered.clone();
        auth.request_access(Box::new(move |granted| *slot.lock().unwrap() = Some(granted)));

        assert_eq!(*answered.lock().unwrap(), Some(false));
        assert_eq!(auth.prompt_count(), 0);
        assert_eq!(auth.status(), PermissionStatus::Denied);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(PermissionStatus::NotDetermined.to_string(), "not_determined");
        assert!(PermissionStatus::Granted.is_authorized());
        assert!(!PermissionStatus::Restricted.is_authorized());
    }
}
