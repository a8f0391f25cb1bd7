use thiserror::Error;

/// Failure to acquire a camera stream, classified by cause.
///
/// Each variant renders a complete user-facing message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Could not access the camera. Permission denied: allow camera access for this application.")]
    PermissionDenied,
    #[error("Could not access the camera. No camera was found on this device.")]
    NotFound,
    #[error("Could not access the camera. The camera is being used by another application.")]
    Busy,
    #[error("Could not access the camera. {0}")]
    Other(String),
}

const EPERM: i32 = 1;
const ENOENT: i32 = 2;
const ENXIO: i32 = 6;
const EACCES: i32 = 13;
const EBUSY: i32 = 16;
const ENODEV: i32 = 19;

impl CameraError {
    /// Maps an OS error number reported while opening the device.
    pub fn from_errno(errno: i32, detail: impl Into<String>) -> Self {
        match errno {
            EACCES | EPERM => CameraError::PermissionDenied,
            ENOENT | ENODEV | ENXIO => CameraError::NotFound,
            EBUSY => CameraError::Busy,
            _ => CameraError::Other(detail.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(13, CameraError::PermissionDenied)]
    #[case(1, CameraError::PermissionDenied)]
    #[case(2, CameraError::NotFound)]
    #[case(19, CameraError::NotFound)]
    #[case(6, CameraError::NotFound)]
    #[case(16, CameraError::Busy)]
    fn test_from_errno_classifies(#[case] errno: i32, #[case] expected: CameraError) {
        assert_eq!(CameraError::from_errno(errno, "ignored"), expected);
    }

    #[test]
    fn test_unknown_errno_keeps_detail() {
        let err = CameraError::from_errno(5, "Input/output error");
        assert_eq!(err, CameraError::Other("Input/output error".into()));
        assert_eq!(
            err.to_string(),
            "Could not access the camera. Input/output error"
        );
    }

    #[test]
    fn test_permission_message_explains_permission_only() {
        let msg = CameraError::PermissionDenied.to_string();
        assert!(msg.contains("Permission denied"));
        assert!(!msg.contains("No camera"));
        assert!(!msg.contains("another application"));
    }
}
