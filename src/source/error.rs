use thiserror::Error;

/// Why a camera stream could not be acquired.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("camera access was denied")]
    PermissionDenied,
    #[error("no camera found at {0}")]
    NoDevice(String),
    #[error("camera does not support the requested format: {0}")]
    Unsupported(String),
    #[error("camera error: {0}")]
    Device(String),
}

impl AcquisitionError {
    /// Text shown in place of the loading indicator.
    pub fn user_message(&self) -> String {
        let hint = match self {
            AcquisitionError::PermissionDenied => {
                "Allow camera access for this application and start again."
            }
            AcquisitionError::NoDevice(_) => {
                "Connect a camera, or point the source setting at an existing device."
            }
            AcquisitionError::Unsupported(_) => {
                "Try a different resolution or frame rate in the source settings."
            }
            AcquisitionError::Device(_) => {
                "Check that no other application is using the camera and start again."
            }
        };
        format!("Unable to start the camera: {self}. {hint}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_guidance() {
        let msg = AcquisitionError::PermissionDenied.user_message();
        assert!(msg.contains("denied"));
        assert!(msg.contains("Allow camera access"));

        let msg = AcquisitionError::NoDevice("/dev/video9".into()).user_message();
        assert!(msg.contains("/dev/video9"));
        assert!(msg.contains("Connect a camera"));
    }
}
