use thiserror::Error;

/// Terminal failures for a live acquisition attempt. All of these end the
/// current `start()` and are surfaced after full teardown; none are retried
/// automatically.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera found")]
    NoCameraFound,

    #[error("not supported on this platform: {0}")]
    Unsupported(String),

    #[error("camera device error: {0}")]
    Device(String),

    #[error("a scan session is already active")]
    AlreadyActive,

    #[error("no active scan session")]
    NotActive,
}

/// Failures of the still-image fallback path. No session or camera resources
/// are involved there.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("decoding not supported: {0}")]
    Unsupported(String),

    #[error("could not read image: {0}")]
    InvalidImage(String),

    #[error("no code found in image")]
    NoCodeFound,
}
