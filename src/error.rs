// Every variant states *where* things went wrong.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Window init error: {0}")]
    WindowInit(String),
    #[error("Window update error: {0}")]
    WindowUpdate(String),

    // Acquisition: the device exists in principle but could not be opened
    // (busy, permission denied, stream refused).
    #[error("Camera acquisition error: {0}")]
    Acquisition(String),
    #[error("No camera matches {0}")]
    NoMatchingDevice(String),
    // The host has no usable capture backend at all. No retry path.
    #[error("Camera capture unsupported: {0}")]
    Unsupported(String),
    #[error("Camera frame error: {0}")]
    CameraFrame(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Scheduler already running")]
    AlreadyRunning,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
