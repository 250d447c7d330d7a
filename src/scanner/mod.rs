pub mod camera;
pub mod config;
pub mod controller;
pub mod decode;
pub mod error;
mod loop_worker;
pub mod nokhwa_backend;

pub use camera::{
    rank_devices, CameraBackend, CameraDescriptor, CameraStream, FocusMode, FocusPoint, Frame,
    NullSurface, PreviewSurface, StreamRequest, ZoomRange,
};
pub use config::ScanConfig;
pub use controller::{ScanController, ScanEvent};
pub use decode::{decode_image_bytes, CodeDetector, DecodedCode, RqrrDetector};
pub use error::{CameraError, DecodeError};
pub use nokhwa_backend::NokhwaBackend;
