use log::{info, warn};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, ControlValueDescription, ControlValueSetter,
    FrameFormat, KnownCameraControl, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::{query, Camera, NokhwaError};

use super::camera::{
    CameraBackend, CameraDescriptor, CameraStream, FocusMode, FocusPoint, Frame, StreamRequest,
    ZoomRange,
};
use super::error::CameraError;

/// Hardware camera backend over nokhwa's native capture APIs.
pub struct NokhwaBackend;

impl CameraBackend for NokhwaBackend {
    fn is_available(&self) -> bool {
        true
    }

    fn list_devices(&self) -> Result<Vec<CameraDescriptor>, CameraError> {
        let cameras = query(ApiBackend::Auto).map_err(map_nokhwa_error)?;
        Ok(cameras
            .into_iter()
            .map(|info| CameraDescriptor {
                id: info.index().to_string(),
                label: info.human_name(),
            })
            .collect())
    }

    fn open(
        &self,
        device: &CameraDescriptor,
        request: &StreamRequest,
    ) -> Result<Box<dyn CameraStream>, CameraError> {
        let index = match device.id.parse::<u32>() {
            Ok(n) => CameraIndex::Index(n),
            Err(_) => CameraIndex::String(device.id.clone()),
        };

        // Drivers disagree on what they will negotiate; walk from the ideal
        // 16:9 request down to whatever the device offers.
        let requests = [
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
                Resolution::new(request.width, request.height),
                FrameFormat::MJPEG,
                30,
            ))),
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
                Resolution::new(request.width, request.height),
                FrameFormat::YUYV,
                30,
            ))),
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
                Resolution::new(1280, 720),
                FrameFormat::MJPEG,
                30,
            ))),
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
        ];

        let mut camera = None;
        let mut last_error = None;
        for requested in requests {
            match Camera::new(index.clone(), requested) {
                Ok(opened) => {
                    camera = Some(opened);
                    break;
                }
                Err(err) => {
                    warn!("camera format rejected for '{}': {err}", device.label);
                    last_error = Some(err);
                }
            }
        }
        let Some(mut camera) = camera else {
            return Err(last_error
                .map(map_nokhwa_error)
                .unwrap_or_else(|| CameraError::Device("camera open failed".into())));
        };

        camera.open_stream().map_err(map_nokhwa_error)?;
        info!(
            "camera '{}' streaming at {:?}",
            device.label,
            camera.resolution()
        );
        Ok(Box::new(NokhwaStream { camera }))
    }
}

struct NokhwaStream {
    camera: Camera,
}

impl CameraStream for NokhwaStream {
    fn grab_frame(&mut self) -> Result<Frame, CameraError> {
        let buffer = self.camera.frame().map_err(map_nokhwa_error)?;
        let decoded = buffer.decode_image::<RgbFormat>().map_err(map_nokhwa_error)?;
        Ok(Frame {
            width: decoded.width(),
            height: decoded.height(),
            pixels: decoded.into_raw(),
        })
    }

    fn zoom_range(&self) -> Option<ZoomRange> {
        let control = self.camera.camera_control(KnownCameraControl::Zoom).ok()?;
        match control.description() {
            ControlValueDescription::IntegerRange {
                min,
                max,
                value,
                step,
                ..
            } => Some(ZoomRange {
                min: *min as f64,
                max: *max as f64,
                step: (*step as f64).max(1.0),
                current: *value as f64,
            }),
            _ => None,
        }
    }

    fn set_zoom(&mut self, level: f64) -> Result<(), CameraError> {
        self.camera
            .set_camera_control(
                KnownCameraControl::Zoom,
                ControlValueSetter::Integer(level.round() as i64),
            )
            .map_err(map_nokhwa_error)
    }

    fn focus_modes(&self) -> Vec<FocusMode> {
        // UVC exposes autofocus as one boolean control; when it exists we
        // model enabled as continuous and a momentary disable as single-shot.
        if self.camera.camera_control(KnownCameraControl::Focus).is_ok() {
            vec![FocusMode::Continuous, FocusMode::SingleShot]
        } else {
            Vec::new()
        }
    }

    fn set_focus_mode(&mut self, mode: FocusMode) -> Result<(), CameraError> {
        let setter = match mode {
            FocusMode::Continuous => ControlValueSetter::Boolean(true),
            FocusMode::SingleShot => ControlValueSetter::Boolean(false),
        };
        self.camera
            .set_camera_control(KnownCameraControl::Focus, setter)
            .map_err(map_nokhwa_error)
    }

    fn focus_at(&mut self, _point: FocusPoint) -> Result<(), CameraError> {
        // No point-of-interest control in the portable capture API.
        Err(CameraError::Unsupported("point-of-interest focus".into()))
    }

    fn shutdown(&mut self) {
        if let Err(err) = self.camera.stop_stream() {
            warn!("camera stream stop failed: {err}");
        }
    }
}

fn map_nokhwa_error(err: NokhwaError) -> CameraError {
    let text = err.to_string();
    let lowered = text.to_ascii_lowercase();
    if lowered.contains("permission") || lowered.contains("denied") || lowered.contains("authoriz")
    {
        CameraError::PermissionDenied
    } else if lowered.contains("not found") || lowered.contains("no device") {
        CameraError::NoCameraFound
    } else {
        CameraError::Device(text)
    }
}
