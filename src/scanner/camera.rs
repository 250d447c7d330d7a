use serde::{Deserialize, Serialize};

use super::error::CameraError;

/// One RGB8 video frame, handed from the stream to the preview surface and
/// the detector.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGB8, row-major, `width * height * 3` bytes.
    pub pixels: Vec<u8>,
}

impl Frame {
    /// Luma plane for the detector (BT.601 integer weights).
    pub fn to_luma(&self) -> Vec<u8> {
        let mut luma = Vec::with_capacity((self.width * self.height) as usize);
        for chunk in self.pixels.chunks(3) {
            if chunk.len() == 3 {
                let gray =
                    (chunk[0] as u32 * 299 + chunk[1] as u32 * 587 + chunk[2] as u32 * 114) / 1000;
                luma.push(gray as u8);
            }
        }
        luma
    }
}

/// One enumerated video input device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    pub id: String,
    pub label: String,
}

/// Label substrings that bump a device up the ranking, most preferred first.
/// Ties keep enumeration order, so on single-camera hardware the ranking is
/// a no-op.
const LABEL_PRIORITY: [&str; 4] = ["tele", "back", "rear", "environment"];

/// Rank enumerated cameras so index 0 is the best guess for scanning a code
/// held in front of the user.
pub fn rank_devices(mut devices: Vec<CameraDescriptor>) -> Vec<CameraDescriptor> {
    devices.sort_by_key(|device| label_priority(&device.label));
    devices
}

fn label_priority(label: &str) -> usize {
    let label = label.to_ascii_lowercase();
    LABEL_PRIORITY
        .iter()
        .position(|hint| label.contains(hint))
        .unwrap_or(LABEL_PRIORITY.len())
}

/// Zoom capability reported by the active track, plus the currently applied
/// level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub current: f64,
}

impl ZoomRange {
    /// Clamp `level` into [min, max] and round it onto the step grid.
    pub fn snap(&self, level: f64) -> f64 {
        let clamped = level.clamp(self.min, self.max);
        if self.step <= 0.0 {
            return clamped;
        }
        let steps = ((clamped - self.min) / self.step).round();
        (self.min + steps * self.step).clamp(self.min, self.max)
    }

    /// Target level after nudging the current one by `delta`, snapped to the
    /// track's grid.
    pub fn step_by(&self, delta: f64) -> f64 {
        self.snap(self.current + delta)
    }
}

/// Autofocus behavior the track may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusMode {
    Continuous,
    SingleShot,
}

/// Normalized tap position on the preview, clamped into the unit square.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusPoint {
    pub x: f64,
    pub y: f64,
}

impl FocusPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
        }
    }
}

/// Capture resolution requested when opening a stream.
#[derive(Debug, Clone, Copy)]
pub struct StreamRequest {
    pub width: u32,
    pub height: u32,
}

/// Platform camera seam. The session only talks to hardware through this
/// trait, so tests substitute a scripted implementation.
pub trait CameraBackend: Send + Sync {
    /// Whether a camera API exists at all on this platform.
    fn is_available(&self) -> bool;

    fn list_devices(&self) -> Result<Vec<CameraDescriptor>, CameraError>;

    fn open(
        &self,
        device: &CameraDescriptor,
        request: &StreamRequest,
    ) -> Result<Box<dyn CameraStream>, CameraError>;
}

/// An open camera stream, exclusively owned by one session and released on
/// every exit path.
pub trait CameraStream: Send {
    fn grab_frame(&mut self) -> Result<Frame, CameraError>;

    /// Zoom capability, if the track has one.
    fn zoom_range(&self) -> Option<ZoomRange>;

    fn set_zoom(&mut self, level: f64) -> Result<(), CameraError>;

    fn focus_modes(&self) -> Vec<FocusMode>;

    fn set_focus_mode(&mut self, mode: FocusMode) -> Result<(), CameraError>;

    /// Point-of-interest focus. Implementations without it return an error,
    /// which callers treat as a no-op.
    fn focus_at(&mut self, point: FocusPoint) -> Result<(), CameraError>;

    /// Stop capture and release the device. Must be safe to call twice.
    fn shutdown(&mut self);
}

/// Where live frames are shown while the session runs. `present` is called
/// once per attempt, `clear` when the stream is unbound.
pub trait PreviewSurface: Send + Sync {
    fn present(&self, frame: &Frame);
    fn clear(&self);
}

/// Surface for headless use: frames are dropped.
pub struct NullSurface;

impl PreviewSurface for NullSurface {
    fn present(&self, _frame: &Frame) {}
    fn clear(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, label: &str) -> CameraDescriptor {
        CameraDescriptor {
            id: id.to_string(),
            label: label.to_string(),
        }
    }

    #[test]
    fn ranking_prefers_tele_then_back_then_rear() {
        let ranked = rank_devices(vec![
            descriptor("0", "Front Camera"),
            descriptor("1", "Rear Wide Camera"),
            descriptor("2", "Back Telephoto Camera"),
            descriptor("3", "Back Camera"),
        ]);
        let labels: Vec<&str> = ranked.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Back Telephoto Camera",
                "Back Camera",
                "Rear Wide Camera",
                "Front Camera"
            ]
        );
    }

    #[test]
    fn ranking_keeps_enumeration_order_on_ties() {
        let ranked = rank_devices(vec![
            descriptor("0", "Integrated Webcam"),
            descriptor("1", "USB Capture"),
        ]);
        assert_eq!(ranked[0].id, "0");
        assert_eq!(ranked[1].id, "1");
    }

    #[test]
    fn zoom_step_rounds_onto_grid() {
        let range = ZoomRange {
            min: 1.0,
            max: 3.0,
            step: 0.25,
            current: 2.0,
        };
        assert_eq!(range.step_by(0.5), 2.5);
        assert_eq!(range.snap(2.6), 2.5);
    }

    #[test]
    fn zoom_step_clamps_to_track_limits() {
        let range = ZoomRange {
            min: 1.0,
            max: 3.0,
            step: 0.25,
            current: 2.0,
        };
        assert_eq!(range.step_by(10.0), 3.0);
        assert_eq!(range.step_by(-10.0), 1.0);
    }

    #[test]
    fn focus_point_is_clamped_to_unit_square() {
        let point = FocusPoint::new(-0.2, 1.7);
        assert_eq!(point.x, 0.0);
        assert_eq!(point.y, 1.0);
    }

    #[test]
    fn luma_plane_matches_frame_size() {
        let frame = Frame {
            width: 4,
            height: 2,
            pixels: vec![128; 4 * 2 * 3],
        };
        assert_eq!(frame.to_luma().len(), 8);
    }
}
