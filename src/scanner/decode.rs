use std::fmt;

use log::debug;

use super::camera::Frame;
use super::error::DecodeError;

/// A successfully scanned code: trimmed and guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCode(String);

impl DecodedCode {
    /// Trim raw detector output. Whitespace-only reads yield `None` and must
    /// not end a live session.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DecodedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Injected decode capability. The session never assumes a decoder exists;
/// it asks, and fails fast when the answer is no.
pub trait CodeDetector: Send + Sync {
    /// Whether any decoding backend is present. Checked before a camera is
    /// ever touched.
    fn is_available(&self) -> bool;

    /// One attempt against one frame. `Ok(None)` means nothing usable in
    /// this frame; errors are treated as transient by the live loop.
    fn detect(&self, frame: &Frame) -> Result<Option<DecodedCode>, DecodeError>;
}

/// QR detector backed by rqrr.
pub struct RqrrDetector;

impl CodeDetector for RqrrDetector {
    fn is_available(&self) -> bool {
        true
    }

    fn detect(&self, frame: &Frame) -> Result<Option<DecodedCode>, DecodeError> {
        let luma = frame.to_luma();
        let width = frame.width as usize;
        let height = frame.height as usize;
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            luma.get(y * width + x).copied().unwrap_or(0)
        });
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_meta, content)) => {
                    if let Some(code) = DecodedCode::from_raw(&content) {
                        return Ok(Some(code));
                    }
                }
                Err(err) => {
                    // A located grid that fails to decode is normal on a
                    // blurry frame; the next frame usually reads fine.
                    debug!("grid decode failed: {err:?}");
                }
            }
        }
        Ok(None)
    }
}

/// Still-image fallback: decode a single captured image without a live
/// session or any camera resources.
pub fn decode_image_bytes(
    detector: &dyn CodeDetector,
    bytes: &[u8],
) -> Result<DecodedCode, DecodeError> {
    if !detector.is_available() {
        return Err(DecodeError::Unsupported("no decoding backend".into()));
    }
    let img = image::load_from_memory(bytes)
        .map_err(|err| DecodeError::InvalidImage(err.to_string()))?
        .to_rgb8();
    let frame = Frame {
        width: img.width(),
        height: img.height(),
        pixels: img.into_raw(),
    };
    match detector.detect(&frame)? {
        Some(code) => Ok(code),
        None => Err(DecodeError::NoCodeFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoded_code_is_trimmed() {
        let code = DecodedCode::from_raw("  raketa001\n").unwrap();
        assert_eq!(code.as_str(), "raketa001");
    }

    #[test]
    fn whitespace_only_is_not_a_code() {
        assert!(DecodedCode::from_raw("").is_none());
        assert!(DecodedCode::from_raw("   \t\n").is_none());
    }

    #[test]
    fn unreadable_bytes_are_an_invalid_image() {
        let result = decode_image_bytes(&RqrrDetector, b"definitely not an image");
        assert!(matches!(result, Err(DecodeError::InvalidImage(_))));
    }

    #[test]
    fn blank_image_has_no_code() {
        let blank = image::RgbImage::from_pixel(64, 64, image::Rgb([255, 255, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(blank)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let result = decode_image_bytes(&RqrrDetector, &bytes);
        assert!(matches!(result, Err(DecodeError::NoCodeFound)));
    }

    struct AbsentDetector;

    impl CodeDetector for AbsentDetector {
        fn is_available(&self) -> bool {
            false
        }

        fn detect(&self, _frame: &Frame) -> Result<Option<DecodedCode>, DecodeError> {
            unreachable!("detect must not be called when unavailable")
        }
    }

    #[test]
    fn missing_backend_is_reported_before_image_parsing() {
        let result = decode_image_bytes(&AbsentDetector, b"irrelevant");
        assert!(matches!(result, Err(DecodeError::Unsupported(_))));
    }
}
