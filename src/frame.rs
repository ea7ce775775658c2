//! Decoded frames.
//!
//! - `Frame`: immutable 3-channel RGB pixel buffer, one per detection call.
//! - `FrameError`: frame-level failures. None of them escape `detect`; they
//!   only decide which degraded verdict the pipeline returns.
//! - `decode_frame`: the external image codec boundary (`image` crate).

use image::RgbImage;

/// Frame-level failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// Bytes could not be decoded, or the frame has a zero dimension.
    InvalidFrame(String),
    /// No model is loaded, or the backend failed to run.
    ModelUnavailable(String),
    /// Raw model output does not have the expected rows x columns layout.
    OutputShape(String),
}

impl FrameError {
    pub fn code(&self) -> &'static str {
        match self {
            FrameError::InvalidFrame(_) => "invalid_frame",
            FrameError::ModelUnavailable(_) => "model_unavailable",
            FrameError::OutputShape(_) => "output_shape",
        }
    }

    fn message(&self) -> &str {
        match self {
            FrameError::InvalidFrame(msg)
            | FrameError::ModelUnavailable(msg)
            | FrameError::OutputShape(msg) => msg,
        }
    }
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for FrameError {}

/// Decoded RGB frame. Width and height are always non-zero.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Wrap raw interleaved RGB bytes.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, FrameError> {
        check_dimensions(width, height)?;
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| FrameError::InvalidFrame("frame dimensions overflow".to_string()))?;
        if pixels.len() != expected {
            return Err(FrameError::InvalidFrame(format!(
                "expected {} RGB bytes, received {}",
                expected,
                pixels.len()
            )));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| FrameError::InvalidFrame("RGB buffer rejected".to_string()))?;
        Ok(Self { image })
    }

    pub fn from_image(image: RgbImage) -> Result<Self, FrameError> {
        check_dimensions(image.width(), image.height())?;
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

/// Decode compressed image bytes (JPEG or PNG) into a frame.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, FrameError> {
    if bytes.is_empty() {
        return Err(FrameError::InvalidFrame("empty image payload".to_string()));
    }
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| FrameError::InvalidFrame(format!("undecodable image: {}", e)))?;
    Frame::from_image(decoded.to_rgb8())
}

fn check_dimensions(width: u32, height: u32) -> Result<(), FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::InvalidFrame(format!(
            "degenerate frame {}x{}",
            width, height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 20, 30]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn decodes_png_into_rgb_frame() {
        let frame = decode_frame(&png_bytes(8, 4)).unwrap();
        assert_eq!(frame.width(), 8);
        assert_eq!(frame.height(), 4);
        assert_eq!(frame.image().get_pixel(3, 2), &Rgb([10, 20, 30]));
    }

    #[test]
    fn garbage_bytes_are_invalid_frames() {
        let err = decode_frame(b"definitely not an image").unwrap_err();
        assert_eq!(err.code(), "invalid_frame");
        assert!(matches!(decode_frame(&[]), Err(FrameError::InvalidFrame(_))));
    }

    #[test]
    fn from_rgb_validates_length_and_dimensions() {
        assert!(Frame::from_rgb(2, 2, vec![0u8; 12]).is_ok());
        assert!(Frame::from_rgb(2, 2, vec![0u8; 11]).is_err());
        assert!(Frame::from_rgb(0, 2, Vec::new()).is_err());
    }
}
