//! Letterbox geometry between original frame space and the square model input.
//!
//! Forward: scale by `r = min(S/H, S/W)`, then pad symmetrically to `S x S`.
//! Inverse: subtract the left/top padding, divide by `r`, clamp to the frame.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::frame::FrameError;

/// Constant letterbox fill (gray 114, the usual YOLO padding value).
pub const PAD_FILL: Rgb<u8> = Rgb([114, 114, 114]);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeometryContext {
    ratio: f32,
    pad_left: u32,
    pad_top: u32,
    side: u32,
    unpadded_width: u32,
    unpadded_height: u32,
    orig_width: u32,
    orig_height: u32,
}

impl GeometryContext {
    /// Build the mapping for a `width x height` frame into an `side x side` input.
    pub fn new(width: u32, height: u32, side: u32) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::InvalidFrame(format!(
                "degenerate frame {}x{}",
                width, height
            )));
        }
        if side == 0 {
            return Err(FrameError::InvalidFrame(
                "model input side must be > 0".to_string(),
            ));
        }

        let s = side as f64;
        let r = (s / height as f64).min(s / width as f64);
        let unpadded_width = ((width as f64 * r).round() as u32).clamp(1, side);
        let unpadded_height = ((height as f64 * r).round() as u32).clamp(1, side);
        let dw = side - unpadded_width;
        let dh = side - unpadded_height;

        Ok(Self {
            ratio: r as f32,
            pad_left: dw / 2,
            pad_top: dh / 2,
            side,
            unpadded_width,
            unpadded_height,
            orig_width: width,
            orig_height: height,
        })
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    /// (left, top) padding.
    pub fn padding(&self) -> (u32, u32) {
        (self.pad_left, self.pad_top)
    }

    /// (right, bottom) padding; absorbs the odd pixel when padding is uneven.
    pub fn trailing_padding(&self) -> (u32, u32) {
        (
            self.side - self.unpadded_width - self.pad_left,
            self.side - self.unpadded_height - self.pad_top,
        )
    }

    pub fn unpadded_size(&self) -> (u32, u32) {
        (self.unpadded_width, self.unpadded_height)
    }

    pub fn original_size(&self) -> (u32, u32) {
        (self.orig_width, self.orig_height)
    }

    pub fn to_model(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.ratio + self.pad_left as f32,
            y * self.ratio + self.pad_top as f32,
        )
    }

    /// Unclamped inverse of [`to_model`](Self::to_model).
    pub fn to_image(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_left as f32) / self.ratio,
            (y - self.pad_top as f32) / self.ratio,
        )
    }

    /// Map a model-space corner box back to image space, clamped to
    /// `[0, W-1] x [0, H-1]`.
    pub fn box_to_image(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> [f32; 4] {
        let (ix1, iy1) = self.to_image(x1, y1);
        let (ix2, iy2) = self.to_image(x2, y2);
        let max_x = (self.orig_width - 1) as f32;
        let max_y = (self.orig_height - 1) as f32;
        [
            ix1.clamp(0.0, max_x),
            iy1.clamp(0.0, max_y),
            ix2.clamp(0.0, max_x),
            iy2.clamp(0.0, max_y),
        ]
    }

    /// Resize to the unpadded size and pad with [`PAD_FILL`] to `side x side`.
    pub fn letterbox(&self, image: &RgbImage) -> RgbImage {
        let resized = imageops::resize(
            image,
            self.unpadded_width,
            self.unpadded_height,
            FilterType::Triangle,
        );
        let mut canvas = RgbImage::from_pixel(self.side, self.side, PAD_FILL);
        imageops::overlay(
            &mut canvas,
            &resized,
            self.pad_left as i64,
            self.pad_top as i64,
        );
        canvas
    }
}
