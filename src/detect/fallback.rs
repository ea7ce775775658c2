//! Coarse localization used when the model produces nothing.
//!
//! Fallback boxes are for display only. They are tagged
//! [`BoxOrigin::Fallback`] and fusion ignores them.

use image::RgbImage;

use super::classes::HelmetClass;
use super::result::{BoxOrigin, DetectionBox};

pub const FALLBACK_LABEL: &str = "Wear the Helmet";
pub const FALLBACK_CONFIDENCE: f32 = 0.5;

pub trait FallbackLocalizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Zero or more display boxes in image space.
    fn localize(&self, image: &RgbImage) -> Vec<DetectionBox>;
}

/// Bounding region of skin-toned pixels.
///
/// Emits at most one box, and only when the region is at least
/// `min_size x min_size` and skin covers a quarter of it.
pub struct SkinToneLocalizer {
    min_size: u32,
}

impl SkinToneLocalizer {
    pub fn new(min_size: u32) -> Self {
        Self {
            min_size: min_size.max(1),
        }
    }
}

impl Default for SkinToneLocalizer {
    fn default() -> Self {
        Self::new(60)
    }
}

impl FallbackLocalizer for SkinToneLocalizer {
    fn name(&self) -> &'static str {
        "skin-tone"
    }

    fn localize(&self, image: &RgbImage) -> Vec<DetectionBox> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        let mut count = 0u64;

        for (x, y, pixel) in image.enumerate_pixels() {
            if !is_skin(pixel.0) {
                continue;
            }
            count += 1;
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x1, y1, x2, y2)) => (x1.min(x), y1.min(y), x2.max(x), y2.max(y)),
            });
        }

        let Some((x1, y1, x2, y2)) = bounds else {
            return Vec::new();
        };
        let w = x2 - x1 + 1;
        let h = y2 - y1 + 1;
        if w < self.min_size || h < self.min_size {
            return Vec::new();
        }
        if count * 4 < w as u64 * h as u64 {
            log::debug!("skin region {}x{} too sparse ({} px)", w, h, count);
            return Vec::new();
        }

        // Keep x + w and y + h inside the last column and row.
        let w = w.min(image.width() - x1 - 1);
        let h = h.min(image.height() - y1 - 1);
        if w == 0 || h == 0 {
            return Vec::new();
        }

        vec![DetectionBox {
            x: x1,
            y: y1,
            w,
            h,
            label: FALLBACK_LABEL.to_string(),
            confidence: FALLBACK_CONFIDENCE,
            class: HelmetClass::NoHelmet,
            is_helmet: false,
            origin: BoxOrigin::Fallback,
        }]
    }
}

// Classic RGB skin rule (uniform daylight).
fn is_skin([r, g, b]: [u8; 3]) -> bool {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    r > 95 && g > 40 && b > 20 && max - min > 15 && (r - g).abs() > 15 && r > g && r > b
}
