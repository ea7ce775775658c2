use anyhow::Result;
use image::RgbImage;

use crate::geometry::GeometryContext;

use super::raw::RawOutput;

/// Letterboxed, normalized model input for one frame.
///
/// `data` is NCHW with N = 1, values in `0.0..=1.0`, RGB channel order.
pub struct ModelInput {
    geometry: GeometryContext,
    data: Vec<f32>,
}

impl ModelInput {
    pub fn prepare(image: &RgbImage, geometry: GeometryContext) -> Self {
        let boxed = geometry.letterbox(image);
        let side = geometry.side() as usize;
        let plane = side * side;
        let mut data = vec![0.0f32; 3 * plane];
        for (x, y, pixel) in boxed.enumerate_pixels() {
            let idx = y as usize * side + x as usize;
            for channel in 0..3 {
                data[channel * plane + idx] = pixel.0[channel] as f32 / 255.0;
            }
        }
        Self { geometry, data }
    }

    pub fn geometry(&self) -> &GeometryContext {
        &self.geometry
    }

    pub fn side(&self) -> u32 {
        self.geometry.side()
    }

    /// `[1, 3, side, side]`
    pub fn shape(&self) -> [usize; 4] {
        let side = self.geometry.side() as usize;
        [1, 3, side, side]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Inference backend trait.
///
/// A backend receives the letterboxed input and returns the raw detector
/// tensor, nothing else. Decoding, suppression and fusion stay in the
/// pipeline so every backend gets identical post-processing.
///
/// Backends are shared behind a `Mutex`; `run` may keep scratch state.
pub trait ModelBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the model on one prepared input.
    fn run(&mut self, input: &ModelInput) -> Result<RawOutput>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
