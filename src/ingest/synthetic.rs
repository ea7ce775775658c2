use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

use super::{Captured, FrameSource, SourceStats};
use crate::frame::Frame;

/// Configuration for a synthetic scene.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// `stub://` location, used for logging only.
    pub location: String,
    pub width: u32,
    pub height: u32,
    /// Stop after this many frames; `None` runs until released.
    pub max_frames: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            location: "stub://synthetic".to_string(),
            width: 640,
            height: 480,
            max_frames: None,
        }
    }
}

/// Deterministic moving scene: a gradient backdrop with a skin-toned patch
/// drifting left to right.
pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            connected: false,
        }
    }

    fn render(&self) -> RgbImage {
        let (width, height) = (self.config.width, self.config.height);
        let patch = (width / 4).max(1);
        let span = width.saturating_sub(patch).max(1) as u64;
        let left = ((self.frame_count * 8) % span) as u32;
        let top = height.saturating_sub(patch) / 2;

        RgbImage::from_fn(width, height, |x, y| {
            if x >= left && x < left + patch && y >= top && y < top + patch {
                Rgb([224, 172, 140])
            } else {
                let shade = ((x + y) % 64) as u8;
                Rgb([20 + shade, 40 + shade, 80 + shade])
            }
        })
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn connect(&mut self) -> Result<()> {
        if self.config.width == 0 || self.config.height == 0 {
            return Err(anyhow!("synthetic source needs non-zero dimensions"));
        }
        self.connected = true;
        log::info!("SyntheticSource: connected to {}", self.config.location);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Captured>> {
        if !self.connected {
            return Err(anyhow!("synthetic source is not connected"));
        }
        if let Some(max) = self.config.max_frames {
            if self.frame_count >= max {
                return Ok(None);
            }
        }
        let frame = Frame::from_image(self.render())?;
        self.frame_count += 1;
        Ok(Some(Captured::Decoded(frame)))
    }

    fn release(&mut self) {
        self.connected = false;
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            location: self.config.location.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_bounded_frames_after_connect() {
        let mut source = SyntheticSource::new(SyntheticConfig {
            width: 64,
            height: 48,
            max_frames: Some(2),
            ..SyntheticConfig::default()
        });
        assert!(source.next_frame().is_err());

        source.connect().unwrap();
        for _ in 0..2 {
            match source.next_frame().unwrap() {
                Some(Captured::Decoded(frame)) => assert_eq!(frame.width(), 64),
                _ => panic!("expected a decoded frame"),
            }
        }
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.stats().frames_captured, 2);

        source.release();
        assert!(!source.is_healthy());
    }
}
