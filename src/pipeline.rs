//! `detect(bytes) -> FrameVerdict`.
//!
//! Letterbox, run the model, decode, suppress and fuse, for each attempt of
//! the cascade in order until one produces a box. Failures never escape:
//! undecodable bytes give an empty verdict, and a missing or misbehaving
//! model drops to the fallback localizer.

use std::borrow::Cow;
use std::sync::Mutex;

use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};

use crate::config::HelmetConfig;
use crate::detect::{
    decode_candidates, fuse, load_model_backend, suppress, ClassTable, FallbackLocalizer,
    FrameVerdict, ModelBackend, ModelInput, SkinToneLocalizer, VerdictSource, BOX_COLUMNS,
};
use crate::frame::{decode_frame, Frame, FrameError};
use crate::geometry::GeometryContext;

/// One pass of the detector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub input_side: u32,
}

impl Attempt {
    /// Progressively looser passes, ending at a larger input.
    pub fn adaptive_defaults() -> Vec<Attempt> {
        vec![
            Attempt {
                score_threshold: 0.15,
                nms_threshold: 0.45,
                input_side: 640,
            },
            Attempt {
                score_threshold: 0.08,
                nms_threshold: 0.50,
                input_side: 640,
            },
            Attempt {
                score_threshold: 0.05,
                nms_threshold: 0.50,
                input_side: 960,
            },
        ]
    }
}

pub struct HelmetDetector {
    backend: Option<Mutex<Box<dyn ModelBackend>>>,
    classes: ClassTable,
    attempts: Vec<Attempt>,
    equalize_contrast: bool,
    fallback: Option<Box<dyn FallbackLocalizer>>,
}

impl HelmetDetector {
    /// Detector without a model; every frame takes the fallback path.
    pub fn new(classes: ClassTable, attempts: Vec<Attempt>) -> Self {
        Self {
            backend: None,
            classes,
            attempts,
            equalize_contrast: false,
            fallback: Some(Box::new(SkinToneLocalizer::default())),
        }
    }

    /// Build from config. A model that fails to load is logged and left
    /// out, it is not an error.
    pub fn from_config(cfg: &HelmetConfig) -> Self {
        let classes = ClassTable::new(&cfg.class_names, &cfg.helmet_labels, &cfg.no_helmet_labels);
        let mut detector = Self::new(classes, cfg.attempt_plan())
            .with_contrast_equalization(cfg.equalize_contrast);
        if !cfg.fallback_localizer {
            detector = detector.without_fallback();
        }

        match cfg.model_path.as_deref() {
            Some(path) => match load_model_backend(path) {
                Ok(mut backend) => {
                    if let Err(e) = backend.warm_up() {
                        log::warn!("model warm-up failed: {:#}", e);
                    }
                    log::info!("loaded {} backend from {}", backend.name(), path.display());
                    detector = detector.with_backend(backend);
                }
                Err(e) => log::warn!("model unavailable, using fallback only: {:#}", e),
            },
            None => log::info!("no model configured, using fallback only"),
        }
        detector
    }

    pub fn with_backend(mut self, backend: Box<dyn ModelBackend>) -> Self {
        self.backend = Some(Mutex::new(backend));
        self
    }

    pub fn with_fallback(mut self, fallback: Box<dyn FallbackLocalizer>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.fallback = None;
        self
    }

    pub fn with_contrast_equalization(mut self, enabled: bool) -> Self {
        self.equalize_contrast = enabled;
        self
    }

    pub fn has_model(&self) -> bool {
        self.backend.is_some()
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Decode `bytes` and detect. Never fails.
    pub fn detect(&self, bytes: &[u8]) -> FrameVerdict {
        match decode_frame(bytes) {
            Ok(frame) => self.detect_frame(&frame),
            Err(e) => {
                log::debug!("{}", e);
                FrameVerdict::empty()
            }
        }
    }

    pub fn detect_frame(&self, frame: &Frame) -> FrameVerdict {
        let image = if self.equalize_contrast {
            Cow::Owned(equalize_luminance(frame.image()))
        } else {
            Cow::Borrowed(frame.image())
        };

        match self.run_cascade(&image) {
            Ok(Some(verdict)) => return verdict,
            Ok(None) => log::debug!(
                "no boxes after {} attempt(s), using fallback",
                self.attempts.len()
            ),
            Err(FrameError::ModelUnavailable(reason)) if self.backend.is_none() => {
                log::trace!("{}", reason)
            }
            Err(e) => log::warn!("{}; using fallback", e),
        }
        self.fallback_verdict(frame.image())
    }

    fn run_cascade(&self, image: &RgbImage) -> Result<Option<FrameVerdict>, FrameError> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| FrameError::ModelUnavailable("no model loaded".to_string()))?;

        for (index, attempt) in self.attempts.iter().enumerate() {
            let geometry = GeometryContext::new(image.width(), image.height(), attempt.input_side)?;
            let input = ModelInput::prepare(image, geometry);
            let raw = {
                let mut backend = backend.lock().map_err(|_| {
                    FrameError::ModelUnavailable("model backend lock poisoned".to_string())
                })?;
                backend
                    .run(&input)
                    .map_err(|e| FrameError::ModelUnavailable(format!("{:#}", e)))?
            };

            let expected = BOX_COLUMNS + self.classes.len();
            if !raw.is_empty() && raw.row_width() != expected {
                return Err(FrameError::OutputShape(format!(
                    "rows have {} columns, expected {} for {} classes",
                    raw.row_width(),
                    expected,
                    self.classes.len()
                )));
            }

            let candidates = decode_candidates(&raw, &geometry, attempt.score_threshold);
            let boxes = suppress(candidates, attempt.nms_threshold, &self.classes);
            if !boxes.is_empty() {
                log::debug!("attempt {} produced {} box(es)", index, boxes.len());
                return Ok(Some(fuse(boxes, VerdictSource::Model { attempt: index })));
            }
            log::debug!(
                "attempt {} (score {}, side {}) produced no boxes",
                index,
                attempt.score_threshold,
                attempt.input_side
            );
        }
        Ok(None)
    }

    fn fallback_verdict(&self, image: &RgbImage) -> FrameVerdict {
        let boxes = match &self.fallback {
            Some(fallback) => {
                let boxes = fallback.localize(image);
                if !boxes.is_empty() {
                    log::debug!("{} localizer produced {} box(es)", fallback.name(), boxes.len());
                }
                boxes
            }
            None => Vec::new(),
        };
        fuse(boxes, VerdictSource::Fallback)
    }
}

/// Histogram-equalize luminance and rescale RGB to match, keeping hue.
pub fn equalize_luminance(image: &RgbImage) -> RgbImage {
    let gray = imageops::grayscale(image);
    let equalized = imageproc::contrast::equalize_histogram(&gray);

    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let before = gray.get_pixel(x, y).0[0] as f32;
        let after = equalized.get_pixel(x, y).0[0] as f32;
        if before == 0.0 {
            pixel.0 = [after as u8; 3];
            continue;
        }
        let gain = after / before;
        for channel in pixel.0.iter_mut() {
            *channel = (*channel as f32 * gain).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}
