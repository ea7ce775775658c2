use anyhow::{anyhow, Result};

use crate::detect::backend::{ModelBackend, ModelInput};
use crate::detect::raw::{RawOutput, BOX_COLUMNS};

/// One scripted detection, in normalized image coordinates (`0.0..=1.0`).
#[derive(Clone, Debug, PartialEq)]
pub struct StubDetection {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    pub objectness: f32,
    pub scores: Vec<f32>,
}

impl StubDetection {
    /// One-hot class scores; `confidence` becomes the objectness.
    pub fn new(cx: f32, cy: f32, w: f32, h: f32, class_id: usize, confidence: f32) -> Self {
        let class_count = class_id + 1;
        let mut scores = vec![0.0; class_count.max(2)];
        scores[class_id] = 1.0;
        Self {
            cx,
            cy,
            w,
            h,
            objectness: confidence,
            scores,
        }
    }
}

enum Script {
    Detections(Vec<StubDetection>),
    Fixed(RawOutput),
    Fail(String),
}

/// Deterministic stand-in detector for tests and demos.
///
/// Scripted detections are placed relative to the original frame and
/// projected through the input's letterbox geometry, so the full
/// decode path (including the inverse mapping) is exercised.
pub struct StubBackend {
    script: Script,
}

impl StubBackend {
    /// A detector that never sees anything.
    pub fn new() -> Self {
        Self::with_detections(Vec::new())
    }

    pub fn with_detections(detections: Vec<StubDetection>) -> Self {
        Self {
            script: Script::Detections(detections),
        }
    }

    /// Return the same tensor for every frame, ignoring geometry.
    pub fn fixed(raw: RawOutput) -> Self {
        Self {
            script: Script::Fixed(raw),
        }
    }

    /// Fail every run, as an unloadable or crashing model would.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            script: Script::Fail(reason.into()),
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn run(&mut self, input: &ModelInput) -> Result<RawOutput> {
        let detections = match &self.script {
            Script::Detections(detections) => detections,
            Script::Fixed(raw) => return Ok(raw.clone()),
            Script::Fail(reason) => return Err(anyhow!("stub backend failure: {}", reason)),
        };

        let geometry = input.geometry();
        let (width, height) = geometry.original_size();
        let ratio = geometry.ratio();
        let row_width = BOX_COLUMNS + detections.iter().map(|d| d.scores.len()).max().unwrap_or(0);

        let mut data = Vec::with_capacity(detections.len() * row_width);
        for d in detections {
            let (cx, cy) = geometry.to_model(d.cx * width as f32, d.cy * height as f32);
            data.extend_from_slice(&[
                cx,
                cy,
                d.w * width as f32 * ratio,
                d.h * height as f32 * ratio,
                d.objectness,
            ]);
            data.extend_from_slice(&d.scores);
            data.resize(data.len() + row_width - BOX_COLUMNS - d.scores.len(), 0.0);
        }
        Ok(RawOutput::new(data, row_width)?)
    }
}
