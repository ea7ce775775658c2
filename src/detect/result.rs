use serde::Serialize;

use super::classes::HelmetClass;

/// Where a box came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxOrigin {
    /// Decoded from model output; takes part in fusion.
    #[default]
    Detector,
    /// Coarse localization for display only; never affects the verdict.
    Fallback,
}

/// Final box in original image pixels, clamped to the frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub label: String,
    pub confidence: f32,
    pub class: HelmetClass,
    pub is_helmet: bool,
    pub origin: BoxOrigin,
}

/// How the verdict for a frame was reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum VerdictSource {
    /// Frame bytes could not be decoded.
    #[default]
    InvalidFrame,
    /// Model produced boxes on the given cascade attempt (0-based).
    Model { attempt: usize },
    /// Model absent, failed, or every attempt came back empty.
    Fallback,
}

/// Frame-level safety verdict.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FrameVerdict {
    pub helmet_present: bool,
    pub confidence: f32,
    pub boxes: Vec<DetectionBox>,
    pub source: VerdictSource,
}

impl FrameVerdict {
    /// "No information this frame."
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn helmet_boxes(&self) -> impl Iterator<Item = &DetectionBox> + '_ {
        self.boxes.iter().filter(|b| b.class == HelmetClass::Helmet)
    }

    pub fn no_helmet_boxes(&self) -> impl Iterator<Item = &DetectionBox> + '_ {
        self.boxes.iter().filter(|b| b.class == HelmetClass::NoHelmet)
    }
}
