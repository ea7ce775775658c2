//! Raw detector rows -> scored candidates in image space.

use crate::geometry::GeometryContext;

use super::raw::{RawOutput, BOX_COLUMNS};

/// Unfiltered candidate box, already mapped back to image space.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub class_id: usize,
    pub objectness: f32,
    pub class_score: f32,
    /// `objectness * class_score`
    pub confidence: f32,
}

impl Candidate {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn intersection_area(&self, other: &Candidate) -> f32 {
        let l = self.x1.max(other.x1);
        let r = self.x2.min(other.x2);
        let t = self.y1.max(other.y1);
        let b = self.y2.min(other.y2);
        (r - l).max(0.0) * (b - t).max(0.0)
    }

    pub fn iou(&self, other: &Candidate) -> f32 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Decode every row whose `objectness * max(class scores)` reaches
/// `score_threshold`.
///
/// Rows without class scores or with non-finite values are skipped one by
/// one; they never abort the rest of the tensor.
pub fn decode_candidates(
    raw: &RawOutput,
    geometry: &GeometryContext,
    score_threshold: f32,
) -> Vec<Candidate> {
    let mut out = Vec::new();
    let mut skipped = 0usize;

    for row in raw.rows() {
        let Some(candidate) = decode_row(row, geometry) else {
            skipped += 1;
            continue;
        };
        if candidate.confidence < score_threshold {
            continue;
        }
        out.push(candidate);
    }

    if skipped > 0 {
        log::debug!("decoder skipped {} malformed rows", skipped);
    }
    out
}

fn decode_row(row: &[f32], geometry: &GeometryContext) -> Option<Candidate> {
    let scores = row.get(BOX_COLUMNS..)?;
    if scores.is_empty() || row.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let (class_id, &class_score) = scores
        .iter()
        .enumerate()
        .reduce(|max, x| if x.1 > max.1 { x } else { max })?;

    let (cx, cy, w, h, objectness) = (row[0], row[1], row[2], row[3], row[4]);
    let [x1, y1, x2, y2] =
        geometry.box_to_image(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0);

    Some(Candidate {
        x1,
        y1,
        x2,
        y2,
        class_id,
        objectness,
        class_score,
        confidence: objectness * class_score,
    })
}
