//! Greedy non-max suppression.
//!
//! Suppression compares box geometry only. A helmet box and an overlapping
//! no-helmet box compete with each other; the higher-confidence one wins.

use super::classes::{ClassTable, HelmetClass};
use super::decode::Candidate;
use super::result::{BoxOrigin, DetectionBox};

/// Sort by confidence (descending, stable) and drop every candidate whose IoU
/// with an already kept candidate exceeds `iou_threshold`.
pub fn non_max_suppression(xs: &mut Vec<Candidate>, iou_threshold: f32) {
    xs.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].iou(&xs[index]) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

/// Suppress and convert survivors into labeled image-space boxes.
pub fn suppress(
    mut candidates: Vec<Candidate>,
    iou_threshold: f32,
    classes: &ClassTable,
) -> Vec<DetectionBox> {
    non_max_suppression(&mut candidates, iou_threshold);
    candidates
        .into_iter()
        .map(|c| to_box(&c, classes))
        .collect()
}

fn to_box(c: &Candidate, classes: &ClassTable) -> DetectionBox {
    let class = classes.kind(c.class_id);
    DetectionBox {
        x: c.x1 as u32,
        y: c.y1 as u32,
        w: (c.x2 - c.x1).max(0.0) as u32,
        h: (c.y2 - c.y1).max(0.0) as u32,
        label: classes.label(c.class_id),
        confidence: c.confidence,
        class,
        is_helmet: class == HelmetClass::Helmet,
        origin: BoxOrigin::Detector,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::decode::decode_candidates;
    use crate::detect::raw::RawOutput;
    use crate::geometry::GeometryContext;

    fn cand(x1: f32, y1: f32, x2: f32, y2: f32, class_id: usize, confidence: f32) -> Candidate {
        Candidate {
            x1,
            y1,
            x2,
            y2,
            class_id,
            objectness: 1.0,
            class_score: confidence,
            confidence,
        }
    }

    #[test]
    fn overlapping_boxes_keep_highest_confidence() {
        let mut xs = vec![
            cand(0.0, 0.0, 100.0, 100.0, 1, 0.6),
            cand(5.0, 5.0, 105.0, 105.0, 1, 0.9),
            cand(300.0, 300.0, 350.0, 350.0, 1, 0.3),
        ];
        non_max_suppression(&mut xs, 0.45);
        assert_eq!(xs.len(), 2);
        assert_eq!(xs[0].confidence, 0.9);
        assert_eq!(xs[1].confidence, 0.3);
    }

    #[test]
    fn different_classes_still_suppress_each_other() {
        let classes = ClassTable::default_helmet();
        let boxes = suppress(
            vec![
                cand(0.0, 0.0, 100.0, 100.0, 0, 0.8),
                cand(2.0, 2.0, 100.0, 100.0, 1, 0.7),
            ],
            0.45,
            &classes,
        );
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].class, HelmetClass::Helmet);
        assert!(boxes[0].is_helmet);
    }

    #[test]
    fn equal_confidence_keeps_original_order() {
        let mut xs = vec![
            cand(0.0, 0.0, 10.0, 10.0, 0, 0.5),
            cand(1.0, 1.0, 10.0, 10.0, 1, 0.5),
        ];
        non_max_suppression(&mut xs, 0.45);
        assert_eq!(xs.len(), 1);
        assert_eq!(xs[0].class_id, 0);
    }

    #[test]
    fn suppression_is_idempotent() {
        let mut xs = vec![
            cand(0.0, 0.0, 50.0, 50.0, 0, 0.9),
            cand(10.0, 10.0, 60.0, 60.0, 1, 0.8),
            cand(30.0, 30.0, 80.0, 80.0, 1, 0.7),
            cand(200.0, 0.0, 260.0, 40.0, 0, 0.4),
            cand(205.0, 0.0, 262.0, 41.0, 1, 0.35),
        ];
        non_max_suppression(&mut xs, 0.45);
        let first = xs.clone();
        non_max_suppression(&mut xs, 0.45);
        assert_eq!(xs, first);
    }

    #[test]
    fn raising_score_threshold_never_adds_survivors() {
        // cx, cy, w, h, objectness, with-helmet score, without-helmet score
        let rows: [[f32; 7]; 5] = [
            [25.0, 25.0, 50.0, 50.0, 1.0, 0.9, 0.0],
            [35.0, 35.0, 50.0, 50.0, 1.0, 0.0, 0.8],
            [65.0, 65.0, 50.0, 50.0, 1.0, 0.0, 0.3],
            [70.0, 70.0, 50.0, 50.0, 1.0, 0.2, 0.0],
            [230.0, 20.0, 60.0, 40.0, 1.0, 0.1, 0.0],
        ];
        let raw = RawOutput::new(rows.concat(), 7).unwrap();
        let geometry = GeometryContext::new(640, 640, 640).unwrap();

        let at_boundary = decode_candidates(&raw, &geometry, 0.3);
        assert!(at_boundary.iter().any(|c| c.confidence == 0.3));

        let mut previous = usize::MAX;
        for threshold in [0.0, 0.1, 0.15, 0.25, 0.3, 0.5, 0.85, 0.95] {
            let mut xs = decode_candidates(&raw, &geometry, threshold);
            assert!(xs.iter().all(|c| c.confidence >= threshold));
            non_max_suppression(&mut xs, 0.45);
            assert!(xs.len() <= previous, "threshold {} grew survivors", threshold);
            previous = xs.len();
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let boxes = suppress(Vec::new(), 0.45, &ClassTable::default_helmet());
        assert!(boxes.is_empty());
    }

    #[test]
    fn boxes_are_truncated_to_integer_pixels() {
        let boxes = suppress(
            vec![cand(10.7, 20.2, 50.9, 80.5, 1, 0.6)],
            0.45,
            &ClassTable::default_helmet(),
        );
        let b = &boxes[0];
        assert_eq!((b.x, b.y, b.w, b.h), (10, 20, 40, 60));
        assert_eq!(b.label, "without helmet");
        assert_eq!(b.class, HelmetClass::NoHelmet);
    }
}
