//! Box set -> one frame verdict.
//!
//! Precedence: any no-helmet box vetoes every helmet box in the frame, with
//! no spatial check. Then helmet boxes give a positive verdict. Anything else
//! is negative with confidence 0.0.

use super::classes::HelmetClass;
use super::result::{BoxOrigin, DetectionBox, FrameVerdict, VerdictSource};

pub fn fuse(boxes: Vec<DetectionBox>, source: VerdictSource) -> FrameVerdict {
    let deciding = |class: HelmetClass| {
        boxes
            .iter()
            .filter(|b| b.origin == BoxOrigin::Detector && b.class == class)
            .map(|b| b.confidence)
            .reduce(f32::max)
    };

    let (helmet_present, confidence) = if let Some(conf) = deciding(HelmetClass::NoHelmet) {
        (false, conf)
    } else if let Some(conf) = deciding(HelmetClass::Helmet) {
        (true, conf)
    } else {
        (false, 0.0)
    };

    FrameVerdict {
        helmet_present,
        confidence,
        boxes,
        source,
    }
}
