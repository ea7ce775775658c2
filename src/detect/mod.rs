mod backend;
pub mod backends;
mod classes;
mod decode;
mod fallback;
mod fusion;
mod nms;
mod raw;
mod result;

pub use backend::{ModelBackend, ModelInput};
pub use backends::{load_model_backend, StubBackend, StubDetection};
pub use classes::{ClassTable, HelmetClass};
pub use decode::{decode_candidates, Candidate};
pub use fallback::{FallbackLocalizer, SkinToneLocalizer, FALLBACK_CONFIDENCE, FALLBACK_LABEL};
pub use fusion::fuse;
pub use nms::{non_max_suppression, suppress};
pub use raw::{RawOutput, BOX_COLUMNS};
pub use result::{BoxOrigin, DetectionBox, FrameVerdict, VerdictSource};
