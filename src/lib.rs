//! Helmet Watch
//!
//! This crate turns camera frames into helmet-safety verdicts and drives the
//! two stateful processes that consume them.
//!
//! # Architecture
//!
//! Per frame, the detection pipeline is stateless:
//!
//! 1. **Geometry**: letterbox the frame into the square model input space.
//! 2. **Decode**: turn raw detector rows into scored candidates in image space.
//! 3. **Suppress**: greedy non-max suppression over all candidates by geometry.
//! 4. **Fuse**: reduce surviving boxes to one verdict. Any no-helmet box vetoes.
//!
//! Verdicts then feed the keyed state owned by [`SafetyMonitor`]:
//!
//! - `streak`: daily continuity with milestone rewards, one state per subject.
//! - `timer`: gap-bounded continuous-wear duration, one state per session.
//! - `history`: bounded per-subject detection log.
//!
//! # Module Structure
//!
//! - `frame`: decoded pixel buffers and frame-level errors
//! - `geometry`: letterbox forward/inverse mapping
//! - `detect`: model backends, decoder, suppressor, fusion, fallback localizer
//! - `pipeline`: `HelmetDetector`, the `detect(bytes)` entry point
//! - `ingest` / `stream`: continuous frame sources and the live loop

use anyhow::{anyhow, Result};
use std::sync::OnceLock;

pub mod annotate;
pub mod config;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod history;
pub mod ingest;
pub mod monitor;
pub mod pipeline;
pub mod streak;
pub mod stream;
pub mod timer;

pub use config::HelmetConfig;
pub use detect::{
    BoxOrigin, ClassTable, DetectionBox, FrameVerdict, HelmetClass, ModelBackend, ModelInput,
    RawOutput, StubBackend, VerdictSource,
};
pub use frame::{decode_frame, Frame, FrameError};
pub use geometry::GeometryContext;
pub use history::{DetectionHistory, DetectionRecord};
pub use ingest::{CaptureGuard, Captured, DirectorySource, FrameSource, SyntheticSource};
pub use monitor::{DetectionReport, SafetyMonitor};
pub use pipeline::{Attempt, HelmetDetector};
pub use streak::{Milestone, StreakState, StreakStore, StreakUpdate};
pub use stream::{run_stream, AnnotatedFrame, StreamControl, StreamStats};
pub use timer::{Clock, ManualClock, SessionTimer, SystemClock, TimerRegistry, TimerState};

/// Subject and session identifiers are opaque client-chosen keys.
///
/// Allowed: "worker-17", "client:4f2a", "alice@site.example"
/// Disallowed: empty strings, whitespace, slashes, anything over 128 chars.
pub fn validate_identifier(id: &str) -> Result<()> {
    static ID_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = ID_RE.get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9_.:@-]{1,128}$").unwrap());

    if !re.is_match(id) {
        return Err(anyhow!(
            "identifier {:?} must match ^[A-Za-z0-9_.:@-]{{1,128}}$",
            id
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_follow_allowlist() {
        assert!(validate_identifier("worker-17").is_ok());
        assert!(validate_identifier("client:4f2a").is_ok());
        assert!(validate_identifier("alice@site.example").is_ok());

        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("two words").is_err());
        assert!(validate_identifier("a/b").is_err());
        assert!(validate_identifier(&"x".repeat(129)).is_err());
    }
}
