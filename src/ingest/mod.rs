//! Frame sources for the live loop.
//!
//! - Synthetic scenes (`stub://name`) for tests and demos
//! - A directory of still images, replayed in file-name order
//!
//! Sources are always driven through a [`CaptureGuard`], which connects on
//! acquisition and releases the capture when dropped, whichever way the
//! consumer leaves its loop.

use anyhow::{anyhow, Result};
use std::ops::{Deref, DerefMut};
use std::path::Path;

use crate::frame::Frame;

mod directory;
mod synthetic;

pub use directory::{DirectoryConfig, DirectorySource};
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// One captured frame, either already decoded or still encoded.
pub enum Captured {
    Decoded(Frame),
    Encoded(Vec<u8>),
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub location: String,
}

pub trait FrameSource: Send {
    fn name(&self) -> &'static str;

    /// Open the underlying capture.
    fn connect(&mut self) -> Result<()>;

    /// Block until the next frame. `Ok(None)` means the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Captured>>;

    /// Close the capture. Must be safe to call more than once.
    fn release(&mut self);

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Open a source from a location string.
///
/// `stub://` selects a synthetic scene; an existing directory replays its
/// images once. URLs are rejected.
pub fn open_source(location: &str) -> Result<Box<dyn FrameSource>> {
    if location.trim().is_empty() {
        return Err(anyhow!("source location is empty"));
    }
    if location.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(SyntheticConfig {
            location: location.to_string(),
            ..SyntheticConfig::default()
        })));
    }
    if location.contains("://") {
        return Err(anyhow!("unsupported source {:?}: only local paths and stub://", location));
    }
    let path = Path::new(location);
    if path.is_dir() {
        return Ok(Box::new(DirectorySource::new(DirectoryConfig {
            path: path.to_path_buf(),
            repeat: false,
        })));
    }
    Err(anyhow!("source {} is not a directory", path.display()))
}

/// Scoped acquisition of a [`FrameSource`].
pub struct CaptureGuard {
    source: Box<dyn FrameSource>,
}

impl CaptureGuard {
    pub fn acquire(mut source: Box<dyn FrameSource>) -> Result<Self> {
        if let Err(e) = source.connect() {
            source.release();
            return Err(e);
        }
        log::info!("capture acquired: {} ({})", source.name(), source.stats().location);
        Ok(Self { source })
    }
}

impl Deref for CaptureGuard {
    type Target = dyn FrameSource;

    fn deref(&self) -> &Self::Target {
        self.source.as_ref()
    }
}

impl DerefMut for CaptureGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.source.as_mut()
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.source.release();
        let stats = self.source.stats();
        log::info!(
            "capture released: {} after {} frame(s)",
            stats.location,
            stats.frames_captured
        );
    }
}
