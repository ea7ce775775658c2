use std::path::Path;

use anyhow::Result;

use super::backend::ModelBackend;

pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::{StubBackend, StubDetection};

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

/// Load the backend for a model file.
///
/// `stub://` paths select the scripted stub (with no detections); anything
/// else needs the `backend-tract` feature.
pub fn load_model_backend(path: &Path) -> Result<Box<dyn ModelBackend>> {
    if path.to_string_lossy().starts_with("stub://") {
        return Ok(Box::new(StubBackend::new()));
    }
    load_file_backend(path)
}

#[cfg(feature = "backend-tract")]
fn load_file_backend(path: &Path) -> Result<Box<dyn ModelBackend>> {
    Ok(Box::new(TractBackend::new(path)?))
}

#[cfg(not(feature = "backend-tract"))]
fn load_file_backend(path: &Path) -> Result<Box<dyn ModelBackend>> {
    Err(anyhow::anyhow!(
        "cannot load {}: built without the backend-tract feature",
        path.display()
    ))
}
