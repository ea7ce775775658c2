#![cfg(feature = "backend-tract")]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{ModelBackend, ModelInput};
use crate::detect::raw::RawOutput;

type Plan = TypedRunnableModel<TypedModel>;

/// Tract-based backend for ONNX detectors.
///
/// The model is parsed once; an optimized plan is built lazily for every
/// input side the attempt cascade asks for. No network I/O.
pub struct TractBackend {
    path: PathBuf,
    model: InferenceModel,
    plans: HashMap<u32, Plan>,
}

impl TractBackend {
    /// Load an ONNX model from disk.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let path = model_path.as_ref().to_path_buf();
        let model = tract_onnx::onnx()
            .model_for_path(&path)
            .with_context(|| format!("failed to load ONNX model from {}", path.display()))?;
        Ok(Self {
            path,
            model,
            plans: HashMap::new(),
        })
    }

    fn plan(&mut self, side: u32) -> Result<&Plan> {
        if !self.plans.contains_key(&side) {
            log::info!("building tract plan for {} at {}px", self.path.display(), side);
            let plan = self
                .model
                .clone()
                .with_input_fact(
                    0,
                    InferenceFact::dt_shape(
                        f32::datum_type(),
                        tvec!(1, 3, side as usize, side as usize),
                    ),
                )
                .context("failed to set input fact")?
                .into_optimized()
                .context("failed to optimize ONNX model")?
                .into_runnable()
                .context("failed to build runnable ONNX model")?;
            self.plans.insert(side, plan);
        }
        self.plans
            .get(&side)
            .ok_or_else(|| anyhow!("tract plan for {}px missing", side))
    }
}

impl ModelBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn run(&mut self, input: &ModelInput) -> Result<RawOutput> {
        let shape = input.shape();
        let tensor = tract_ndarray::Array4::from_shape_vec(
            (shape[0], shape[1], shape[2], shape[3]),
            input.data().to_vec(),
        )
        .context("model input does not match its shape")?
        .into_tensor();

        let outputs = self
            .plan(input.side())?
            .run(tvec!(tensor.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        Ok(RawOutput::from_shape(view.shape(), view.iter().copied().collect())?)
    }
}
