#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ndarray::{s, Array4};
use tract_onnx::prelude::*;

use crate::detect::arch::{ModelArch, NUM_CLASSES};
use crate::detect::backend::Classifier;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract-based classifier for ONNX exports of the supported architectures.
///
/// The model is loaded once from a local file. Inference runs one batch row at
/// a time against a plan fixed to `1 x 3 x S x S`; the plan is immutable, so
/// the classifier can be shared across threads.
pub struct TractClassifier {
    model: Plan,
    input_size: u32,
}

impl TractClassifier {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn load<P: AsRef<Path>>(model_path: P, arch: ModelArch) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = arch.input_size() as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "loaded {} classifier from {} (input {}x{}, {} classes)",
            arch,
            model_path.display(),
            size,
            size,
            NUM_CLASSES
        );

        Ok(Self {
            model,
            input_size: arch.input_size(),
        })
    }

    fn predict_row(&self, batch: &Array4<f32>, row: usize) -> Result<usize> {
        let size = self.input_size as usize;
        let sample: Vec<f32> = batch.slice(s![row, .., .., ..]).iter().copied().collect();
        let input = Tensor::from_shape(&[1, 3, size, size], &sample)
            .context("failed to build input tensor")?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let logits = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        if logits.len() != NUM_CLASSES {
            return Err(anyhow!(
                "model produced {} scores, expected {}",
                logits.len(),
                NUM_CLASSES
            ));
        }
        Ok(argmax(logits.iter().copied()))
    }
}

impl Classifier for TractClassifier {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn predict(&self, batch: &Array4<f32>) -> Result<Vec<usize>> {
        let shape = batch.shape();
        let size = self.input_size as usize;
        if shape[1] != 3 || shape[2] != size || shape[3] != size {
            return Err(anyhow!(
                "batch shape {:?} does not match model input Nx3x{}x{}",
                shape,
                size,
                size
            ));
        }
        (0..shape[0])
            .map(|row| self.predict_row(batch, row))
            .collect()
    }
}

/// Index of the first maximum score.
fn argmax(scores: impl Iterator<Item = f32>) -> usize {
    let mut best = (0, f32::NEG_INFINITY);
    for (idx, score) in scores.enumerate() {
        if score > best.1 {
            best = (idx, score);
        }
    }
    best.0
}
