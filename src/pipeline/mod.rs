//! Per-frame inference pipeline.
//!
//! `Pipeline::process` takes one demultiplexed `Frame` and produces a
//! `FrameOutcome` ready for the annotation sink:
//!
//! 1. decode the tensor payload
//! 2. promote it to an `N x C x H x W` batch
//! 3. when an ROI is present: crop every batch row to the ROI, preprocess,
//!    classify each row, and reduce the row predictions to one verdict by
//!    majority vote
//! 4. convert batch row 0 to an RGB image for display
//!
//! Every failure is a `FrameError` scoped to the frame being processed.

pub mod preprocess;
pub mod vote;

use image::RgbImage;
use ndarray::{Array4, Axis};
use std::sync::Arc;

use crate::detect::Classifier;
use crate::error::FrameError;
use crate::frame::{Frame, Roi, Verdict};
use crate::tensor::{self, DType};

pub use vote::majority_vote;

/// Result of processing one frame.
#[derive(Clone, Debug)]
pub struct FrameOutcome {
    pub index: u64,
    /// Full frame (batch row 0) as 8-bit RGB.
    pub image: RgbImage,
    pub roi: Option<Roi>,
    /// `None` when the frame carried no ROI.
    pub verdict: Option<Verdict>,
    /// Per-row class predictions that produced the verdict.
    pub row_predictions: Vec<usize>,
}

/// Inference pipeline bound to one shared, read-only classifier.
#[derive(Clone)]
pub struct Pipeline {
    classifier: Arc<dyn Classifier>,
}

impl Pipeline {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &Arc<dyn Classifier> {
        &self.classifier
    }

    pub fn process(&self, frame: Frame) -> Result<FrameOutcome, FrameError> {
        let decoded = tensor::decode(&frame.payload)?;
        let dtype = decoded.dtype();
        let batch = preprocess::canonicalize(decoded)?;

        let (verdict, row_predictions) = match frame.roi.as_ref() {
            Some(roi) => {
                let (verdict, predictions) = self.classify_region(&batch, dtype, roi)?;
                (Some(verdict), predictions)
            }
            None => (None, Vec::new()),
        };

        let image = preprocess::to_rgb_image(batch.index_axis(Axis(0), 0), dtype);

        Ok(FrameOutcome {
            index: frame.index,
            image,
            roi: frame.roi,
            verdict,
            row_predictions,
        })
    }

    /// Classify the ROI of every batch row and vote on a single verdict.
    pub fn classify_region(
        &self,
        batch: &Array4<f32>,
        dtype: DType,
        roi: &Roi,
    ) -> Result<(Verdict, Vec<usize>), FrameError> {
        let region = preprocess::crop(batch, roi)?;
        let input = preprocess::to_model_input(region, dtype, self.classifier.input_size());
        let predictions = self
            .classifier
            .predict(&input)
            .map_err(FrameError::Inference)?;
        if predictions.len() != input.dim().0 {
            return Err(FrameError::Inference(anyhow::anyhow!(
                "{} returned {} predictions for {} rows",
                self.classifier.name(),
                predictions.len(),
                input.dim().0
            )));
        }
        let class = majority_vote(&predictions).ok_or_else(|| {
            FrameError::ShapeMismatch("no rows to classify".to_string())
        })?;
        Ok((Verdict::from_class(class)?, predictions))
    }
}
