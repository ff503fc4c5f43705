//! Error taxonomy for the frame pipeline.
//!
//! Per-frame failures (`FrameError`) are recoverable: the runner logs them,
//! counts them, and moves on to the next frame. Stream failures
//! (`StreamError`) end the read loop.

use thiserror::Error;

/// Errors confined to the processing of a single frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Tensor payload could not be deserialized.
    #[error("corrupt frame: {0}")]
    CorruptFrame(String),

    /// ROI payload did not contain exactly five `i32` values.
    #[error("malformed roi payload: expected 20 bytes, got {len}")]
    MalformedRoi { len: usize },

    /// Decoded tensor (or ROI) is incompatible with the model input contract.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Classifier produced a class index outside the two-class task.
    #[error("classifier returned unexpected class index {0}")]
    UnexpectedClass(usize),

    /// Classifier backend failed while running inference.
    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),
}

impl FrameError {
    /// Short label used in logs and run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            FrameError::CorruptFrame(_) => "corrupt_frame",
            FrameError::MalformedRoi { .. } => "malformed_roi",
            FrameError::ShapeMismatch(_) => "shape_mismatch",
            FrameError::UnexpectedClass(_) => "unexpected_class",
            FrameError::Inference(_) => "inference",
        }
    }
}

/// Errors that terminate the frame stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Reading from the upstream byte stream failed.
    #[error("stream terminated: {0}")]
    Io(#[from] std::io::Error),
}
