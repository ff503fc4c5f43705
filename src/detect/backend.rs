use anyhow::Result;
use ndarray::Array4;

/// Classifier capability.
///
/// A classifier is loaded once and then shared read-only by every inference
/// call, so `predict` takes `&self`. Implementations MUST NOT keep per-call
/// state or retain the input batch beyond the call.
pub trait Classifier: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Side length of the square model input.
    fn input_size(&self) -> u32;

    /// Predict one class index per batch row.
    ///
    /// `batch` is `N x 3 x S x S`, normalized, with `S == input_size()`.
    fn predict(&self, batch: &Array4<f32>) -> Result<Vec<usize>>;
}
