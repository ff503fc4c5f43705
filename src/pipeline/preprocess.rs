//! Tensor preprocessing: shape canonicalization, ROI crop, image conversion,
//! resize and normalization into the classifier's input layout.

use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use ndarray::{s, Array4, ArrayView3, ArrayView4, Axis, Ix3, Ix4};

use crate::error::FrameError;
use crate::frame::Roi;
use crate::tensor::{DType, DecodedTensor};

/// Per-channel normalization mean (RGB).
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// Per-channel normalization standard deviation (RGB).
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Channel count the classifier expects.
pub const CHANNELS: usize = 3;

/// Promote a decoded tensor to `N x C x H x W`.
///
/// Rank 3 (`C x H x W`) becomes a batch of one; rank 4 is kept as is.
pub fn canonicalize(tensor: DecodedTensor) -> Result<Array4<f32>, FrameError> {
    let shape = tensor.shape().to_vec();
    let data = tensor.into_data();
    let batch = match shape.len() {
        3 => data
            .into_dimensionality::<Ix3>()
            .map(|chw| chw.insert_axis(Axis(0))),
        4 => data.into_dimensionality::<Ix4>(),
        rank => {
            return Err(FrameError::ShapeMismatch(format!(
                "expected CxHxW or NxCxHxW tensor, got rank {} {:?}",
                rank, shape
            )))
        }
    }
    .map_err(|e| FrameError::ShapeMismatch(e.to_string()))?;

    let (n, c, h, w) = batch.dim();
    if n == 0 || h == 0 || w == 0 {
        return Err(FrameError::ShapeMismatch(format!(
            "empty tensor {:?}",
            shape
        )));
    }
    if c != CHANNELS {
        return Err(FrameError::ShapeMismatch(format!(
            "expected {} channels, got {}",
            CHANNELS, c
        )));
    }
    Ok(batch)
}

/// Select `[:, :, y:y+h, x:x+w]` from every sample in the batch.
///
/// The rectangle is clipped to the tensor extent; a negative origin, a
/// non-positive size, or an empty clipped region is a shape mismatch.
pub fn crop<'a>(batch: &'a Array4<f32>, roi: &Roi) -> Result<ArrayView4<'a, f32>, FrameError> {
    if roi.x < 0 || roi.y < 0 || roi.w <= 0 || roi.h <= 0 {
        return Err(FrameError::ShapeMismatch(format!(
            "invalid roi {:?}",
            roi
        )));
    }
    let (_, _, height, width) = batch.dim();
    let y0 = (roi.y as usize).min(height);
    let x0 = (roi.x as usize).min(width);
    let y1 = (roi.y as usize).saturating_add(roi.h as usize).min(height);
    let x1 = (roi.x as usize).saturating_add(roi.w as usize).min(width);
    if y0 >= y1 || x0 >= x1 {
        return Err(FrameError::ShapeMismatch(format!(
            "roi {:?} lies outside {}x{} frame",
            roi, width, height
        )));
    }
    Ok(batch.slice(s![.., .., y0..y1, x0..x1]))
}

/// Convert one `C x H x W` sample to an 8-bit RGB image.
///
/// Float samples are scaled by 255 and truncated; integer samples are clamped.
pub fn to_rgb_image(sample: ArrayView3<'_, f32>, dtype: DType) -> RgbImage {
    let (_, height, width) = sample.dim();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([
            to_u8(sample[[0, y, x]], dtype),
            to_u8(sample[[1, y, x]], dtype),
            to_u8(sample[[2, y, x]], dtype),
        ])
    })
}

/// Build the classifier input for a cropped batch: every row is converted to
/// RGB, resized to `size x size`, rescaled to `[0, 1]`, and normalized.
pub fn to_model_input(region: ArrayView4<'_, f32>, dtype: DType, size: u32) -> Array4<f32> {
    let rows = region.dim().0;
    let side = size as usize;
    let mut input = Array4::<f32>::zeros((rows, CHANNELS, side, side));
    for (row, sample) in region.outer_iter().enumerate() {
        let image = to_rgb_image(sample, dtype);
        let resized = imageops::resize(&image, size, size, FilterType::Triangle);
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..CHANNELS {
                let value = pixel[c] as f32 / 255.0;
                input[[row, c, y as usize, x as usize]] = (value - MEAN[c]) / STD[c];
            }
        }
    }
    input
}

fn to_u8(value: f32, dtype: DType) -> u8 {
    let scaled = if dtype.is_float() { value * 255.0 } else { value };
    scaled.clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, ArrayD, IxDyn};

    /// Batch whose every element encodes its own (c, y, x) position.
    fn marker_batch(height: usize, width: usize) -> Array4<f32> {
        Array4::from_shape_fn((1, 3, height, width), |(_, c, y, x)| {
            (c * 10_000 + y * 100 + x) as f32
        })
    }

    #[test]
    fn canonicalize_promotes_single_image() {
        let data = ArrayD::<f32>::zeros(IxDyn(&[3, 4, 5]));
        let batch = canonicalize(DecodedTensor::new(DType::F32, data)).unwrap();
        assert_eq!(batch.dim(), (1, 3, 4, 5));

        let data = ArrayD::<f32>::zeros(IxDyn(&[2, 3, 4, 5]));
        let batch = canonicalize(DecodedTensor::new(DType::F32, data)).unwrap();
        assert_eq!(batch.dim(), (2, 3, 4, 5));
    }

    #[test]
    fn canonicalize_rejects_bad_shapes() {
        for shape in [&[4, 5][..], &[1, 4, 4], &[1, 1, 3, 4, 4], &[0, 3, 2, 2]] {
            let data = ArrayD::<f32>::zeros(IxDyn(shape));
            let err = canonicalize(DecodedTensor::new(DType::F32, data)).unwrap_err();
            assert!(matches!(err, FrameError::ShapeMismatch(_)), "{:?}", shape);
        }
    }

    #[test]
    fn crop_selects_exact_subtensor() {
        let batch = marker_batch(10, 12);
        let roi = Roi::new(2, 3, 4, 5, 9);
        let region = crop(&batch, &roi).unwrap();
        assert_eq!(region.dim(), (1, 3, 4, 5));
        for c in 0..3 {
            for y in 0..4 {
                for x in 0..5 {
                    let expected = (c * 10_000 + (y + 2) * 100 + (x + 3)) as f32;
                    assert_eq!(region[[0, c, y, x]], expected);
                }
            }
        }
    }

    #[test]
    fn crop_clips_to_frame() {
        let batch = marker_batch(6, 6);
        let region = crop(&batch, &Roi::new(4, 4, 10, 10, 0)).unwrap();
        assert_eq!(region.dim(), (1, 3, 2, 2));
        assert_eq!(region[[0, 0, 0, 0]], 404.0);
    }

    #[test]
    fn crop_rejects_degenerate_regions() {
        let batch = marker_batch(6, 6);
        for roi in [
            Roi::new(-1, 0, 2, 2, 0),
            Roi::new(0, 0, 0, 2, 0),
            Roi::new(0, 0, 2, -2, 0),
            Roi::new(6, 0, 2, 2, 0),
        ] {
            assert!(matches!(
                crop(&batch, &roi),
                Err(FrameError::ShapeMismatch(_))
            ));
        }
    }

    #[test]
    fn rgb_conversion_truncates_float_scale() {
        let mut sample = Array3::<f32>::zeros((3, 1, 2));
        sample[[0, 0, 0]] = 1.0;
        sample[[1, 0, 0]] = 0.5;
        sample[[2, 0, 1]] = 2.0;
        let image = to_rgb_image(sample.view(), DType::F32);
        assert_eq!(image.get_pixel(0, 0), &Rgb([255, 127, 0]));
        assert_eq!(image.get_pixel(1, 0), &Rgb([0, 0, 255]));

        let bytes = Array3::<f32>::from_elem((3, 1, 1), 300.0);
        let image = to_rgb_image(bytes.view(), DType::U8);
        assert_eq!(image.get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn model_input_is_resized_and_normalized() {
        let batch = Array4::<f32>::from_elem((2, 3, 5, 7), 1.0);
        let input = to_model_input(batch.view(), DType::F32, 16);
        assert_eq!(input.dim(), (2, 3, 16, 16));
        for c in 0..3 {
            let expected = (1.0 - MEAN[c]) / STD[c];
            assert!((input[[1, c, 8, 8]] - expected).abs() < 0.02);
        }
    }
}
