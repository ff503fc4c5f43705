//! Annotation sinks.
//!
//! A sink receives every processed frame, draws the ROI rectangle in the
//! verdict's color (when there is one), and presents the result. The pipeline's
//! obligation ends at handing over a `FrameOutcome`.

#[cfg(feature = "display")]
pub mod window;

use anyhow::Result;
use image::{Rgb, RgbImage};

use crate::frame::{RectBounds, Roi, Verdict};
use crate::pipeline::FrameOutcome;

#[cfg(feature = "display")]
pub use window::WindowSink;

/// Rectangle stroke width in pixels.
pub const RECT_THICKNESS: i32 = 2;

/// Consumer of processed frames.
pub trait AnnotationSink {
    /// Render one processed frame.
    fn render(&mut self, frame: &FrameOutcome) -> Result<()>;

    /// False once the sink can no longer present frames (e.g. window closed).
    fn is_open(&self) -> bool {
        true
    }
}

/// Copy of the frame image with the ROI rectangle drawn, if a verdict exists.
pub fn annotated_image(frame: &FrameOutcome) -> RgbImage {
    let mut image = frame.image.clone();
    if let (Some(roi), Some(verdict)) = (frame.roi.as_ref(), frame.verdict) {
        draw_roi(&mut image, roi, verdict);
    }
    image
}

/// Draw the ROI rectangle, widened by `r_offset`, in the verdict's color.
pub fn draw_roi(image: &mut RgbImage, roi: &Roi, verdict: Verdict) {
    draw_rectangle(image, roi.bounds(), Rgb(verdict.color()), RECT_THICKNESS);
}

/// Draw a hollow rectangle; pixels outside the image are skipped.
pub fn draw_rectangle(image: &mut RgbImage, bounds: RectBounds, color: Rgb<u8>, thickness: i32) {
    for inset in 0..thickness.max(1) {
        let left = bounds.left.saturating_add(inset);
        let top = bounds.top.saturating_add(inset);
        let right = bounds.right.saturating_sub(inset);
        let bottom = bounds.bottom.saturating_sub(inset);
        if left > right || top > bottom {
            break;
        }
        for x in left..=right {
            put_clipped(image, x, top, color);
            put_clipped(image, x, bottom, color);
        }
        for y in top..=bottom {
            put_clipped(image, left, y, color);
            put_clipped(image, right, y, color);
        }
    }
}

fn put_clipped(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

/// Headless sink: logs each verdict and its rectangle.
#[derive(Debug, Default)]
pub struct LogSink {
    rendered: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rendered(&self) -> u64 {
        self.rendered
    }
}

impl AnnotationSink for LogSink {
    fn render(&mut self, frame: &FrameOutcome) -> Result<()> {
        self.rendered += 1;
        match (frame.roi.as_ref(), frame.verdict) {
            (Some(roi), Some(verdict)) => {
                let b = roi.bounds();
                log::info!(
                    "frame #{}: {} rect=({},{})-({},{}) rows={:?}",
                    frame.index,
                    verdict.as_str(),
                    b.left,
                    b.top,
                    b.right,
                    b.bottom,
                    frame.row_predictions
                );
            }
            _ => log::info!(
                "frame #{}: {}x{} no roi",
                frame.index,
                frame.image.width(),
                frame.image.height()
            ),
        }
        Ok(())
    }
}
