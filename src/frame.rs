//! Frame data model.
//!
//! - `Frame`: one demultiplexed unit of work (tensor payload + optional ROI).
//! - `Roi`: the `[y, x, h, w, r_offset]` rectangle carried by a `--coords` block.
//! - `Verdict`: the outcome of classifying a frame's ROI.
//!
//! A `Frame` is built by the demultiplexer and moved into the pipeline; nothing
//! else holds on to it.

use crate::error::FrameError;

/// Number of `i32` values in an ROI payload.
pub const ROI_FIELDS: usize = 5;

/// Wire size of an ROI payload in bytes.
pub const ROI_PAYLOAD_BYTES: usize = ROI_FIELDS * 4;

/// Region of interest: `[y, x, h, w, r_offset]`.
///
/// `r_offset` only widens the rendered rectangle; it never affects the crop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Roi {
    pub y: i32,
    pub x: i32,
    pub h: i32,
    pub w: i32,
    pub r_offset: i32,
}

impl Roi {
    pub fn new(y: i32, x: i32, h: i32, w: i32, r_offset: i32) -> Self {
        Self {
            y,
            x,
            h,
            w,
            r_offset,
        }
    }

    /// Decode a raw `--coords` payload line (five little-endian `i32`).
    ///
    /// A single trailing `\r` left over from CRLF framing is tolerated.
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        let bytes = match bytes {
            [body @ .., b'\r'] if body.len() == ROI_PAYLOAD_BYTES => body,
            _ => bytes,
        };
        if bytes.len() != ROI_PAYLOAD_BYTES {
            return Err(FrameError::MalformedRoi { len: bytes.len() });
        }
        let mut fields = [0i32; ROI_FIELDS];
        for (field, chunk) in fields.iter_mut().zip(bytes.chunks_exact(4)) {
            *field = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        let [y, x, h, w, r_offset] = fields;
        Ok(Self::new(y, x, h, w, r_offset))
    }

    /// Encode as a `--coords` payload (inverse of `from_le_bytes`).
    pub fn to_le_bytes(&self) -> [u8; ROI_PAYLOAD_BYTES] {
        let mut out = [0u8; ROI_PAYLOAD_BYTES];
        let fields = [self.y, self.x, self.h, self.w, self.r_offset];
        for (chunk, field) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&field.to_le_bytes());
        }
        out
    }

    /// Rectangle drawn around this ROI, widened by `r_offset` on every side.
    pub fn bounds(&self) -> RectBounds {
        RectBounds::from_roi(self)
    }
}

/// Pixel bounds of an annotation rectangle (inclusive corners).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RectBounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl RectBounds {
    pub fn from_roi(roi: &Roi) -> Self {
        Self {
            left: roi.x.saturating_sub(roi.r_offset),
            top: roi.y.saturating_sub(roi.r_offset),
            right: roi.x.saturating_add(roi.w).saturating_add(roi.r_offset),
            bottom: roi.y.saturating_add(roi.h).saturating_add(roi.r_offset),
        }
    }
}

/// Classification outcome for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
    Correct,
    Incorrect,
}

impl Verdict {
    pub const CORRECT_CLASS: usize = 0;
    pub const INCORRECT_CLASS: usize = 1;

    /// Map a predicted class index to a verdict.
    pub fn from_class(class: usize) -> Result<Self, FrameError> {
        match class {
            Self::CORRECT_CLASS => Ok(Verdict::Correct),
            Self::INCORRECT_CLASS => Ok(Verdict::Incorrect),
            other => Err(FrameError::UnexpectedClass(other)),
        }
    }

    /// RGB color of the annotation rectangle.
    pub fn color(self) -> [u8; 3] {
        match self {
            Verdict::Correct => [0, 255, 0],
            Verdict::Incorrect => [255, 0, 0],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Correct => "correct",
            Verdict::Incorrect => "incorrect",
        }
    }
}

/// One demultiplexed frame.
///
/// `roi` is whichever `--coords` block was parsed last before this frame's
/// boundary; the stream correlates the two by adjacency only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Arrival order, starting at 0.
    pub index: u64,
    /// Serialized tensor bytes (every accumulated line suffixed with `\n`).
    pub payload: Vec<u8>,
    pub roi: Option<Roi>,
}

impl Frame {
    pub fn new(index: u64, payload: Vec<u8>, roi: Option<Roi>) -> Self {
        Self {
            index,
            payload,
            roi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roi_decodes_five_little_endian_ints() {
        let roi = Roi::new(12, 34, 56, 78, 3);
        let decoded = Roi::from_le_bytes(&roi.to_le_bytes()).unwrap();
        assert_eq!(decoded, roi);

        let mut raw = Vec::new();
        for v in [1i32, -2, 3, 4, 5] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(
            Roi::from_le_bytes(&raw).unwrap(),
            Roi::new(1, -2, 3, 4, 5)
        );
    }

    #[test]
    fn roi_rejects_wrong_length() {
        let err = Roi::from_le_bytes(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, FrameError::MalformedRoi { len: 3 }));

        let err = Roi::from_le_bytes(&[0u8; 24]).unwrap_err();
        assert!(matches!(err, FrameError::MalformedRoi { len: 24 }));
    }

    #[test]
    fn roi_tolerates_trailing_carriage_return() {
        let roi = Roi::new(5, 6, 7, 8, 9);
        let mut raw = roi.to_le_bytes().to_vec();
        raw.push(b'\r');
        assert_eq!(Roi::from_le_bytes(&raw).unwrap(), roi);
    }

    #[test]
    fn bounds_widen_by_offset() {
        let roi = Roi::new(20, 10, 30, 40, 5);
        assert_eq!(
            roi.bounds(),
            RectBounds {
                left: 5,
                top: 15,
                right: 55,
                bottom: 55,
            }
        );
    }

    #[test]
    fn verdict_maps_two_classes_only() {
        assert_eq!(Verdict::from_class(0).unwrap(), Verdict::Correct);
        assert_eq!(Verdict::from_class(1).unwrap(), Verdict::Incorrect);
        assert!(matches!(
            Verdict::from_class(2),
            Err(FrameError::UnexpectedClass(2))
        ));
        assert_eq!(Verdict::Correct.color(), [0, 255, 0]);
        assert_eq!(Verdict::Incorrect.color(), [255, 0, 0]);
    }
}
