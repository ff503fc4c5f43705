//! Tensor payload codec.
//!
//! Frame payloads carry a dense numeric array in the NPY container:
//!
//! ```text
//! \x93NUMPY <major> <minor> <header_len> <header dict>\n <element data>
//! ```
//!
//! Versions 1.0 (u16 header length) and 2.0/3.0 (u32 header length) are read.
//! Decoding never panics and never yields a partial tensor: any structural
//! problem is reported as `FrameError::CorruptFrame`.

use ndarray::{ArrayD, IxDyn};

use crate::error::FrameError;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const HEADER_ALIGN: usize = 64;

/// Element type of a decoded tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DType {
    F32,
    F64,
    U8,
    I32,
    I64,
}

impl DType {
    pub fn size(self) -> usize {
        match self {
            DType::U8 => 1,
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
        }
    }

    /// Float tensors hold values in `[0, 1]`; integer tensors in `[0, 255]`.
    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    fn code(self) -> &'static str {
        match self {
            DType::F32 => "f4",
            DType::F64 => "f8",
            DType::U8 => "u1",
            DType::I32 => "i4",
            DType::I64 => "i8",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

/// Dense N-dimensional tensor decoded from a frame payload.
///
/// Values are widened to `f32`; `dtype` records the element type on the wire
/// so callers know which value scale applies.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedTensor {
    dtype: DType,
    data: ArrayD<f32>,
}

impl DecodedTensor {
    pub fn new(dtype: DType, data: ArrayD<f32>) -> Self {
        Self { dtype, data }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    pub fn into_data(self) -> ArrayD<f32> {
        self.data
    }
}

/// Decode a frame payload into a tensor.
pub fn decode(payload: &[u8]) -> Result<DecodedTensor, FrameError> {
    let corrupt = |msg: String| FrameError::CorruptFrame(msg);

    if payload.len() < MAGIC.len() + 2 || &payload[..MAGIC.len()] != MAGIC {
        return Err(corrupt("missing tensor magic".to_string()));
    }
    let major = payload[6];
    let minor = payload[7];
    let (header_len, header_start): (usize, usize) = match major {
        1 => {
            let raw = payload
                .get(8..10)
                .ok_or_else(|| corrupt("truncated header length".to_string()))?;
            (u16::from_le_bytes([raw[0], raw[1]]) as usize, 10)
        }
        2 | 3 => {
            let raw = payload
                .get(8..12)
                .ok_or_else(|| corrupt("truncated header length".to_string()))?;
            (
                u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize,
                12,
            )
        }
        _ => {
            return Err(corrupt(format!(
                "unsupported format version {}.{}",
                major, minor
            )))
        }
    };

    let data_start = header_start
        .checked_add(header_len)
        .ok_or_else(|| corrupt("header length overflow".to_string()))?;
    let header_bytes = payload
        .get(header_start..data_start)
        .ok_or_else(|| corrupt("truncated header".to_string()))?;
    let header = std::str::from_utf8(header_bytes)
        .map_err(|_| corrupt("header is not valid text".to_string()))?;
    let header = parse_header(header).map_err(corrupt)?;

    let count = header
        .shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| corrupt("element count overflow".to_string()))?;
    let data_len = count
        .checked_mul(header.dtype.size())
        .ok_or_else(|| corrupt("data length overflow".to_string()))?;
    let data_end = data_start
        .checked_add(data_len)
        .ok_or_else(|| corrupt("data length overflow".to_string()))?;
    let data = payload.get(data_start..data_end).ok_or_else(|| {
        corrupt(format!(
            "truncated data: expected {} bytes, got {}",
            data_len,
            payload.len().saturating_sub(data_start)
        ))
    })?;

    let trailing = &payload[data_end..];
    if trailing.iter().any(|b| !matches!(b, b'\n' | b'\r')) {
        return Err(corrupt(format!(
            "{} unexpected bytes after tensor data",
            trailing.len()
        )));
    }

    let values = widen(data, header.dtype, header.order);
    let array = ArrayD::from_shape_vec(IxDyn(&header.shape), values)
        .map_err(|e| corrupt(format!("shape does not match data: {}", e)))?;
    Ok(DecodedTensor::new(header.dtype, array))
}

/// Encode values as an NPY 1.0 little-endian payload.
///
/// Values are narrowed to `dtype` (integer types round toward zero).
pub fn encode(shape: &[usize], dtype: DType, values: &[f32]) -> anyhow::Result<Vec<u8>> {
    let count: usize = shape.iter().product();
    if count != values.len() {
        anyhow::bail!(
            "shape {:?} needs {} values, got {}",
            shape,
            count,
            values.len()
        );
    }

    let dims = match shape {
        [single] => format!("({},)", single),
        _ => format!(
            "({})",
            shape
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    let order = if dtype == DType::U8 { '|' } else { '<' };
    let mut header = format!(
        "{{'descr': '{}{}', 'fortran_order': False, 'shape': {}, }}",
        order,
        dtype.code(),
        dims
    );
    let unpadded = MAGIC.len() + 4 + header.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');
    let header_len = u16::try_from(header.len())
        .map_err(|_| anyhow::anyhow!("header too long for format version 1.0"))?;

    let mut out = Vec::with_capacity(MAGIC.len() + 4 + header.len() + count * dtype.size());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&header_len.to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for &v in values {
        match dtype {
            DType::F32 => out.extend_from_slice(&v.to_le_bytes()),
            DType::F64 => out.extend_from_slice(&(v as f64).to_le_bytes()),
            DType::U8 => out.push(v as u8),
            DType::I32 => out.extend_from_slice(&(v as i32).to_le_bytes()),
            DType::I64 => out.extend_from_slice(&(v as i64).to_le_bytes()),
        }
    }
    Ok(out)
}

struct Header {
    dtype: DType,
    order: ByteOrder,
    shape: Vec<usize>,
}

fn parse_header(header: &str) -> Result<Header, String> {
    let (dtype, order) = parse_descr(quoted(header_value(header, "descr")?)?)?;

    let fortran = header_value(header, "fortran_order")?;
    if fortran.starts_with("True") {
        return Err("fortran-ordered tensors are not supported".to_string());
    }
    if !fortran.starts_with("False") {
        return Err("invalid fortran_order value".to_string());
    }

    let shape = header_value(header, "shape")?;
    let shape = shape
        .strip_prefix('(')
        .and_then(|s| s.split_once(')'))
        .map(|(inner, _)| inner)
        .ok_or_else(|| "shape is not a tuple".to_string())?;
    let shape = shape
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| {
            dim.parse::<usize>()
                .map_err(|_| format!("invalid shape dimension '{}'", dim))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Header {
        dtype,
        order,
        shape,
    })
}

fn header_value<'a>(header: &'a str, key: &str) -> Result<&'a str, String> {
    let needle = format!("'{}'", key);
    let start = header
        .find(&needle)
        .ok_or_else(|| format!("header missing '{}'", key))?
        + needle.len();
    header[start..]
        .trim_start()
        .strip_prefix(':')
        .map(str::trim_start)
        .ok_or_else(|| format!("header key '{}' has no value", key))
}

fn quoted(value: &str) -> Result<&str, String> {
    let quote = value
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| "expected quoted string".to_string())?;
    value[1..]
        .split_once(quote)
        .map(|(inner, _)| inner)
        .ok_or_else(|| "unterminated string".to_string())
}

fn parse_descr(descr: &str) -> Result<(DType, ByteOrder), String> {
    let (order, code) = match descr.as_bytes().first() {
        Some(b'<') | Some(b'=') => (ByteOrder::Little, &descr[1..]),
        Some(b'>') => (ByteOrder::Big, &descr[1..]),
        Some(b'|') => (ByteOrder::Little, &descr[1..]),
        _ => (ByteOrder::Little, descr),
    };
    let dtype = match code {
        "f4" => DType::F32,
        "f8" => DType::F64,
        "u1" => DType::U8,
        "i4" => DType::I32,
        "i8" => DType::I64,
        other => return Err(format!("unsupported element type '{}'", other)),
    };
    Ok((dtype, order))
}

fn widen(data: &[u8], dtype: DType, order: ByteOrder) -> Vec<f32> {
    fn array<const N: usize>(chunk: &[u8], order: ByteOrder) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(chunk);
        if order == ByteOrder::Big {
            out.reverse();
        }
        out
    }

    let chunks = data.chunks_exact(dtype.size());
    match dtype {
        DType::U8 => data.iter().map(|&b| b as f32).collect(),
        DType::F32 => chunks
            .map(|c| f32::from_le_bytes(array::<4>(c, order)))
            .collect(),
        DType::F64 => chunks
            .map(|c| f64::from_le_bytes(array::<8>(c, order)) as f32)
            .collect(),
        DType::I32 => chunks
            .map(|c| i32::from_le_bytes(array::<4>(c, order)) as f32)
            .collect(),
        DType::I64 => chunks
            .map(|c| i64::from_le_bytes(array::<8>(c, order)) as f32)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_f32_tensor() {
        let values: Vec<f32> = (0..12).map(|v| v as f32 * 0.5).collect();
        let payload = encode(&[3, 2, 2], DType::F32, &values).unwrap();
        assert_eq!((payload.len() - values.len() * 4) % HEADER_ALIGN, 0);

        let tensor = decode(&payload).unwrap();
        assert_eq!(tensor.dtype(), DType::F32);
        assert_eq!(tensor.shape(), &[3, 2, 2]);
        assert_eq!(tensor.data()[&[1, 0, 1][..]], 2.5);
    }

    #[test]
    fn tolerates_trailing_line_terminators() {
        let mut payload = encode(&[2], DType::U8, &[7.0, 200.0]).unwrap();
        payload.extend_from_slice(b"\r\n");
        let tensor = decode(&payload).unwrap();
        assert_eq!(tensor.dtype(), DType::U8);
        assert_eq!(tensor.data().as_slice().unwrap(), &[7.0, 200.0]);
    }

    #[test]
    fn decodes_big_endian_and_version_two_headers() {
        let header = "{'descr': '>i4', 'fortran_order': False, 'shape': (2,), }\n";
        let mut payload = Vec::new();
        payload.extend_from_slice(MAGIC);
        payload.extend_from_slice(&[2, 0]);
        payload.extend_from_slice(&(header.len() as u32).to_le_bytes());
        payload.extend_from_slice(header.as_bytes());
        payload.extend_from_slice(&5i32.to_be_bytes());
        payload.extend_from_slice(&(-3i32).to_be_bytes());

        let tensor = decode(&payload).unwrap();
        assert_eq!(tensor.dtype(), DType::I32);
        assert_eq!(tensor.data().as_slice().unwrap(), &[5.0, -3.0]);
    }

    fn raw_payload(descr: &str, shape: &str, data: &[u8]) -> Vec<u8> {
        let header = format!(
            "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}\n",
            descr, shape
        );
        let mut payload = Vec::new();
        payload.extend_from_slice(MAGIC);
        payload.extend_from_slice(&[1, 0]);
        payload.extend_from_slice(&(header.len() as u16).to_le_bytes());
        payload.extend_from_slice(header.as_bytes());
        payload.extend_from_slice(data);
        payload
    }

    #[test]
    fn decodes_eight_byte_element_types() {
        let mut data = Vec::new();
        data.extend_from_slice(&0.75f64.to_le_bytes());
        data.extend_from_slice(&(-2.5f64).to_le_bytes());
        let tensor = decode(&raw_payload("<f8", "(2,)", &data)).unwrap();
        assert_eq!(tensor.dtype(), DType::F64);
        assert_eq!(tensor.data().as_slice().unwrap(), &[0.75, -2.5]);

        let mut data = Vec::new();
        data.extend_from_slice(&255i64.to_be_bytes());
        data.extend_from_slice(&(-7i64).to_be_bytes());
        let tensor = decode(&raw_payload(">i8", "(1, 2)", &data)).unwrap();
        assert_eq!(tensor.dtype(), DType::I64);
        assert_eq!(tensor.shape(), &[1, 2]);
        assert_eq!(tensor.data().as_slice().unwrap(), &[255.0, -7.0]);
    }

    #[test]
    fn native_byte_order_prefix_reads_little_endian() {
        let mut data = Vec::new();
        data.extend_from_slice(&1.5f32.to_le_bytes());
        let tensor = decode(&raw_payload("=f4", "(1,)", &data)).unwrap();
        assert_eq!(tensor.dtype(), DType::F32);
        assert_eq!(tensor.data().as_slice().unwrap(), &[1.5]);

        let tensor = decode(&raw_payload("=i4", "(1,)", &42i32.to_le_bytes())).unwrap();
        assert_eq!(tensor.dtype(), DType::I32);
        assert_eq!(tensor.data().as_slice().unwrap(), &[42.0]);
    }

    #[test]
    fn rejects_bad_magic() {
        let err = decode(b"PK\x03\x04 not a tensor").unwrap_err();
        assert!(matches!(err, FrameError::CorruptFrame(_)));
    }

    #[test]
    fn rejects_truncated_data() {
        let payload = encode(&[4, 4], DType::F32, &[0.25; 16]).unwrap();
        let err = decode(&payload[..payload.len() - 3]).unwrap_err();
        assert!(matches!(err, FrameError::CorruptFrame(_)));
    }

    #[test]
    fn rejects_trailing_garbage() {
        let mut payload = encode(&[1], DType::F32, &[1.0]).unwrap();
        payload.extend_from_slice(b"junk\n");
        assert!(matches!(decode(&payload), Err(FrameError::CorruptFrame(_))));
    }

    #[test]
    fn rejects_unsupported_layouts() {
        for header in [
            "{'descr': '<c8', 'fortran_order': False, 'shape': (1,), }\n",
            "{'descr': '<f4', 'fortran_order': True, 'shape': (1,), }\n",
            "{'descr': '<f4', 'fortran_order': False, 'shape': (x,), }\n",
            "{'descr': '<f4', 'shape': (1,), }\n",
        ] {
            let mut payload = Vec::new();
            payload.extend_from_slice(MAGIC);
            payload.extend_from_slice(&[1, 0]);
            payload.extend_from_slice(&(header.len() as u16).to_le_bytes());
            payload.extend_from_slice(header.as_bytes());
            payload.extend_from_slice(&[0u8; 8]);
            assert!(
                matches!(decode(&payload), Err(FrameError::CorruptFrame(_))),
                "header accepted: {}",
                header
            );
        }
    }

    #[test]
    fn rejects_unknown_version() {
        let mut payload = encode(&[1], DType::F32, &[1.0]).unwrap();
        payload[6] = 9;
        assert!(matches!(decode(&payload), Err(FrameError::CorruptFrame(_))));
    }
}
