//! Frame stream ingestion.
//!
//! This module turns an upstream byte stream into `Frame` records:
//! - `demux`: the line-driven frame demultiplexer (always available)
//! - `http`: long-lived HTTP `GET` source (feature: http-stream)
//! - `replay`: captured stream from a local file or stdin
//!
//! Every source produces a `FrameStream`, an iterator of frames in arrival
//! order. The ingestion layer is responsible for:
//! - Splitting the byte stream into lines
//! - Correlating `--coords` blocks with the frame that follows them
//! - Failing closed on malformed ROI payloads
//!
//! The ingestion layer MUST NOT:
//! - Decode tensors (that is the pipeline's job)
//! - Log payload bytes

pub mod demux;
#[cfg(feature = "http-stream")]
pub mod http;
pub mod replay;

pub use demux::{DemuxState, DemuxStats, FrameDemuxer, FrameStream, Line, LineReader};
#[cfg(feature = "http-stream")]
pub use http::{HttpStreamConfig, HttpStreamSource};
pub use replay::ReplaySource;
