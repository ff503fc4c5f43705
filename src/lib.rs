//! Maskwatch: live mask-compliance classification over a streamed tensor feed.
//!
//! A frame server pushes image tensors over one long-lived HTTP response,
//! optionally preceded by a region-of-interest block naming a face. Each
//! frame is decoded, the region is cropped and classified by a two-class
//! model, and the frame is rendered with a green (correct) or red
//! (incorrect) rectangle around the region.
//!
//! # Module Structure
//!
//! - `ingest`: line framing and frame demultiplexing (HTTP and replay sources)
//! - `tensor`: NPY tensor payload decoding
//! - `detect`: classifier capability (`tract` ONNX backend, stub backend)
//! - `pipeline`: crop, preprocess, classify, vote
//! - `annotate`: rectangle rendering and presentation sinks
//! - `runner`: the frame loop, synchronous or with a bounded queue
//! - `config`: file and environment configuration

pub mod annotate;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod runner;
pub mod tensor;

pub use annotate::{draw_roi, AnnotationSink, LogSink};
pub use config::MaskwatchConfig;
pub use detect::{Classifier, ModelArch, StubClassifier};
pub use error::{FrameError, StreamError};
pub use frame::{Frame, RectBounds, Roi, Verdict};
pub use ingest::{FrameDemuxer, FrameStream, ReplaySource};
pub use pipeline::{FrameOutcome, Pipeline};
pub use runner::{request_stop, run_stream, run_stream_queued, RunSummary, StopReason};
pub use tensor::{DType, DecodedTensor};
