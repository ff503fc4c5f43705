//! Frame loop: stream → pipeline → sink.
//!
//! Two schedules are provided:
//! - `run_stream`: single-threaded pull loop. Each frame is decoded,
//!   classified, and rendered before the next line is read.
//! - `run_stream_queued`: a reader thread feeds a bounded channel and the
//!   calling thread runs inference. When the channel is full the reader
//!   blocks, so frames are never dropped or reordered and memory stays bounded.
//!
//! Per-frame errors are logged and counted; only stream I/O errors end the
//! loop with an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, SendTimeoutError};

use crate::annotate::AnnotationSink;
use crate::error::{FrameError, StreamError};
use crate::frame::{Frame, Verdict};
use crate::pipeline::Pipeline;

const SUMMARY_LOG_INTERVAL: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Counters for one run of the frame loop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub rendered: u64,
    pub correct: u64,
    pub incorrect: u64,
    pub corrupt: u64,
    pub shape_mismatch: u64,
    pub inference_errors: u64,
    pub sink_errors: u64,
}

impl RunSummary {
    fn record_verdict(&mut self, verdict: Option<Verdict>) {
        match verdict {
            Some(Verdict::Correct) => self.correct += 1,
            Some(Verdict::Incorrect) => self.incorrect += 1,
            None => {}
        }
    }

    fn record_error(&mut self, err: &FrameError) {
        match err {
            FrameError::CorruptFrame(_) | FrameError::MalformedRoi { .. } => self.corrupt += 1,
            FrameError::ShapeMismatch(_) => self.shape_mismatch += 1,
            FrameError::UnexpectedClass(_) | FrameError::Inference(_) => {
                self.inference_errors += 1
            }
        }
    }

    fn log(&self) {
        log::info!(
            "frames={} rendered={} correct={} incorrect={} corrupt={} shape_mismatch={} inference_errors={} sink_errors={}",
            self.frames,
            self.rendered,
            self.correct,
            self.incorrect,
            self.corrupt,
            self.shape_mismatch,
            self.inference_errors,
            self.sink_errors
        );
    }
}

/// Why the loop stopped without a stream error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Upstream closed the stream.
    StreamEnded,
    /// The stop flag was raised (e.g. Ctrl-C).
    Interrupted,
    /// The sink reported it can no longer present frames.
    SinkClosed,
}

/// Process a single frame and hand it to the sink.
fn handle_frame<S: AnnotationSink + ?Sized>(
    frame: Frame,
    pipeline: &Pipeline,
    sink: &mut S,
    summary: &mut RunSummary,
) {
    summary.frames += 1;
    let index = frame.index;
    let outcome = match pipeline.process(frame) {
        Ok(outcome) => outcome,
        Err(err) => {
            summary.record_error(&err);
            log::warn!("frame #{} skipped ({}): {}", index, err.kind(), err);
            return;
        }
    };
    summary.record_verdict(outcome.verdict);
    match sink.render(&outcome) {
        Ok(()) => summary.rendered += 1,
        Err(err) => {
            summary.sink_errors += 1;
            log::warn!("frame #{} render failed: {:#}", index, err);
        }
    }
}

/// Raise the stop flag. Returns `true` if it was already raised, i.e. this is
/// a repeated request.
pub fn request_stop(stop: &AtomicBool) -> bool {
    stop.swap(true, Ordering::SeqCst)
}

/// Single-threaded pull loop.
///
/// `stop` is checked before each pull, so a raised flag is honored without
/// touching the stream. A pull that blocks on a stalled upstream is not
/// interrupted; callers that need that use `run_stream_queued`.
pub fn run_stream<I, S>(
    frames: I,
    pipeline: &Pipeline,
    sink: &mut S,
    stop: &AtomicBool,
) -> Result<(RunSummary, StopReason), StreamError>
where
    I: IntoIterator<Item = Result<Frame, StreamError>>,
    S: AnnotationSink + ?Sized,
{
    let mut frames = frames.into_iter();
    let mut summary = RunSummary::default();
    let mut last_log = Instant::now();

    let result = loop {
        if stop.load(Ordering::SeqCst) {
            break Ok(StopReason::Interrupted);
        }
        let frame = match frames.next() {
            Some(Ok(frame)) => frame,
            Some(Err(err)) => break Err(err),
            None => break Ok(StopReason::StreamEnded),
        };
        handle_frame(frame, pipeline, sink, &mut summary);

        if last_log.elapsed() >= SUMMARY_LOG_INTERVAL {
            summary.log();
            last_log = Instant::now();
        }
        if !sink.is_open() {
            break Ok(StopReason::SinkClosed);
        }
    };

    summary.log();
    result.map(|reason| (summary, reason))
}

/// Reader thread + bounded channel + inference on the calling thread.
///
/// `capacity` is clamped to at least 1. A full channel blocks the reader.
pub fn run_stream_queued<I, S>(
    frames: I,
    pipeline: &Pipeline,
    sink: &mut S,
    stop: Arc<AtomicBool>,
    capacity: usize,
) -> Result<(RunSummary, StopReason), StreamError>
where
    I: IntoIterator<Item = Result<Frame, StreamError>> + Send + 'static,
    I::IntoIter: Send,
    S: AnnotationSink + ?Sized,
{
    let (tx, rx) = crossbeam_channel::bounded::<Result<Frame, StreamError>>(capacity.max(1));
    let halt = Arc::new(AtomicBool::new(false));
    let reader_stop = stop.clone();
    let reader_halt = halt.clone();
    let reader = thread::Builder::new()
        .name("frame-reader".to_string())
        .spawn(move || {
            for item in frames {
                let mut item = item;
                loop {
                    if reader_stop.load(Ordering::SeqCst) || reader_halt.load(Ordering::SeqCst) {
                        return;
                    }
                    match tx.send_timeout(item, POLL_INTERVAL) {
                        Ok(()) => break,
                        Err(SendTimeoutError::Timeout(back)) => item = back,
                        Err(SendTimeoutError::Disconnected(_)) => return,
                    }
                }
            }
        })
        .map_err(StreamError::Io)?;

    let mut summary = RunSummary::default();
    let mut last_log = Instant::now();
    let result = loop {
        if stop.load(Ordering::SeqCst) {
            break Ok(StopReason::Interrupted);
        }
        if !sink.is_open() {
            break Ok(StopReason::SinkClosed);
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(frame)) => handle_frame(frame, pipeline, sink, &mut summary),
            Ok(Err(err)) => break Err(err),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break Ok(StopReason::StreamEnded),
        }
        if last_log.elapsed() >= SUMMARY_LOG_INTERVAL {
            summary.log();
            last_log = Instant::now();
        }
    };

    // Unblock the reader if it is parked on a full channel.
    halt.store(true, Ordering::SeqCst);
    drop(rx);
    match result {
        Ok(StopReason::Interrupted) | Ok(StopReason::SinkClosed) => {
            // The reader may be blocked on an upstream read; leave it detached.
            log::debug!("leaving frame reader detached");
        }
        _ => {
            if reader.join().is_err() {
                log::error!("frame reader thread panicked");
            }
        }
    }

    summary.log();
    result.map(|reason| (summary, reason))
}
