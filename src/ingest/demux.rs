//! Frame demultiplexer.
//!
//! Turns a newline-delimited byte stream into `Frame` records. The protocol is
//! a sequence of marker lines interleaved with payload lines:
//!
//! ```text
//! Content-Type: image/jpeg      reset accumulation buffer
//! <tensor bytes ...>            accumulated, each line + "\n"
//! --coords                      next line is the ROI payload
//! <20 raw bytes>                five little-endian i32
//! --frame                       emit the accumulated frame
//! ```
//!
//! The ROI and tensor are correlated purely by order: a frame carries the ROI
//! parsed most recently before its boundary, and the pending ROI is cleared
//! together with the emission.

use std::io::{self, BufRead, Read};

use crate::error::StreamError;
use crate::frame::{Frame, Roi};

pub const CONTENT_TYPE_SENTINEL: &[u8] = b"Content-Type: image/jpeg";
pub const PAYLOAD_TAG_SENTINEL: &[u8] = b"--coords";
pub const FRAME_BOUNDARY_SENTINEL: &[u8] = b"--frame";

/// Hard cap on bytes accumulated for a single frame.
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DemuxState {
    /// No frame in progress (start, or just after an emission).
    Idle,
    /// Accumulating tensor lines.
    Buffering,
    /// The previous line was `--coords`; the next line is ROI bytes.
    AwaitingPayloadBytes,
    /// An oversized frame was dropped; lines are ignored until the next
    /// `--frame` or content-type line.
    Discarding,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DemuxStats {
    pub lines: u64,
    pub frames_emitted: u64,
    pub keep_alives: u64,
    pub malformed_rois: u64,
    pub oversized_frames: u64,
}

/// Line-driven frame demultiplexer.
#[derive(Debug)]
pub struct FrameDemuxer {
    state: DemuxState,
    buffer: Vec<u8>,
    pending_roi: Option<Roi>,
    max_frame_bytes: usize,
    next_index: u64,
    stats: DemuxStats,
}

impl FrameDemuxer {
    pub fn new() -> Self {
        Self::with_max_frame_bytes(MAX_FRAME_BYTES)
    }

    pub fn with_max_frame_bytes(max_frame_bytes: usize) -> Self {
        Self {
            state: DemuxState::Idle,
            buffer: Vec::new(),
            pending_roi: None,
            max_frame_bytes,
            next_index: 0,
            stats: DemuxStats::default(),
        }
    }

    pub fn state(&self) -> DemuxState {
        self.state
    }

    pub fn stats(&self) -> &DemuxStats {
        &self.stats
    }

    pub fn pending_roi(&self) -> Option<Roi> {
        self.pending_roi
    }

    /// Bytes accumulated for the frame in progress.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Feed one line (without its terminator). Returns a frame when the line
    /// is a boundary that closes non-empty accumulated content.
    ///
    /// Rules are checked in priority order: content-type reset, discard mode
    /// after an oversized frame, pending ROI bytes, `--coords` tag, `--frame`
    /// boundary, then plain content.
    pub fn push_line(&mut self, line: &[u8]) -> Option<Frame> {
        self.stats.lines += 1;

        if line == CONTENT_TYPE_SENTINEL {
            self.buffer.clear();
            self.state = DemuxState::Buffering;
            return None;
        }

        if self.state == DemuxState::Discarding {
            if line == FRAME_BOUNDARY_SENTINEL {
                self.state = DemuxState::Idle;
            }
            return None;
        }

        if self.state == DemuxState::AwaitingPayloadBytes {
            self.pending_roi = match Roi::from_le_bytes(line) {
                Ok(roi) => Some(roi),
                Err(err) => {
                    self.stats.malformed_rois += 1;
                    log::warn!("{}; frame will carry no roi", err);
                    None
                }
            };
            self.state = DemuxState::Buffering;
            return None;
        }

        if line == PAYLOAD_TAG_SENTINEL {
            self.state = DemuxState::AwaitingPayloadBytes;
            return None;
        }

        if line == FRAME_BOUNDARY_SENTINEL {
            if self.buffer.is_empty() {
                self.stats.keep_alives += 1;
                return None;
            }
            return Some(self.emit());
        }

        if line.is_empty() {
            return None;
        }

        if self.buffer.len() + line.len() + 1 > self.max_frame_bytes {
            self.drop_oversized(self.buffer.len() + line.len() + 1);
            return None;
        }

        self.buffer.extend_from_slice(line);
        self.buffer.push(b'\n');
        self.state = DemuxState::Buffering;
        None
    }

    /// Account for a line the reader refused to buffer because it alone
    /// exceeded the frame size cap.
    pub fn push_oversized_line(&mut self, len: usize) {
        self.stats.lines += 1;
        self.drop_oversized(self.buffer.len() + len);
    }

    /// Everything up to the next boundary belongs to the dropped frame and is
    /// ignored, so one oversized frame is counted once.
    fn drop_oversized(&mut self, bytes: usize) {
        if self.state != DemuxState::Discarding {
            self.stats.oversized_frames += 1;
            log::warn!(
                "frame reached {} bytes (limit {}); dropping it",
                bytes,
                self.max_frame_bytes
            );
        }
        self.buffer.clear();
        self.pending_roi = None;
        self.state = DemuxState::Discarding;
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// Discard any partially accumulated frame (end of stream).
    pub fn finish(&mut self) {
        if !self.buffer.is_empty() {
            log::debug!(
                "stream ended with {} unterminated frame bytes; discarding",
                self.buffer.len()
            );
        }
        self.buffer.clear();
        self.pending_roi = None;
        self.state = DemuxState::Idle;
    }

    fn emit(&mut self) -> Frame {
        let payload = std::mem::take(&mut self.buffer);
        let roi = self.pending_roi.take();
        let frame = Frame::new(self.next_index, payload, roi);
        self.next_index += 1;
        self.stats.frames_emitted += 1;
        self.state = DemuxState::Idle;
        log::debug!(
            "frame #{} emitted: {} bytes, roi={}",
            frame.index,
            frame.payload.len(),
            frame.roi.is_some()
        );
        frame
    }
}

impl Default for FrameDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

/// One line from a [`LineReader`].
#[derive(Debug, PartialEq, Eq)]
pub enum Line<'a> {
    /// Line content without its terminator.
    Data(&'a [u8]),
    /// A line longer than the reader's cap; its bytes were skipped, not
    /// buffered. Carries the skipped length.
    Oversized(usize),
}

/// Reads `\n`-terminated lines as raw bytes, stripping one trailing `\r`.
///
/// At most `max_line` bytes of a line are held in memory; longer lines are
/// skipped through to their terminator and reported as [`Line::Oversized`].
pub struct LineReader<R> {
    reader: R,
    line: Vec<u8>,
    max_line: usize,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max_line(reader, MAX_FRAME_BYTES)
    }

    pub fn with_max_line(reader: R, max_line: usize) -> Self {
        Self {
            reader,
            line: Vec::with_capacity(max_line.min(8 * 1024)),
            max_line,
        }
    }

    /// Next line, or `None` at end of stream.
    pub fn next_line(&mut self) -> io::Result<Option<Line<'_>>> {
        self.line.clear();
        // Room for the content plus "\r\n".
        let limit = self.max_line as u64 + 2;
        let read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.line)?;
        if read == 0 {
            return Ok(None);
        }
        if read as u64 == limit && self.line.last() != Some(&b'\n') {
            let skipped = read + self.skip_to_newline()?;
            self.line.clear();
            self.line.shrink_to(self.max_line.min(8 * 1024));
            return Ok(Some(Line::Oversized(skipped)));
        }
        if self.line.last() == Some(&b'\n') {
            self.line.pop();
        }
        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }
        Ok(Some(Line::Data(&self.line)))
    }

    /// Consume bytes through the next `\n` without buffering them.
    fn skip_to_newline(&mut self) -> io::Result<usize> {
        let mut skipped = 0;
        loop {
            let (done, used) = {
                let available = match self.reader.fill_buf() {
                    Ok(buf) => buf,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err),
                };
                if available.is_empty() {
                    return Ok(skipped);
                }
                match available.iter().position(|&b| b == b'\n') {
                    Some(at) => (true, at + 1),
                    None => (false, available.len()),
                }
            };
            self.reader.consume(used);
            skipped += used;
            if done {
                return Ok(skipped);
            }
        }
    }
}

/// Iterator of frames pulled from a line-oriented byte stream.
///
/// Yields `Err` once on an I/O failure and then ends.
pub struct FrameStream<R> {
    lines: LineReader<R>,
    demuxer: FrameDemuxer,
    done: bool,
}

impl<R: BufRead> FrameStream<R> {
    pub fn new(reader: R) -> Self {
        Self::with_demuxer(reader, FrameDemuxer::new())
    }

    pub fn with_demuxer(reader: R, demuxer: FrameDemuxer) -> Self {
        Self {
            lines: LineReader::with_max_line(reader, demuxer.max_frame_bytes()),
            demuxer,
            done: false,
        }
    }

    pub fn demuxer(&self) -> &FrameDemuxer {
        &self.demuxer
    }
}

impl<R: BufRead> Iterator for FrameStream<R> {
    type Item = Result<Frame, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.lines.next_line() {
                Ok(Some(Line::Data(line))) => {
                    if let Some(frame) = self.demuxer.push_line(line) {
                        return Some(Ok(frame));
                    }
                }
                Ok(Some(Line::Oversized(len))) => self.demuxer.push_oversized_line(len),
                Ok(None) => {
                    self.demuxer.finish();
                    self.done = true;
                    let stats = self.demuxer.stats();
                    log::info!(
                        "frame stream closed: lines={} frames={} keep_alives={} malformed_rois={} oversized_frames={}",
                        stats.lines,
                        stats.frames_emitted,
                        stats.keep_alives,
                        stats.malformed_rois,
                        stats.oversized_frames
                    );
                    return None;
                }
                Err(err) => {
                    self.demuxer.finish();
                    self.done = true;
                    return Some(Err(StreamError::Io(err)));
                }
            }
        }
    }
}
