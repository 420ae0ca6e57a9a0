//! Incremental framing of streamed answers
//!
//! The backend writes `data: <fragment>\n\n` frames and finishes with
//! `data: [DONE]\n\n` (or simply closes the body). Network reads cut this
//! byte stream at arbitrary points, so [`FrameDecoder`] keeps a carry buffer
//! of the incomplete tail between chunks.

use std::pin::Pin;

use async_stream::stream;
use futures::StreamExt;
use tokio_stream::Stream;

use crate::error::{Error, Result};

/// Frame delimiter
const DELIMITER: &[u8] = b"\n\n";
/// Prefix of a data frame
const DATA_PREFIX: &str = "data: ";
/// Payload that marks the end of the answer
const DONE_SENTINEL: &str = "[DONE]";

/// A logical unit extracted from the raw stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// A fragment of answer text
    Data(String),
    /// Normal end of stream
    Done,
}

impl StreamFrame {
    pub fn is_done(&self) -> bool {
        matches!(self, StreamFrame::Done)
    }
}

/// A stream of raw body chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// A stream of decoded frames
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<StreamFrame>> + Send>>;

/// Reassembles frames from arbitrarily cut chunks.
///
/// The carry buffer holds raw bytes and is only decoded once a whole frame
/// is present. The delimiter is plain ASCII and can never occur inside a
/// multi-byte UTF-8 sequence, so a character split across two reads is
/// always rejoined before decoding.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    carry: Vec<u8>,
    /// Prefix of `carry` already known not to start a delimiter
    scanned: usize,
    finished: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminator has been seen
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one chunk and return every frame it completes, in order.
    ///
    /// Once a terminator is returned the decoder is finished and ignores all
    /// further input, including frames that followed it in the same chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }

        self.carry.extend_from_slice(chunk);

        let mut start = 0;
        let mut from = self.scanned;
        while let Some(pos) = find_delimiter(&self.carry[from..]) {
            let end = from + pos;
            let raw = &self.carry[start..end];
            start = end + DELIMITER.len();
            from = start;

            if let Some(frame) = parse_frame(raw) {
                let done = frame.is_done();
                frames.push(frame);
                if done {
                    self.finished = true;
                    self.carry.clear();
                    self.scanned = 0;
                    return frames;
                }
            }
        }

        self.carry.drain(..start);
        // The tail may hold the first half of a delimiter
        self.scanned = self.carry.len().saturating_sub(DELIMITER.len() - 1);
        frames
    }

    /// Signal end of input. An incomplete trailing frame is dropped.
    pub fn finish(&mut self) {
        if !self.carry.is_empty() {
            tracing::debug!(
                "Discarding {} bytes of incomplete frame at end of stream",
                self.carry.len()
            );
        }
        self.carry.clear();
        self.scanned = 0;
        self.finished = true;
    }
}

fn find_delimiter(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(DELIMITER.len())
        .position(|window| window == DELIMITER)
}

/// Decode one complete frame. Frames without the data prefix (comments,
/// keep-alives) yield `None`.
fn parse_frame(raw: &[u8]) -> Option<StreamFrame> {
    let text = String::from_utf8_lossy(raw);
    let payload = text.strip_prefix(DATA_PREFIX)?;
    if payload == DONE_SENTINEL {
        Some(StreamFrame::Done)
    } else {
        Some(StreamFrame::Data(payload.to_string()))
    }
}

/// Turn a body byte stream into a frame stream.
///
/// Reading stops right after the terminator; the remaining body is never
/// polled. A read error is yielded once and ends the stream.
pub fn frames(mut body: ByteStream) -> FrameStream {
    Box::pin(stream! {
        let mut decoder = FrameDecoder::new();

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for frame in decoder.push(&bytes) {
                        yield Ok(frame);
                    }
                    if decoder.is_finished() {
                        return;
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        decoder.finish();
    })
}

/// Adapt a reqwest response body into a [`ByteStream`]
pub fn body_stream(response: reqwest::Response) -> ByteStream {
    Box::pin(response.bytes_stream().map(|chunk| match chunk {
        Ok(bytes) => Ok(bytes.to_vec()),
        Err(e) if e.is_body() || e.is_decode() => Err(Error::Stream(e.to_string())),
        Err(e) => Err(Error::Http(e)),
    }))
}
