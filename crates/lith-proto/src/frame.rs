//! Stream framing.
//!
//! ```text
//! [total_len: u32 BE, includes these 5 bytes][compressed: u8][body...]
//! ```
//!
//! The transport delivers arbitrary chunks; the reader buffers them and
//! yields complete frames strictly in arrival order.

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use crate::constants::{DEFAULT_MAX_FRAME_LEN, FRAME_PREAMBLE_LEN};
use crate::error::ProtocolError;
use crate::message::RelayMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub compressed: bool,
    pub body: Bytes,
}

impl Frame {
    /// Decode the body. Compressed frames are refused rather than parsed raw.
    pub fn decode(&self) -> Result<RelayMessage, ProtocolError> {
        if self.compressed {
            return Err(ProtocolError::CompressedFrame);
        }
        RelayMessage::decode(&self.body)
    }

    /// Hex dump of at most `max` leading body bytes, for logging.
    pub fn hex_preview(&self, max: usize) -> String {
        let shown = &self.body[..self.body.len().min(max)];
        if shown.len() < self.body.len() {
            format!("{}..", hex::encode(shown))
        } else {
            hex::encode(shown)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    AwaitingHeader,
    ReceivingBody { remaining: usize, compressed: bool },
}

#[derive(Debug)]
pub struct FrameReader {
    buf: BytesMut,
    state: ReadState,
    max_frame_len: usize,
}

impl FrameReader {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            state: ReadState::AwaitingHeader,
            max_frame_len,
        }
    }

    /// Feed one stream read; returns every frame it completed.
    ///
    /// A partial preamble or body stays buffered until later reads complete
    /// it. Errors are header violations after which the stream cannot be
    /// resynchronised.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>, ProtocolError> {
        self.buf.extend_from_slice(data);
        let mut frames = Vec::new();

        loop {
            match self.state {
                ReadState::AwaitingHeader => {
                    if self.buf.len() < FRAME_PREAMBLE_LEN {
                        break;
                    }
                    let total = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
                    let compressed = self.buf[4] != 0;

                    let total_len = total as usize;
                    if total_len < FRAME_PREAMBLE_LEN {
                        return Err(ProtocolError::InvalidFrameLength(total));
                    }
                    if total_len > self.max_frame_len {
                        return Err(ProtocolError::FrameTooLarge {
                            got: total_len,
                            max: self.max_frame_len,
                        });
                    }

                    self.buf.advance(FRAME_PREAMBLE_LEN);
                    self.state = ReadState::ReceivingBody {
                        remaining: total_len - FRAME_PREAMBLE_LEN,
                        compressed,
                    };
                }
                ReadState::ReceivingBody {
                    remaining,
                    compressed,
                } => {
                    if self.buf.len() < remaining {
                        break;
                    }
                    let body = self.buf.split_to(remaining).freeze();
                    trace!(len = body.len(), compressed, "Frame complete");
                    frames.push(Frame { compressed, body });
                    self.state = ReadState::AwaitingHeader;
                }
            }
        }

        Ok(frames)
    }

    /// `(received, expected)` body bytes of the frame in flight, if any.
    pub fn progress(&self) -> Option<(usize, usize)> {
        match self.state {
            ReadState::AwaitingHeader => None,
            ReadState::ReceivingBody { remaining, .. } => {
                Some((self.buf.len().min(remaining), remaining))
            }
        }
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}
