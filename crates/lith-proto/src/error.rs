use thiserror::Error;

/// Errors produced while decoding the relay's binary stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes remain than a declared length requires.
    #[error("Truncated input: needed {needed} bytes, {remaining} remaining")]
    TruncatedInput { needed: usize, remaining: usize },

    /// An hdata path outside the shapes the client understands.
    #[error("Malformed hdata path: {0}")]
    MalformedPath(String),

    /// A frame header declaring less than its own preamble.
    #[error("Invalid frame length: {0}")]
    InvalidFrameLength(u32),

    #[error("Frame too large: {got} bytes (max {max})")]
    FrameTooLarge { got: usize, max: usize },

    /// The relay sent a compressed frame although compression was refused.
    #[error("Compressed frames are not supported")]
    CompressedFrame,

    #[error("Unknown object type: {0:?}")]
    UnknownType(String),

    #[error("Objects nested deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("Malformed hdata keys: {0}")]
    MalformedKeys(String),
}

impl ProtocolError {
    /// Whether the error leaves the stream in a state that cannot be resynchronised.
    ///
    /// Anything else is confined to one frame, which can be skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedPath(_)
                | ProtocolError::InvalidFrameLength(_)
                | ProtocolError::FrameTooLarge { .. }
        )
    }
}
