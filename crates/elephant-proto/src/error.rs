//! Protocol error types.

use std::io;

use thiserror::Error;

/// Maximum accepted frame payload size in bytes.
///
/// Validated before the payload buffer is allocated so a malformed length
/// field cannot force a huge allocation.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Errors arising on the wire.
///
/// The severity ladder the dispatcher applies:
///
/// - [`UnknownRequest`](ProtocolError::UnknownRequest) /
///   [`UnknownFormat`](ProtocolError::UnknownFormat) /
///   [`FrameTooLarge`](ProtocolError::FrameTooLarge): the stream can no
///   longer be trusted, the connection is closed.
/// - [`Decode`](ProtocolError::Decode): the frame was well-formed but its
///   payload was not; the frame is dropped, the connection survives.
/// - [`Io`](ProtocolError::Io): transport failure, the enclosing
///   operation aborts.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Request type byte outside the registered range.
    #[error("unknown request type {0}")]
    UnknownRequest(u8),

    /// Format byte that is neither protobuf nor JSON.
    #[error("unknown wire format {0}")]
    UnknownFormat(u8),

    /// Declared payload length exceeds [`MAX_FRAME_SIZE`].
    #[error("frame payload of {length} bytes exceeds the {MAX_FRAME_SIZE} byte limit")]
    FrameTooLarge {
        /// Length declared in the frame header.
        length: usize,
    },

    /// Payload did not parse in the declared format.
    #[error("payload decode failed: {0}")]
    Decode(String),

    /// Message could not be serialized.
    #[error("payload encode failed: {0}")]
    Encode(String),

    /// Underlying socket failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Whether the dispatcher must close the connection on this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownRequest(_) | Self::UnknownFormat(_) | Self::FrameTooLarge { .. } | Self::Io(_)
        )
    }
}
