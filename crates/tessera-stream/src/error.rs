//! Error types for tessera-stream

use thiserror::Error;

use tessera_core::EventError;

use crate::compression::Compression;

/// Errors that can occur while writing or reading a Tessera stream
#[derive(Debug, Error)]
pub enum StreamError {
    /// I/O error on the underlying sink or source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The event could not be turned into a block
    #[error("Event encode error: {0}")]
    Encode(#[from] EventError),

    /// The frame names a codec this build does not know
    #[error("Unsupported codec id: {0}")]
    UnsupportedCodec(u8),

    /// Compressing a block failed
    #[error("{codec} compression failed: {reason}")]
    Compress { codec: Compression, reason: String },

    /// The frame body could not be decompressed to its declared size
    #[error("{codec} decompression failed: {reason}")]
    Decompress { codec: Compression, reason: String },

    /// The decompressed body is not a valid event block
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// The stream is truncated or its framing is invalid
    #[error("Stream corrupt: {0}")]
    StreamCorrupt(String),

    /// The frame body does not match its checksum
    #[error("Frame checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// A frame exceeds the configured size limit
    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

impl StreamError {
    /// Create a new StreamCorrupt error
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::StreamCorrupt(message.into())
    }

    /// Whether this error means the bytes of the stream are damaged
    ///
    /// I/O failures and encode failures are not corruption: retrying may
    /// succeed.
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            StreamError::StreamCorrupt(_)
                | StreamError::ChecksumMismatch { .. }
                | StreamError::FrameTooLarge { .. }
                | StreamError::Decompress { .. }
                | StreamError::MalformedFrame(_)
                | StreamError::UnsupportedCodec(_)
        )
    }
}

/// Result alias for stream operations
pub type StreamResult<T> = Result<T, StreamError>;
