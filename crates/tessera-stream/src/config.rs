//! Writer and reader configuration

use serde::{Deserialize, Serialize};

use crate::compression::{Compression, CompressionLevels};

/// Largest frame body accepted by default (256 MiB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 256 * 1024 * 1024;

/// Configuration for a stream writer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Codec for newly pushed events
    pub compression: Compression,
    /// Levels for codecs that take one
    pub levels: CompressionLevels,
    /// Frames whose compressed or uncompressed body exceeds this are rejected
    pub max_frame_bytes: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Lz4,
            levels: CompressionLevels::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl WriterConfig {
    /// Favor write throughput: LZ4, default limits
    pub fn fast() -> Self {
        Self::default()
    }

    /// Favor output size: zstd at a high level
    pub fn compact() -> Self {
        Self {
            compression: Compression::Zstd,
            levels: CompressionLevels { gzip: 9, zstd: 19 },
            ..Default::default()
        }
    }

    /// No compression at all
    pub fn uncompressed() -> Self {
        Self {
            compression: Compression::None,
            ..Default::default()
        }
    }

    /// Set the codec
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the frame size limit
    pub fn with_max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max;
        self
    }
}

/// Configuration for a stream reader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Frames declaring a larger compressed or uncompressed body are
    /// treated as corrupt instead of being allocated
    pub max_frame_bytes: usize,
    /// Verify the crc32c of every frame body
    pub verify_checksums: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            verify_checksums: true,
        }
    }
}

impl ReaderConfig {
    /// Set the frame size limit
    pub fn with_max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max;
        self
    }

    /// Enable or disable checksum verification
    pub fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }
}
