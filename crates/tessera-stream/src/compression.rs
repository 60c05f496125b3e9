//! Frame body compression
//!
//! Each frame names the codec its body was compressed with, so codecs can be
//! switched between events in the same stream.
//!
//! | ID | Codec | Crate |
//! |----|-------|-------|
//! | 0 | none | |
//! | 1 | LZ4 block | `lz4_flex` |
//! | 2 | gzip stream | `flate2` |
//! | 3 | zstd | `zstd` |

use std::fmt;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{StreamError, StreamResult};

/// Compression codec applied to a frame body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Compression {
    /// Body stored as-is
    None,
    /// LZ4 block format (default)
    #[default]
    Lz4,
    /// gzip stream
    Gzip,
    /// zstd frame
    Zstd,
}

/// Tuning knobs for codecs that take a level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionLevels {
    /// gzip level, 0-9
    pub gzip: u32,
    /// zstd level, 1-22
    pub zstd: i32,
}

impl Default for CompressionLevels {
    fn default() -> Self {
        Self { gzip: 6, zstd: 3 }
    }
}

impl Compression {
    /// Every supported codec
    pub const ALL: [Compression; 4] = [
        Compression::None,
        Compression::Lz4,
        Compression::Gzip,
        Compression::Zstd,
    ];

    /// Wire identifier
    pub fn id(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Lz4 => 1,
            Compression::Gzip => 2,
            Compression::Zstd => 3,
        }
    }

    /// Look up a codec by wire identifier
    pub fn from_id(id: u8) -> StreamResult<Self> {
        match id {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Lz4),
            2 => Ok(Compression::Gzip),
            3 => Ok(Compression::Zstd),
            other => Err(StreamError::UnsupportedCodec(other)),
        }
    }

    /// Compress a block
    pub fn compress(self, data: &[u8], levels: CompressionLevels) -> StreamResult<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Lz4 => Ok(lz4_flex::block::compress(data)),
            Compression::Gzip => {
                let mut encoder = flate2::write::GzEncoder::new(
                    Vec::with_capacity(data.len() / 2),
                    flate2::Compression::new(levels.gzip),
                );
                encoder
                    .write_all(data)
                    .map_err(|e| self.compress_error(e))?;
                encoder.finish().map_err(|e| self.compress_error(e))
            }
            Compression::Zstd => {
                zstd::bulk::compress(data, levels.zstd).map_err(|e| self.compress_error(e))
            }
        }
    }

    /// Decompress a body that must expand to exactly `expected_len` bytes
    pub fn decompress(self, data: &[u8], expected_len: usize) -> StreamResult<Vec<u8>> {
        let out = match self {
            Compression::None => data.to_vec(),
            Compression::Lz4 => lz4_flex::block::decompress(data, expected_len)
                .map_err(|e| self.decompress_error(e))?,
            Compression::Gzip => {
                let mut out = Vec::with_capacity(expected_len);
                // One byte past the expected length is enough to detect overrun
                flate2::read::GzDecoder::new(data)
                    .take(expected_len as u64 + 1)
                    .read_to_end(&mut out)
                    .map_err(|e| self.decompress_error(e))?;
                out
            }
            Compression::Zstd => zstd::bulk::decompress(data, expected_len)
                .map_err(|e| self.decompress_error(e))?,
        };

        if out.len() != expected_len {
            return Err(StreamError::Decompress {
                codec: self,
                reason: format!("expected {expected_len} bytes, got {}", out.len()),
            });
        }
        Ok(out)
    }

    fn compress_error(self, err: impl fmt::Display) -> StreamError {
        StreamError::Compress {
            codec: self,
            reason: err.to_string(),
        }
    }

    fn decompress_error(self, err: impl fmt::Display) -> StreamError {
        StreamError::Decompress {
            codec: self,
            reason: err.to_string(),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Compression::None => "none",
            Compression::Lz4 => "lz4",
            Compression::Gzip => "gzip",
            Compression::Zstd => "zstd",
        };
        f.write_str(name)
    }
}
