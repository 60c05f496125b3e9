//! Frame layout and framing helpers
//!
//! A stream is a plain concatenation of frames, one event per frame:
//!
//! ```text
//! [magic "TSRA"][version u8][codec u8][reserved u16]
//! [compressed_len u32][uncompressed_len u32][crc32c u32]   (20 bytes, little-endian)
//! [compressed_len bytes of body]
//! ```
//!
//! Frames carry no reference to their neighbours, so a stream can be cut
//! after any frame, or two streams concatenated, and remain readable.

use std::collections::VecDeque;
use std::io::{self, Read};

use crc32c::crc32c;

use crate::compression::{Compression, CompressionLevels};
use crate::error::{StreamError, StreamResult};

/// Magic bytes opening every frame
pub const FRAME_MAGIC: [u8; 4] = *b"TSRA";

/// Current frame format version
pub const FRAME_VERSION: u8 = 1;

/// Size of the fixed frame header in bytes
pub const HEADER_LEN: usize = 20;

/// Fixed-size header preceding every frame body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw codec identifier, validated only when the body is opened
    pub codec_id: u8,
    pub compressed_len: u32,
    pub uncompressed_len: u32,
    /// crc32c of the compressed body
    pub checksum: u32,
}

impl FrameHeader {
    /// Serialize the header
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&FRAME_MAGIC);
        bytes[4] = FRAME_VERSION;
        bytes[5] = self.codec_id;
        // bytes[6..8] reserved
        bytes[8..12].copy_from_slice(&self.compressed_len.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.uncompressed_len.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Parse a header, rejecting foreign magic, unknown versions and
    /// non-zero reserved bytes
    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> StreamResult<Self> {
        let [m0, m1, m2, m3, version, codec_id, r0, r1, c0, c1, c2, c3, u0, u1, u2, u3, k0, k1, k2, k3] =
            *bytes;

        if [m0, m1, m2, m3] != FRAME_MAGIC {
            return Err(StreamError::corrupt(format!(
                "bad frame magic {:02x?}",
                [m0, m1, m2, m3]
            )));
        }
        if version != FRAME_VERSION {
            return Err(StreamError::corrupt(format!(
                "unsupported frame version {version}"
            )));
        }
        if [r0, r1] != [0, 0] {
            return Err(StreamError::corrupt(format!(
                "reserved header bytes set: {:02x?}",
                [r0, r1]
            )));
        }

        Ok(Self {
            codec_id,
            compressed_len: u32::from_le_bytes([c0, c1, c2, c3]),
            uncompressed_len: u32::from_le_bytes([u0, u1, u2, u3]),
            checksum: u32::from_le_bytes([k0, k1, k2, k3]),
        })
    }

    /// Codec named by this header
    pub fn compression(&self) -> StreamResult<Compression> {
        Compression::from_id(self.codec_id)
    }

    /// Reject headers declaring bodies above `max` bytes
    pub fn check_size(&self, max: usize) -> StreamResult<()> {
        let size = self.compressed_len.max(self.uncompressed_len) as usize;
        if size > max {
            return Err(StreamError::FrameTooLarge { size, max });
        }
        Ok(())
    }

    /// Total frame size including the header
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.compressed_len as usize
    }
}

/// Compress an event block and wrap it into a complete frame
pub fn seal_frame(
    block: &[u8],
    compression: Compression,
    levels: CompressionLevels,
    max_frame_bytes: usize,
) -> StreamResult<Vec<u8>> {
    let body = compression.compress(block, levels)?;

    let size = body.len().max(block.len());
    if size > max_frame_bytes {
        return Err(StreamError::FrameTooLarge {
            size,
            max: max_frame_bytes,
        });
    }
    let too_large = |size: usize| StreamError::FrameTooLarge {
        size,
        max: u32::MAX as usize,
    };
    let compressed_len = u32::try_from(body.len()).map_err(|_| too_large(body.len()))?;
    let uncompressed_len = u32::try_from(block.len()).map_err(|_| too_large(block.len()))?;

    let header = FrameHeader {
        codec_id: compression.id(),
        compressed_len,
        uncompressed_len,
        checksum: crc32c(&body),
    };

    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Verify and decompress a frame body back into an event block
pub fn open_frame(header: &FrameHeader, body: &[u8], verify_checksum: bool) -> StreamResult<Vec<u8>> {
    if verify_checksum {
        let actual = crc32c(body);
        if actual != header.checksum {
            return Err(StreamError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }
    }

    let compression = header.compression()?;
    compression.decompress(body, header.uncompressed_len as usize)
}

/// Read the next header from a blocking source
///
/// Returns `Ok(None)` only when the source ends exactly on a frame boundary.
pub fn read_header<R: Read>(reader: &mut R) -> StreamResult<Option<FrameHeader>> {
    let mut buf = [0u8; HEADER_LEN];
    let mut filled = 0usize;
    while filled < HEADER_LEN {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(StreamError::corrupt(format!(
                    "truncated frame header: {filled} of {HEADER_LEN} bytes"
                )));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    FrameHeader::from_bytes(&buf).map(Some)
}

/// Read a frame body of the length declared by `header`
pub fn read_body<R: Read>(reader: &mut R, header: &FrameHeader) -> StreamResult<Vec<u8>> {
    let len = header.compressed_len as usize;
    let mut body = Vec::with_capacity(len);
    reader.take(len as u64).read_to_end(&mut body)?;
    if body.len() != len {
        return Err(truncated_body(body.len(), len));
    }
    Ok(body)
}

/// Discard a frame body without buffering it
pub fn skip_body<R: Read>(reader: &mut R, header: &FrameHeader) -> StreamResult<()> {
    let len = header.compressed_len as u64;
    let skipped = io::copy(&mut reader.take(len), &mut io::sink())?;
    if skipped != len {
        return Err(truncated_body(skipped as usize, len as usize));
    }
    Ok(())
}

pub(crate) fn truncated_body(got: usize, declared: usize) -> StreamError {
    StreamError::corrupt(format!(
        "truncated frame body: {got} of {declared} declared bytes"
    ))
}

/// FIFO of sealed frames waiting to be written
///
/// Tracks how much of the head frame has already reached the sink, so a
/// write that fails halfway resumes exactly where it stopped.
#[derive(Debug, Default)]
pub(crate) struct FrameQueue {
    frames: VecDeque<Vec<u8>>,
    /// Bytes of the head frame already written
    offset: usize,
    /// Bytes queued, including the written part of the head frame
    queued_bytes: usize,
}

impl FrameQueue {
    pub(crate) fn push(&mut self, frame: Vec<u8>) {
        self.queued_bytes += frame.len();
        self.frames.push_back(frame);
    }

    /// Unwritten remainder of the head frame
    pub(crate) fn head(&self) -> Option<&[u8]> {
        self.frames.front().map(|frame| &frame[self.offset..])
    }

    /// Record that `n` bytes of the head frame reached the sink
    ///
    /// Returns true when this completed the head frame.
    pub(crate) fn advance(&mut self, n: usize) -> bool {
        self.offset += n;
        match self.frames.front() {
            Some(frame) if self.offset >= frame.len() => {
                self.queued_bytes -= frame.len();
                self.offset = 0;
                self.frames.pop_front();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Bytes not yet written
    pub(crate) fn pending_bytes(&self) -> usize {
        self.queued_bytes - self.offset
    }
}
