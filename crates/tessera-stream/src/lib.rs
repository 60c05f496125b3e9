//! # Tessera Stream
//!
//! Framed, compressed persistence for [`tessera_core::Event`]s.
//!
//! Each event becomes one self-contained frame: a fixed 20-byte header naming
//! the codec, both lengths and a crc32c of the body, followed by the
//! compressed event block. Streams are append-only and can be concatenated.
//!
//! ## Features
//!
//! - Per-frame codec choice: none, LZ4, gzip, zstd
//! - Queued writes that survive partial sink failures
//! - Clean end-of-stream distinguished from truncation and corruption
//! - Lazy, fused event iteration and frame skipping
//! - Blocking ([`Writer`], [`Reader`]) and tokio ([`AsyncWriter`],
//!   [`AsyncReader`]) front ends over the same frame code
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_stream::{Compression, Reader, Writer};
//!
//! let mut writer = Writer::create("run42.tsra")?;
//! writer.set_compression(Compression::Zstd);
//! writer.push(&mut event)?;
//! writer.flush()?;
//!
//! let mut reader = Reader::open("run42.tsra")?;
//! for event in reader.scan_events() {
//!     let event = event?;
//!     println!("{event}");
//! }
//! ```

pub mod async_io;
pub mod compression;
pub mod config;
pub mod error;
pub mod frame;
pub mod reader;
pub mod writer;

// Re-exports
pub use async_io::{AsyncReader, AsyncWriter};
pub use compression::{Compression, CompressionLevels};
pub use config::{DEFAULT_MAX_FRAME_BYTES, ReaderConfig, WriterConfig};
pub use error::{StreamError, StreamResult};
pub use frame::{FRAME_MAGIC, FRAME_VERSION, FrameHeader, HEADER_LEN};
pub use reader::{Reader, ScanEvents};
pub use writer::Writer;
