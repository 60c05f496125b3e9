//! Async stream writer and reader
//!
//! Same frames, same failure semantics as [`crate::Writer`] and
//! [`crate::Reader`], over tokio's [`AsyncWrite`] and [`AsyncRead`].

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument, trace, warn};

use tessera_core::{Event, PayloadRegistry};

use crate::compression::Compression;
use crate::config::{ReaderConfig, WriterConfig};
use crate::error::{StreamError, StreamResult};
use crate::frame::{FrameHeader, FrameQueue, HEADER_LEN, open_frame, seal_frame, truncated_body};

/// Async counterpart of [`crate::Writer`]
///
/// There is no flush on drop: call [`AsyncWriter::flush`] before letting
/// go of the writer, or frames still queued are lost.
pub struct AsyncWriter<W: AsyncWrite + Unpin> {
    sink: W,
    config: WriterConfig,
    queue: FrameQueue,
    frames_written: u64,
}

impl<W: AsyncWrite + Unpin> AsyncWriter<W> {
    /// Create a writer with the default configuration (LZ4)
    pub fn new(sink: W) -> Self {
        Self::with_config(sink, WriterConfig::default())
    }

    /// Create a writer with a custom configuration
    pub fn with_config(sink: W, config: WriterConfig) -> Self {
        Self {
            sink,
            config,
            queue: FrameQueue::default(),
            frames_written: 0,
        }
    }

    /// Change the codec for subsequently pushed events
    pub fn set_compression(&mut self, compression: Compression) {
        self.config.compression = compression;
    }

    /// Codec applied to the next pushed event
    pub fn compression(&self) -> Compression {
        self.config.compression
    }

    /// Encode an event into a frame and queue it
    #[instrument(skip_all, fields(codec = %self.config.compression, entries = event.len()))]
    pub fn push(&mut self, event: &mut Event) -> StreamResult<()> {
        let block = event.encode_block()?;
        let frame = seal_frame(
            &block,
            self.config.compression,
            self.config.levels,
            self.config.max_frame_bytes,
        )?;
        trace!(frame_bytes = frame.len(), "Queued event frame");
        self.queue.push(frame);
        Ok(())
    }

    /// Write every queued frame in order, then flush the sink
    ///
    /// On failure the unwritten bytes stay queued for the next call.
    pub async fn flush(&mut self) -> StreamResult<()> {
        while let Some(head) = self.queue.head() {
            match self.sink.write(head).await {
                Ok(0) => {
                    return Err(StreamError::Io(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "sink accepted no bytes",
                    )));
                }
                Ok(n) => {
                    if self.queue.advance(n) {
                        self.frames_written += 1;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(
                        error = %e,
                        pending_frames = self.queue.len(),
                        "Sink write failed, keeping unwritten frames"
                    );
                    return Err(e.into());
                }
            }
        }

        self.sink.flush().await?;
        debug!(frames_written = self.frames_written, "Flushed stream");
        Ok(())
    }

    /// Frames queued but not completely written
    pub fn pending_frames(&self) -> usize {
        self.queue.len()
    }

    /// Bytes queued but not yet accepted by the sink
    pub fn pending_bytes(&self) -> usize {
        self.queue.pending_bytes()
    }

    /// Frames completely handed to the sink so far
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Borrow the sink
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Give back the sink, discarding anything still queued
    pub fn into_inner(self) -> W {
        if !self.queue.is_empty() {
            warn!(
                lost_frames = self.queue.len(),
                "Async writer released with unflushed frames"
            );
        }
        self.sink
    }
}

/// Async counterpart of [`crate::Reader`]
pub struct AsyncReader<R: AsyncRead + Unpin> {
    source: R,
    registry: Arc<PayloadRegistry>,
    config: ReaderConfig,
    frames_consumed: u64,
    failed: bool,
}

impl<R: AsyncRead + Unpin> AsyncReader<R> {
    /// Create a reader decoding through the global payload registry
    pub fn new(source: R) -> Self {
        Self::with_registry(source, PayloadRegistry::global())
    }

    /// Create a reader decoding through a specific payload registry
    pub fn with_registry(source: R, registry: Arc<PayloadRegistry>) -> Self {
        Self::with_config(source, registry, ReaderConfig::default())
    }

    /// Create a reader with a custom registry and configuration
    pub fn with_config(source: R, registry: Arc<PayloadRegistry>, config: ReaderConfig) -> Self {
        Self {
            source,
            registry,
            config,
            frames_consumed: 0,
            failed: false,
        }
    }

    /// Read the next event; `Ok(None)` on a clean end of stream
    ///
    /// As with [`crate::Reader`], the first error is terminal.
    pub async fn next_event(&mut self) -> StreamResult<Option<Event>> {
        if self.failed {
            return Ok(None);
        }
        let result = self.read_next().await;
        self.note_failure(&result);
        result
    }

    /// Move past up to `n` frames without decompressing them
    pub async fn skip(&mut self, n: usize) -> StreamResult<usize> {
        if self.failed {
            return Ok(0);
        }
        let result = self.skip_frames(n).await;
        self.note_failure(&result);
        result
    }

    /// Whether an earlier error stopped this reader
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    async fn read_next(&mut self) -> StreamResult<Option<Event>> {
        let Some(header) = self.next_header().await? else {
            return Ok(None);
        };
        let event = self.read_event(&header).await?;
        self.frames_consumed += 1;
        Ok(Some(event))
    }

    fn note_failure<T>(&mut self, result: &StreamResult<T>) {
        if let Err(e) = result {
            warn!(frame = self.frames_consumed, error = %e, "Failed to read frame, stopping");
            self.failed = true;
        }
    }

    async fn skip_frames(&mut self, n: usize) -> StreamResult<usize> {
        let mut skipped = 0;
        while skipped < n {
            let Some(header) = self.next_header().await? else {
                break;
            };
            let len = header.compressed_len as u64;
            let copied =
                tokio::io::copy(&mut (&mut self.source).take(len), &mut tokio::io::sink()).await?;
            if copied != len {
                return Err(truncated_body(copied as usize, len as usize));
            }
            self.frames_consumed += 1;
            skipped += 1;
        }
        debug!(skipped, "Skipped frames");
        Ok(skipped)
    }

    /// Frames consumed so far, read or skipped
    pub fn events_read(&self) -> u64 {
        self.frames_consumed
    }

    /// Give back the source, positioned after the last consumed frame
    pub fn into_inner(self) -> R {
        self.source
    }

    async fn next_header(&mut self) -> StreamResult<Option<FrameHeader>> {
        let mut buf = [0u8; HEADER_LEN];
        let mut filled = 0usize;
        while filled < HEADER_LEN {
            match self.source.read(&mut buf[filled..]).await {
                Ok(0) if filled == 0 => {
                    trace!(frames = self.frames_consumed, "End of stream");
                    return Ok(None);
                }
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

        let header = FrameHeader::from_bytes(&buf)?;
        header.check_size(self.config.max_frame_bytes)?;
        Ok(Some(header))
    }

    async fn read_event(&mut self, header: &FrameHeader) -> StreamResult<Event> {
        let len = header.compressed_len as usize;
        let mut body = Vec::with_capacity(len);
        (&mut self.source)
            .take(len as u64)
            .read_to_end(&mut body)
            .await?;
        if body.len() != len {
            return Err(truncated_body(body.len(), len));
        }

        let block = open_frame(header, &body, self.config.verify_checksums)?;
        Event::decode_block(&block, Arc::clone(&self.registry))
            .map_err(|e| StreamError::MalformedFrame(e.to_string()))
    }
}
