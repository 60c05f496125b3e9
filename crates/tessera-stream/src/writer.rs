//! Blocking stream writer

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::{debug, instrument, trace, warn};

use tessera_core::Event;

use crate::compression::Compression;
use crate::config::WriterConfig;
use crate::error::{StreamError, StreamResult};
use crate::frame::{FrameQueue, seal_frame};

/// Appends events to a byte sink, one frame per event
///
/// [`Writer::push`] only encodes and queues; nothing reaches the sink until
/// [`Writer::flush`]. A flush that fails keeps every byte the sink did not
/// accept, so calling it again continues exactly where the last attempt
/// stopped.
///
/// Dropping the writer flushes on a best-effort basis. Call
/// [`Writer::flush`] explicitly to observe the outcome.
pub struct Writer<W: Write> {
    sink: W,
    config: WriterConfig,
    queue: FrameQueue,
    frames_written: u64,
}

impl Writer<BufWriter<File>> {
    /// Create (or truncate) a file and write to it
    pub fn create(path: impl AsRef<Path>) -> StreamResult<Self> {
        let file = File::create(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Created stream file");
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> Writer<W> {
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
    ///
    /// Frames already queued keep the codec they were sealed with.
    pub fn set_compression(&mut self, compression: Compression) {
        self.config.compression = compression;
    }

    /// Codec applied to the next pushed event
    pub fn compression(&self) -> Compression {
        self.config.compression
    }

    /// Writer configuration
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Encode an event into a frame and queue it
    ///
    /// The event's decoded entries are flushed into its block first. On
    /// failure nothing is queued.
    #[instrument(skip_all, fields(codec = %self.config.compression, entries = event.len()))]
    pub fn push(&mut self, event: &mut Event) -> StreamResult<()> {
        let block = event.encode_block()?;
        let frame = seal_frame(
            &block,
            self.config.compression,
            self.config.levels,
            self.config.max_frame_bytes,
        )?;

        trace!(
            block_bytes = block.len(),
            frame_bytes = frame.len(),
            "Queued event frame"
        );
        self.queue.push(frame);
        Ok(())
    }

    /// Write every queued frame in order, then flush the sink
    #[instrument(skip_all, fields(pending = self.queue.len()))]
    pub fn flush(&mut self) -> StreamResult<()> {
        while let Some(head) = self.queue.head() {
            match self.sink.write(head) {
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
                        pending_bytes = self.queue.pending_bytes(),
                        "Sink write failed, keeping unwritten frames"
                    );
                    return Err(e.into());
                }
            }
        }

        self.sink.flush()?;
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

    /// Mutably borrow the sink
    ///
    /// Writing to it directly while frames are pending corrupts the stream.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }
}

impl<W: Write> Drop for Writer<W> {
    fn drop(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(
                error = %e,
                lost_frames = self.queue.len(),
                "Failed to flush stream on drop"
            );
        }
    }
}

impl<W: Write> std::fmt::Debug for Writer<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("compression", &self.config.compression)
            .field("pending_frames", &self.queue.len())
            .field("frames_written", &self.frames_written)
            .finish()
    }
}
