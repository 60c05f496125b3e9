//! Blocking stream reader

use std::fs::File;
use std::io::{BufReader, Read};
use std::iter::FusedIterator;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument, trace, warn};

use tessera_core::{Event, PayloadRegistry};

use crate::config::ReaderConfig;
use crate::error::{StreamError, StreamResult};
use crate::frame::{FrameHeader, open_frame, read_body, read_header, skip_body};

/// Reads events back from a byte source, one frame at a time
///
/// Every event yielded is independent: it owns its block and starts with
/// empty caches. Entries decode lazily through the reader's payload
/// registry.
pub struct Reader<R: Read> {
    source: R,
    registry: Arc<PayloadRegistry>,
    config: ReaderConfig,
    /// Frames consumed, whether decoded or skipped
    frames_consumed: u64,
    /// Set by the first error; the source position is unknown after it
    failed: bool,
}

impl Reader<BufReader<File>> {
    /// Open a stream file
    pub fn open(path: impl AsRef<Path>) -> StreamResult<Self> {
        let file = File::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Opened stream file");
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> Reader<R> {
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

    /// Read the next event
    ///
    /// Returns `Ok(None)` when the source ends cleanly between frames. Any
    /// other shortfall is reported as [`StreamError::StreamCorrupt`].
    ///
    /// The first error is terminal: afterwards the reader behaves as if the
    /// stream had ended.
    pub fn next_event(&mut self) -> StreamResult<Option<Event>> {
        if self.failed {
            return Ok(None);
        }
        let result = self.read_next();
        self.note_failure(&result);
        result
    }

    /// Iterate over the remaining events
    ///
    /// The iterator pulls one frame per step and ends after the first error.
    pub fn scan_events(&mut self) -> ScanEvents<'_, R> {
        ScanEvents {
            reader: self,
            done: false,
        }
    }

    /// Move past up to `n` frames without decompressing them
    ///
    /// Returns the number of frames actually skipped, which is less than `n`
    /// only when the stream ends first.
    #[instrument(skip(self))]
    pub fn skip(&mut self, n: usize) -> StreamResult<usize> {
        if self.failed {
            return Ok(0);
        }
        let result = self.skip_frames(n);
        self.note_failure(&result);
        result
    }

    /// Whether an earlier error stopped this reader
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    fn skip_frames(&mut self, n: usize) -> StreamResult<usize> {
        let mut skipped = 0;
        while skipped < n {
            let Some(header) = self.next_header()? else {
                break;
            };
            skip_body(&mut self.source, &header)?;
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

    /// Payload registry handed to every event
    pub fn registry(&self) -> &Arc<PayloadRegistry> {
        &self.registry
    }

    /// Borrow the source
    pub fn get_ref(&self) -> &R {
        &self.source
    }

    /// Give back the source, positioned after the last consumed frame
    pub fn into_inner(self) -> R {
        self.source
    }

    fn read_next(&mut self) -> StreamResult<Option<Event>> {
        let Some(header) = self.next_header()? else {
            return Ok(None);
        };
        let event = self.read_event(&header)?;
        self.frames_consumed += 1;
        Ok(Some(event))
    }

    fn note_failure<T>(&mut self, result: &StreamResult<T>) {
        if let Err(e) = result {
            warn!(frame = self.frames_consumed, error = %e, "Failed to read frame, stopping");
            self.failed = true;
        }
    }

    fn next_header(&mut self) -> StreamResult<Option<FrameHeader>> {
        let Some(header) = read_header(&mut self.source)? else {
            trace!(frames = self.frames_consumed, "End of stream");
            return Ok(None);
        };
        header.check_size(self.config.max_frame_bytes)?;
        Ok(Some(header))
    }

    fn read_event(&mut self, header: &FrameHeader) -> StreamResult<Event> {
        let body = read_body(&mut self.source, header)?;
        let block = open_frame(header, &body, self.config.verify_checksums)?;
        trace!(
            codec = header.codec_id,
            compressed = body.len(),
            uncompressed = block.len(),
            "Read frame"
        );
        Event::decode_block(&block, Arc::clone(&self.registry))
            .map_err(|e| StreamError::MalformedFrame(e.to_string()))
    }
}

impl<R: Read> std::fmt::Debug for Reader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("config", &self.config)
            .field("frames_consumed", &self.frames_consumed)
            .field("failed", &self.failed)
            .finish()
    }
}

/// Pull-based iterator over the events of a [`Reader`]
///
/// Created by [`Reader::scan_events`]. Dropping it before the end leaves the
/// reader positioned after the last yielded frame.
pub struct ScanEvents<'a, R: Read> {
    reader: &'a mut Reader<R>,
    done: bool,
}

impl<R: Read> Iterator for ScanEvents<'_, R> {
    type Item = StreamResult<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_event() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read> FusedIterator for ScanEvents<'_, R> {}
