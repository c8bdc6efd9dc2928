//! Buffered chunking engine and mode controller.
//!
//! The engine owns a refill buffer of at least the maximum chunk size and
//! turns source reads into chunk callbacks. After every refill it runs the
//! cut-point search repeatedly, emitting each cut that is already
//! determinable and compacting the trailing remainder to the front of the
//! buffer. A cut is determinable once the search returns either a hard cut
//! at the maximum size or a position strictly inside the buffered window;
//! a search that merely exhausts a short window is retried after the next
//! refill. This rule is what makes stream-mode output byte-identical to
//! single-shot output for every way of slicing the input into feeds.

use std::io::Read;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::config::ChunkerConfig;
use crate::cut::cut_point;
use crate::{ChunkerError, Result};

/// Error type chunk callbacks may return; it aborts the surrounding call.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// A chunk handed to the callback.
///
/// `data` borrows the chunker's internal buffer and is only valid for the
/// duration of the callback invocation; copy it if it must be retained.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    /// Absolute byte offset of this chunk within the input stream.
    pub offset: u64,
    /// Chunk length in bytes; always equal to `data.len()`.
    pub length: u64,
    /// The chunk contents.
    pub data: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fresh,
    Split,
    Finalized,
}

/// Content-defined chunker over a pull-based byte source.
///
/// Built by [`ChunkerBuilder`](crate::ChunkerBuilder). In regular mode the
/// legal call sequence is one [`split`](Self::split) followed by one
/// [`finalize`](Self::finalize); in stream mode, any number of `split`
/// calls followed by one `finalize`. An instance is spent once `finalize`
/// returns.
pub struct Chunker {
    config: ChunkerConfig,
    cancel: CancellationToken,
    buf: Vec<u8>,
    buf_len: usize,
    offset: u64,
    stage: Stage,
}

impl Chunker {
    pub(crate) fn with_config(config: ChunkerConfig, cancel: CancellationToken) -> Self {
        let buf = vec![0u8; config.buffer_size];
        Self {
            config,
            cancel,
            buf,
            buf_len: 0,
            offset: 0,
            stage: Stage::Fresh,
        }
    }

    #[cfg(test)]
    pub(crate) fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Consumes `source` to its end, emitting every chunk whose boundary
    /// becomes determinable and retaining the trailing remainder for the
    /// next `split` or for [`finalize`](Self::finalize).
    ///
    /// A source read of `Ok(0)` is taken as end-of-data for this call, per
    /// the [`Read`] contract. An empty source is a valid no-op in stream
    /// mode. The callback must not retain the borrowed chunk view and must
    /// not reenter this chunker.
    ///
    /// # Panics
    ///
    /// Panics when called a second time in regular mode, where leftover
    /// buffered bytes would silently corrupt offsets against a fresh source.
    pub fn split<R, F>(&mut self, mut source: R, mut on_chunk: F) -> Result<()>
    where
        R: Read,
        F: FnMut(Chunk<'_>) -> std::result::Result<(), CallbackError>,
    {
        if !self.config.stream_mode && self.stage != Stage::Fresh {
            panic!("split must not be called multiple times in regular mode, use stream mode instead");
        }
        debug_assert!(self.stage != Stage::Finalized, "chunker already finalized");
        self.stage = Stage::Split;

        let capacity = self.buf.len();
        let mut eof = false;
        while !eof {
            while !eof && self.buf_len < capacity {
                let read = source
                    .read(&mut self.buf[self.buf_len..])
                    .map_err(ChunkerError::Source)?;
                if read == 0 {
                    eof = true;
                } else {
                    self.buf_len += read;
                }
            }
            if self.cancel.is_cancelled() {
                return Err(ChunkerError::Canceled);
            }
            self.drain(&mut on_chunk)?;
        }
        Ok(())
    }

    /// Emits the buffered remainder as the final chunk, if any, and spends
    /// the chunker.
    ///
    /// # Panics
    ///
    /// Panics when no `split` preceded it.
    pub fn finalize<F>(&mut self, mut on_chunk: F) -> Result<()>
    where
        F: FnMut(Chunk<'_>) -> std::result::Result<(), CallbackError>,
    {
        if self.stage == Stage::Fresh {
            panic!("finalize must succeed a split, call split first");
        }
        debug_assert!(self.stage != Stage::Finalized, "chunker already finalized");
        if self.cancel.is_cancelled() {
            return Err(ChunkerError::Canceled);
        }
        if self.buf_len > 0 {
            let tail = self.buf_len;
            self.emit(tail, &mut on_chunk)?;
        }
        self.stage = Stage::Finalized;
        Ok(())
    }

    /// Emits every cut that is determinable from the buffered bytes alone.
    fn drain<F>(&mut self, on_chunk: &mut F) -> Result<()>
    where
        F: FnMut(Chunk<'_>) -> std::result::Result<(), CallbackError>,
    {
        while self.buf_len > 0 {
            let cut = cut_point(&self.buf[..self.buf_len], &self.config);
            if cut >= self.config.max_size || cut < self.buf_len {
                self.emit(cut, on_chunk)?;
            } else {
                // The window ran out below the maximum size: the cut could
                // still move once more bytes arrive.
                break;
            }
        }
        Ok(())
    }

    fn emit<F>(&mut self, length: usize, on_chunk: &mut F) -> Result<()>
    where
        F: FnMut(Chunk<'_>) -> std::result::Result<(), CallbackError>,
    {
        if self.cancel.is_cancelled() {
            return Err(ChunkerError::Canceled);
        }
        trace!(offset = self.offset, length, "chunk");
        on_chunk(Chunk {
            offset: self.offset,
            length: length as u64,
            data: &self.buf[..length],
        })
        .map_err(ChunkerError::Callback)?;

        self.offset += length as u64;
        self.buf.copy_within(length..self.buf_len, 0);
        self.buf_len -= length;
        Ok(())
    }
}
