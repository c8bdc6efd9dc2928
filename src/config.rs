//! Chunker configuration and construction.
//!
//! Construction goes through [`ChunkerBuilder`], which carries the closed set
//! of recognized options. Size thresholds are validated once and the two hash
//! judgment masks plus the normal (mask-switch) size are derived up front, so
//! the hot path never recomputes them.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::chunker::Chunker;
use crate::cut::{center_size, logarithm2, mask};
use crate::{
    ChunkerError, Result, AVERAGE_MAX, AVERAGE_MIN, MAXIMUM_MAX, MAXIMUM_MIN, MINIMUM_MAX,
    MINIMUM_MIN,
};

/// Validated, fully derived chunking parameters. Immutable after build.
#[derive(Debug, Clone)]
pub(crate) struct ChunkerConfig {
    pub(crate) min_size: usize,
    pub(crate) avg_size: usize,
    pub(crate) max_size: usize,
    pub(crate) buffer_size: usize,
    pub(crate) stream_mode: bool,
    pub(crate) adaptive_threshold: bool,
    pub(crate) mask_s: u64,
    pub(crate) mask_l: u64,
    pub(crate) normal_size: usize,
}

/// Builder for a [`Chunker`].
///
/// Without any size option the 32k preset applies. The refill buffer defaults
/// to the maximum chunk size, which is also its lower bound: a full
/// maximum-sized chunk must always fit, otherwise the engine could be forced
/// to emit a short non-final chunk.
///
/// ```
/// use streamcdc::{CancellationToken, ChunkerBuilder};
///
/// let chunker = ChunkerBuilder::new()
///     .chunks_16k()
///     .stream_mode()
///     .build(CancellationToken::new());
/// assert!(chunker.is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ChunkerBuilder {
    min_size: usize,
    avg_size: usize,
    max_size: usize,
    buffer_size: Option<usize>,
    stream_mode: bool,
    adaptive_threshold: bool,
}

impl Default for ChunkerBuilder {
    fn default() -> Self {
        Self {
            min_size: 16384,
            avg_size: 32768,
            max_size: 65536,
            buffer_size: None,
            stream_mode: false,
            adaptive_threshold: false,
        }
    }
}

impl ChunkerBuilder {
    /// Creates a builder with the default (32k preset) configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets explicit minimum, average, and maximum chunk sizes in bytes.
    ///
    /// Validated at [`build`](Self::build): each threshold must lie within
    /// its acceptable range, `min < avg < max` must hold, the minimum must
    /// sit in the lower half of the average, and the average-to-maximum
    /// distance must be at least the minimum-to-average distance.
    pub fn chunk_sizes(mut self, min_size: usize, avg_size: usize, max_size: usize) -> Self {
        self.min_size = min_size;
        self.avg_size = avg_size;
        self.max_size = max_size;
        self
    }

    /// Preset for chunks of 16 KiB average size: (8192, 16384, 32768).
    pub fn chunks_16k(self) -> Self {
        self.chunk_sizes(8192, 16384, 32768)
    }

    /// Preset for chunks of 32 KiB average size: (16384, 32768, 65536).
    pub fn chunks_32k(self) -> Self {
        self.chunk_sizes(16384, 32768, 65536)
    }

    /// Preset for chunks of 64 KiB average size: (32768, 65536, 131072).
    pub fn chunks_64k(self) -> Self {
        self.chunk_sizes(32768, 65536, 131072)
    }

    /// Sets the refill-buffer capacity in bytes. Must be at least the
    /// maximum chunk size. Defaults to the maximum chunk size.
    ///
    /// The buffer size never changes which chunks come out, only how often
    /// the source is read.
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Enables stream mode, allowing [`Chunker::split`] to be called once
    /// per input piece instead of once for the whole input.
    pub fn stream_mode(mut self) -> Self {
        self.stream_mode = true;
        self
    }

    /// Enables the adaptive threshold (normalized chunking): a stricter mask
    /// below the average size and a looser one above it, tightening the
    /// chunk-size distribution around the average. Off by default; toggling
    /// it changes every content-defined cut point.
    pub fn adaptive_threshold(mut self) -> Self {
        self.adaptive_threshold = true;
        self
    }

    /// Validates the configuration and returns a ready [`Chunker`].
    ///
    /// The cancellation token is observed after every buffer refill and
    /// before every chunk callback; canceling it makes the current and all
    /// subsequent operations return [`ChunkerError::Canceled`].
    pub fn build(self, cancel: CancellationToken) -> Result<Chunker> {
        let (min_size, avg_size, max_size) = (self.min_size, self.avg_size, self.max_size);
        if !(MINIMUM_MIN..=MINIMUM_MAX).contains(&min_size)
            || !(AVERAGE_MIN..=AVERAGE_MAX).contains(&avg_size)
            || !(MAXIMUM_MIN..=MAXIMUM_MAX).contains(&max_size)
            || min_size >= avg_size
            || avg_size >= max_size
            || max_size - avg_size < avg_size - min_size
            || min_size + avg_size.div_ceil(2) > avg_size
        {
            return Err(ChunkerError::InvalidChunksSizePoint);
        }

        let buffer_size = self.buffer_size.unwrap_or(max_size);
        if buffer_size < max_size {
            return Err(ChunkerError::InvalidBufferLength);
        }

        let bits = logarithm2(avg_size as u64);
        let (mask_s, mask_l) = if self.adaptive_threshold {
            (mask(bits + 1), mask(bits - 1))
        } else {
            (mask(bits), mask(bits))
        };
        let normal_size = (min_size + center_size(avg_size, min_size, max_size)).min(max_size);

        let config = ChunkerConfig {
            min_size,
            avg_size,
            max_size,
            buffer_size,
            stream_mode: self.stream_mode,
            adaptive_threshold: self.adaptive_threshold,
            mask_s,
            mask_l,
            normal_size,
        };
        debug!(
            min_size = config.min_size,
            avg_size = config.avg_size,
            max_size = config.max_size,
            buffer_size = config.buffer_size,
            stream_mode = config.stream_mode,
            adaptive_threshold = config.adaptive_threshold,
            "chunker configured"
        );

        Ok(Chunker::with_config(config, cancel))
    }
}
