//! Content-defined chunking with the FastCDC algorithm.
//!
//! Partitions a byte stream into variable-size chunks whose boundaries are
//! derived from the content itself rather than from fixed offsets, so that
//! local edits shift only a bounded number of chunk boundaries. This is the
//! property deduplicating storage, backup, and sync systems rely on to keep
//! unchanged regions addressable across versions.
//!
//! # Design Rationale
//!
//! Fixed-size chunking causes insertion or deletion of data to shift all
//! subsequent chunk boundaries, invalidating downstream chunks for
//! deduplication. Content-defined boundaries localize changes: modifying one
//! region affects only adjacent chunks while preserving chunk identity
//! elsewhere. FastCDC finds those boundaries with a gear rolling hash,
//! sub-minimum cut-point skipping, and (optionally) normalized chunking,
//! which tightens the chunk-size distribution around the configured average.
//!
//! # Operating modes
//!
//! A [`Chunker`] runs in one of two modes with byte-identical output:
//!
//! - **Regular mode** (default): one [`Chunker::split`] call consumes the
//!   whole source, then [`Chunker::finalize`] flushes the trailing chunk.
//! - **Stream mode**: any number of `split` calls feed the input piece by
//!   piece; boundaries do not depend on how the input was sliced.
//!
//! Chunks are handed to a caller-supplied callback as borrowed [`Chunk`]
//! views into the internal buffer; copy the bytes if they must outlive the
//! callback.
//!
//! ```
//! use std::io::Cursor;
//! use streamcdc::{CancellationToken, ChunkerBuilder};
//!
//! # fn main() -> streamcdc::Result<()> {
//! let data = vec![0u8; 4096];
//! let mut chunker = ChunkerBuilder::new()
//!     .chunk_sizes(64, 256, 1024)
//!     .build(CancellationToken::new())?;
//!
//! let mut total = 0;
//! chunker.split(Cursor::new(&data), |chunk| {
//!     total += chunk.data.len();
//!     Ok(())
//! })?;
//! chunker.finalize(|chunk| {
//!     total += chunk.data.len();
//!     Ok(())
//! })?;
//! assert_eq!(total, data.len());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod chunker;
mod config;
mod cut;
mod gear;

pub use chunker::{CallbackError, Chunk, Chunker};
pub use config::ChunkerBuilder;
pub use tokio_util::sync::CancellationToken;

use thiserror::Error;

/// Smallest acceptable value for the minimum chunk size.
pub const MINIMUM_MIN: usize = 64;
/// Largest acceptable value for the minimum chunk size.
pub const MINIMUM_MAX: usize = 67_108_864;
/// Smallest acceptable value for the average chunk size.
pub const AVERAGE_MIN: usize = 256;
/// Largest acceptable value for the average chunk size.
pub const AVERAGE_MAX: usize = 268_435_456;
/// Smallest acceptable value for the maximum chunk size.
pub const MAXIMUM_MIN: usize = 1024;
/// Largest acceptable value for the maximum chunk size.
pub const MAXIMUM_MAX: usize = 1_073_741_824;

/// Errors from chunker construction and chunking operations.
#[derive(Debug, Error)]
pub enum ChunkerError {
    /// The (min, avg, max) size thresholds violate the configuration
    /// invariants: each must lie within its acceptable range, the average
    /// must sit strictly between minimum and maximum, and the cut points
    /// must be proportionally placed around the average.
    #[error("invalid chunks size point")]
    InvalidChunksSizePoint,

    /// The refill buffer is smaller than the maximum chunk size.
    #[error("invalid buffer length, must be at least the maximum chunk size")]
    InvalidBufferLength,

    /// The cancellation token was observed active.
    #[error("chunking canceled")]
    Canceled,

    /// Reading from the byte source failed.
    #[error("failed to read from source")]
    Source(#[source] std::io::Error),

    /// The chunk callback returned an error.
    #[error("chunk callback failed")]
    Callback(#[source] CallbackError),
}

/// Result type for chunker operations.
pub type Result<T> = std::result::Result<T, ChunkerError>;
