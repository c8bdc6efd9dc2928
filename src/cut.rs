//! Cut-point search over a contiguous byte window.
//!
//! The search implements the FastCDC hash judgment with normalized chunking:
//! bytes below the minimum size are skipped outright, a stricter mask applies
//! while the candidate chunk is shorter than the normal size, and a looser
//! mask applies beyond it. The hash is seeded at zero for every chunk, which
//! keeps boundaries independent of one another and lets edited inputs
//! resynchronize after a bounded number of chunks.

use crate::config::ChunkerConfig;
use crate::gear::GEAR;

/// Nearest-integer base-2 logarithm.
pub(crate) fn logarithm2(value: u64) -> u32 {
    (value as f64).log2().round() as u32
}

/// Low-`bits` mask used for the hash judgment.
///
/// # Panics
///
/// Panics when `bits` is outside `[1, 31]`; masks that wide or narrow can
/// never come out of a validated configuration.
pub(crate) fn mask(bits: u32) -> u64 {
    if bits == 0 {
        panic!("bits too low");
    }
    if bits >= 32 {
        panic!("bits too high");
    }
    (1u64 << bits) - 1
}

/// Distance from the minimum size to the normal (mask-switch) size, clamped
/// to `source_size` so phase S can never scan past the end of a short window.
pub(crate) fn center_size(average: usize, minimum: usize, source_size: usize) -> usize {
    if average < minimum {
        return 0;
    }
    (average - minimum).min(source_size)
}

/// Returns the length of the next chunk within `window`, in `[1, window.len()]`.
///
/// A return value below `max_size` and below `window.len()` is a
/// content-defined cut. A return of exactly `max_size` is a cut forced by the
/// maximum-size cap. A return of `window.len()` with fewer than `max_size`
/// bytes means the window was exhausted without finding a cut; the caller
/// must refill and retry unless the window is the final tail of the stream.
pub(crate) fn cut_point(window: &[u8], config: &ChunkerConfig) -> usize {
    let n = window.len();
    if n <= config.min_size {
        return n;
    }
    let end = n.min(config.max_size);
    let normal = config.normal_size.min(end);

    let mut hash: u64 = 0;
    let mut index = config.min_size;
    // Harder to match below the normal size, discouraging short chunks.
    while index < normal {
        hash = (hash << 1).wrapping_add(GEAR[window[index] as usize]);
        if hash & config.mask_s == 0 {
            return index + 1;
        }
        index += 1;
    }
    // Easier to match beyond it, discouraging runs up to the hard cap.
    while index < end {
        hash = (hash << 1).wrapping_add(GEAR[window[index] as usize]);
        if hash & config.mask_l == 0 {
            return index + 1;
        }
        index += 1;
    }
    // No judgment matched; cut at the cap or hand back the whole window.
    end
}
