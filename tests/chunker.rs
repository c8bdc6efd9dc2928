//! Scenario tests for the chunking engine: reference vectors, mode
//! equivalence under arbitrary feed slicing, buffer-size independence, and
//! the universal chunking invariants.

use std::io::Cursor;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use streamcdc::{CancellationToken, Chunker, ChunkerBuilder};

/// Deterministic pseudo-random bytes (Knuth MMIX constants).
fn random_data(seed: u64, size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    let mut v = seed;
    for byte in &mut data {
        v = v.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        *byte = (v >> 33) as u8;
    }
    data
}

type Collected = (u64, u64, Vec<u8>);

fn collect_into(chunks: &mut Vec<Collected>) -> impl FnMut(streamcdc::Chunk<'_>) -> Result<(), streamcdc::CallbackError> + '_ {
    |chunk| {
        chunks.push((chunk.offset, chunk.length, chunk.data.to_vec()));
        Ok(())
    }
}

/// Single-shot run: one split over the whole input, then finalize.
fn run_regular(builder: ChunkerBuilder, data: &[u8]) -> Vec<Collected> {
    let mut chunker = builder.build(CancellationToken::new()).unwrap();
    let mut chunks = Vec::new();
    chunker.split(Cursor::new(data), collect_into(&mut chunks)).unwrap();
    chunker.finalize(collect_into(&mut chunks)).unwrap();
    chunks
}

/// Stream run: one pass over the feed pattern (zero-size entries become
/// empty sources), then the remaining input in pattern-sized pieces, then
/// finalize.
fn run_stream(builder: ChunkerBuilder, data: &[u8], feeds: &[usize]) -> Vec<Collected> {
    let mut chunker = builder.stream_mode().build(CancellationToken::new()).unwrap();
    let mut chunks = Vec::new();
    let mut pos = 0;
    for &size in feeds {
        let feed = size.min(data.len() - pos);
        chunker
            .split(Cursor::new(&data[pos..pos + feed]), collect_into(&mut chunks))
            .unwrap();
        pos += feed;
    }
    let step = feeds.iter().copied().max().unwrap_or(0).max(1);
    while pos < data.len() {
        let feed = step.min(data.len() - pos);
        chunker
            .split(Cursor::new(&data[pos..pos + feed]), collect_into(&mut chunks))
            .unwrap();
        pos += feed;
    }
    chunker.finalize(collect_into(&mut chunks)).unwrap();
    chunks
}

/// Asserts the universal invariants: coverage, contiguous offsets, length
/// consistency, and size bounds for every non-final chunk.
fn verify_chunks(data: &[u8], chunks: &[Collected], min_size: u64, max_size: u64) {
    let mut expected_offset = 0u64;
    let mut rebuilt = Vec::with_capacity(data.len());
    for (i, (offset, length, bytes)) in chunks.iter().enumerate() {
        assert_eq!(*offset, expected_offset, "chunk {i} offset");
        assert_eq!(*length, bytes.len() as u64, "chunk {i} length");
        if i + 1 != chunks.len() {
            assert!(
                (min_size..=max_size).contains(length),
                "chunk {i} length {length} outside [{min_size}, {max_size}]"
            );
        } else {
            assert!(*length <= max_size, "final chunk length {length} above {max_size}");
        }
        expected_offset += length;
        rebuilt.extend_from_slice(bytes);
    }
    assert_eq!(rebuilt, data, "concatenated chunks must reproduce the input");
}

#[test]
fn regular_and_stream_modes_agree() {
    let presets: [(fn(ChunkerBuilder) -> ChunkerBuilder, u64, u64); 3] = [
        (ChunkerBuilder::chunks_16k, 8192, 32768),
        (ChunkerBuilder::chunks_32k, 16384, 65536),
        (ChunkerBuilder::chunks_64k, 32768, 131072),
    ];
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for (preset, min_size, max_size) in presets {
        for adaptive in [false, true] {
            for _ in 0..8 {
                let size = rng.gen_range(1000..=1_500_000);
                let data = random_data(rng.gen(), size);
                let buffer = rng.gen_range(max_size as usize..=1 << 20);
                let feed = rng.gen_range(1000..=1 << 20);

                let mut builder = preset(ChunkerBuilder::new()).buffer_size(buffer);
                if adaptive {
                    builder = builder.adaptive_threshold();
                }

                let regular = run_regular(builder.clone(), &data);
                let stream = run_stream(builder, &data, &[feed]);

                verify_chunks(&data, &regular, min_size, max_size);
                assert_eq!(
                    regular, stream,
                    "regular/stream mismatch: size={size} buffer={buffer} feed={feed} adaptive={adaptive}"
                );
            }
        }
    }
}

#[test]
fn buffer_size_never_changes_chunks() {
    let data = random_data(7, 1 << 20);
    let reference = run_regular(
        ChunkerBuilder::new().chunks_16k().adaptive_threshold(),
        &data,
    );
    verify_chunks(&data, &reference, 8192, 32768);
    for buffer in [32768usize, 32769, 40000, 65536, 131072, 1 << 20] {
        let chunks = run_regular(
            ChunkerBuilder::new().chunks_16k().adaptive_threshold().buffer_size(buffer),
            &data,
        );
        assert_eq!(chunks, reference, "buffer={buffer}");
    }
}

#[test]
fn empty_feeds_are_noops() {
    let data = random_data(42, 500_000);
    let builder = ChunkerBuilder::new().chunks_16k().adaptive_threshold();
    let reference = run_regular(builder.clone(), &data);

    // Empty feeds interleaved with full-buffer feeds, as a flaky source
    // would produce them, must not alter any boundary.
    let stream = run_stream(builder, &data, &[0, 32768, 32768, 0, 0, 32768]);
    assert_eq!(stream, reference);
}

#[test]
fn minimal_size_point_covers_arbitrary_input() {
    let data = random_data(3, 300_000);
    let chunks = run_regular(
        ChunkerBuilder::new().chunk_sizes(64, 256, 1024).buffer_size(1024),
        &data,
    );
    verify_chunks(&data, &chunks, 64, 1024);
    assert!(chunks.len() > data.len() / 1024, "expected dense cutting");
}

#[test]
fn input_below_minimum_is_a_single_chunk() {
    // Thresholds so large the whole input sits below the minimum size: the
    // split buffers everything and finalize emits one chunk.
    let data = random_data(11, 300_000);
    let chunks = run_regular(
        ChunkerBuilder::new().chunk_sizes(1_048_576, 4_194_304, 16_777_216),
        &data,
    );
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].0, 0);
    assert_eq!(chunks[0].1, data.len() as u64);
    assert_eq!(chunks[0].2, data);
}

#[test]
fn stream_split_may_emit_zero_chunks() {
    let data = random_data(5, 2000);
    let mut chunker = ChunkerBuilder::new()
        .chunks_16k()
        .stream_mode()
        .build(CancellationToken::new())
        .unwrap();
    let mut count = 0;
    chunker
        .split(Cursor::new(&data), |_| {
            count += 1;
            Ok(())
        })
        .unwrap();
    assert_eq!(count, 0, "a short feed emits nothing until finalize");
    chunker
        .finalize(|chunk| {
            count += 1;
            assert_eq!(chunk.length, 2000);
            Ok(())
        })
        .unwrap();
    assert_eq!(count, 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Mode equivalence and coverage over arbitrary data and feed slicings,
    /// including pathological one-byte feeds.
    #[test]
    fn stream_slicing_never_changes_boundaries(
        data in proptest::collection::vec(any::<u8>(), 0..16384),
        feeds in proptest::collection::vec(0usize..2048, 1..8),
    ) {
        let builder = ChunkerBuilder::new().chunk_sizes(64, 256, 1024);
        let regular = run_regular(builder.clone(), &data);
        let stream = run_stream(builder, &data, &feeds);
        prop_assert_eq!(&regular, &stream);

        let mut expected_offset = 0u64;
        let mut rebuilt = Vec::with_capacity(data.len());
        for (offset, length, bytes) in &regular {
            prop_assert_eq!(*offset, expected_offset);
            prop_assert_eq!(*length as usize, bytes.len());
            rebuilt.extend_from_slice(bytes);
            expected_offset += length;
        }
        prop_assert_eq!(rebuilt, data);
    }
}

// ---------------------------------------------------------------------------
// Reference vectors for the SekienAkashita.jpg fixture (109,466 bytes). The
// binary image is not checked in; these tests skip when it is absent.
// ---------------------------------------------------------------------------

fn sekien() -> Option<Vec<u8>> {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/SekienAkashita.jpg");
    match std::fs::read(path) {
        Ok(data) if data.len() == 109_466 => Some(data),
        _ => {
            eprintln!("SekienAkashita.jpg fixture not present, skipping");
            None
        }
    }
}

fn assert_vector(chunks: &[Collected], want: &[(u64, u64)]) {
    let got: Vec<(u64, u64)> = chunks.iter().map(|(o, l, _)| (*o, *l)).collect();
    assert_eq!(got, want);
}

#[test]
fn sekien_32k_reference_chunks() {
    let Some(data) = sekien() else { return };
    let builder = ChunkerBuilder::new().chunks_32k().adaptive_threshold().buffer_size(65536);
    let want = [(0, 32857), (32857, 16408), (49265, 60201)];
    assert_vector(&run_regular(builder.clone(), &data), &want);
    assert_vector(&run_stream(builder, &data, &[65536]), &want);
}

#[test]
fn sekien_16k_reference_chunks() {
    let Some(data) = sekien() else { return };
    let builder = ChunkerBuilder::new().chunks_16k().adaptive_threshold().buffer_size(32768);
    let want = [
        (0, 22366),
        (22366, 8282),
        (30648, 16303),
        (46951, 18696),
        (65647, 32768),
        (98415, 11051),
    ];
    assert_vector(&run_regular(builder.clone(), &data), &want);
    assert_vector(&run_stream(builder.clone(), &data, &[32768]), &want);

    // Interleaved empty feeds must not move any boundary.
    let stream = run_stream(builder, &data, &[0, 32768, 32768, 0, 0, 32768]);
    assert_vector(&stream, &want);
}

#[test]
fn sekien_16k_without_adaptive_threshold() {
    let Some(data) = sekien() else { return };
    // The single-mask legacy judgment yields different cut points; on-disk
    // chunk catalogs may depend on them.
    let builder = ChunkerBuilder::new().chunks_16k().buffer_size(32768);
    let want = [
        (0, 22366),
        (22366, 10491),
        (32857, 17860),
        (50717, 32768),
        (83485, 25981),
    ];
    assert_vector(&run_regular(builder.clone(), &data), &want);
    assert_vector(&run_stream(builder, &data, &[32768]), &want);
}

#[test]
fn sekien_64k_reference_chunks() {
    let Some(data) = sekien() else { return };
    let builder = ChunkerBuilder::new().chunks_64k().adaptive_threshold().buffer_size(131072);
    let want = [(0, 32857), (32857, 76609)];
    assert_vector(&run_regular(builder.clone(), &data), &want);
    assert_vector(&run_stream(builder, &data, &[131072]), &want);
}

#[test]
fn sekien_reference_chunks_are_buffer_size_independent() {
    let Some(data) = sekien() else { return };
    let mut rng = StdRng::seed_from_u64(0xbadc0de);
    let reference = run_regular(
        ChunkerBuilder::new().chunks_32k().adaptive_threshold(),
        &data,
    );
    for _ in 0..16 {
        let buffer = rng.gen_range(65536..=1 << 20);
        let feed = rng.gen_range(1000..=1 << 20);
        let builder = ChunkerBuilder::new().chunks_32k().adaptive_threshold().buffer_size(buffer);
        assert_eq!(run_regular(builder.clone(), &data), reference, "buffer={buffer}");
        assert_eq!(run_stream(builder, &data, &[feed]), reference, "feed={feed}");
    }
}

#[test]
#[should_panic(expected = "split must not be called multiple times in regular mode, use stream mode instead")]
fn regular_mode_rejects_repeated_split() {
    let data = random_data(9, 100_000);
    let mut chunker: Chunker = ChunkerBuilder::new().build(CancellationToken::new()).unwrap();
    chunker.split(Cursor::new(&data), |_| Ok(())).unwrap();
    let _ = chunker.split(Cursor::new(&data), |_| Ok(()));
}
