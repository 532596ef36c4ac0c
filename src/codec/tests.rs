use proptest::prelude::*;

use super::lzf;
use super::*;

fn densify(pairs: &[(i32, i32)], len: usize) -> Vec<i32> {
    let mut dense = vec![0; len];
    for &(bin, intensity) in pairs {
        dense[bin as usize] = intensity;
    }
    dense
}

#[test]
fn encode_known_vector() {
    let (blob, totals) = encode_scan(&[0, 0, 5, 0, 0, 0, 7, 0, 2]).unwrap();
    assert!(!blob.is_empty());
    assert_eq!(totals.tic, 14);
    assert_eq!(totals.bpi, 7);
    assert_eq!(totals.bpi_bin, 6);
    assert_eq!(totals.non_zero_count, 3);
}

#[test]
fn decode_known_vector() {
    let (blob, _) = encode_scan(&[0, 0, 5, 0, 0, 0, 7, 0, 2]).unwrap();
    let pairs = decode_scan(&blob).unwrap();
    assert_eq!(pairs, vec![(2, 5), (6, 7), (8, 2)]);
}

#[test]
fn all_zero_scan_encodes_empty() {
    let (blob, totals) = encode_scan(&[0; 64]).unwrap();
    assert!(blob.is_empty());
    assert_eq!(totals, ScanTotals::default());
    assert!(decode_scan(&blob).unwrap().is_empty());
}

#[test]
fn negative_intensity_rejected() {
    let err = encode_scan(&[0, 3, -1]).unwrap_err();
    assert!(matches!(
        err,
        CodecError::InvalidIntensity { bin: 2, value: -1 }
    ));
}

#[test]
fn first_bin_zero_has_no_leading_skip() {
    let (blob, _) = encode_scan(&[9, 0, 0, 1]).unwrap();
    let pairs = decode_scan(&blob).unwrap();
    assert_eq!(pairs, vec![(0, 9), (3, 1)]);
}

#[test]
fn sparse_matches_dense_with_unit_offset() {
    let pairs = [(2, 5), (6, 7), (8, 2)];
    let (sparse_blob, sparse_totals) = encode_scan_sparse(&pairs, 1).unwrap();
    let (dense_blob, dense_totals) = encode_scan(&densify(&pairs, 9)).unwrap();
    assert_eq!(sparse_blob, dense_blob);
    assert_eq!(sparse_totals, dense_totals);
}

#[test]
fn sparse_zero_offset_shifts_leading_skip() {
    // The historical leading-skip formula drops one bin when the producer
    // recorded no time offset; everything after the first entry is aligned.
    let (blob, _) = encode_scan_sparse(&[(2, 5), (6, 7)], 0).unwrap();
    let pairs = decode_scan(&blob).unwrap();
    assert_eq!(pairs, vec![(1, 5), (5, 7)]);
}

#[test]
fn sparse_skips_zero_intensities() {
    let (blob, totals) = encode_scan_sparse(&[(1, 0), (4, 6)], 1).unwrap();
    assert_eq!(totals.non_zero_count, 1);
    assert_eq!(decode_scan(&blob).unwrap(), vec![(4, 6)]);
}

#[test]
fn lzf_round_trips_repetitive_payload() {
    let mut data = Vec::new();
    for i in 0..400u32 {
        data.extend_from_slice(&(i % 7).to_le_bytes());
    }
    let compressed = lzf::compress(&data);
    assert!(compressed.len() < data.len());
    assert_eq!(lzf::decompress(&compressed).unwrap(), data);
}

#[test]
fn lzf_round_trips_incompressible_payload() {
    // Pseudo-random bytes defeat the matcher; literal runs must still
    // reproduce the input exactly.
    let mut state = 0x2545_f491u32;
    let data: Vec<u8> = (0..1000)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        })
        .collect();
    let compressed = lzf::compress(&data);
    assert_eq!(lzf::decompress(&compressed).unwrap(), data);
}

#[test]
fn lzf_output_is_deterministic() {
    let data: Vec<u8> = (0..2048).map(|i| (i % 251) as u8).collect();
    assert_eq!(lzf::compress(&data), lzf::compress(&data));
}

#[test]
fn lzf_rejects_truncated_stream() {
    let data = vec![7u8; 256];
    let mut compressed = lzf::compress(&data);
    compressed.truncate(compressed.len() - 3);
    assert!(lzf::decompress(&compressed).is_err());
}

#[test]
fn lzf_rejects_bad_back_reference() {
    // Length prefix of 8, then a back-reference before any output exists.
    let blob = vec![8, 0, 0, 0, 0b0010_0000, 0x05];
    assert!(matches!(
        lzf::decompress(&blob),
        Err(CodecError::BadBackReference { .. })
    ));
}

proptest! {
    #[test]
    fn round_trip_identity(dense in prop::collection::vec(0i32..50_000, 0..600)) {
        let (blob, _) = encode_scan(&dense).unwrap();
        let decoded = decode_scan(&blob).unwrap();
        let expected: Vec<(i32, i32)> = dense
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > 0)
            .map(|(bin, &v)| (bin as i32, v))
            .collect();
        prop_assert_eq!(decoded, expected);
    }

    #[test]
    fn derived_totals_match(dense in prop::collection::vec(0i32..50_000, 1..600)) {
        let (_, totals) = encode_scan(&dense).unwrap();
        let tic: i64 = dense.iter().map(|&v| v as i64).sum();
        let bpi = dense.iter().copied().max().unwrap_or(0);
        prop_assert_eq!(totals.tic, tic);
        prop_assert_eq!(totals.bpi, bpi);
        if bpi > 0 {
            prop_assert_eq!(dense[totals.bpi_bin as usize], bpi);
        }
        prop_assert_eq!(
            totals.non_zero_count as usize,
            dense.iter().filter(|&&v| v > 0).count()
        );
    }

    #[test]
    fn lzf_round_trip(data in prop::collection::vec(any::<u8>(), 0..4096)) {
        let compressed = lzf::compress(&data);
        prop_assert_eq!(lzf::decompress(&compressed).unwrap(), data);
    }
}
