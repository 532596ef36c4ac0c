use tempfile::{tempdir, TempDir};

use super::*;
use crate::params::{FrameParams, FrameType, GlobalParams};
use crate::writer::UimfWriter;

/// Two MS1 frames and one MS2 frame, 4 scans of 16 bins each.
fn two_frame_file() -> (TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reader.uimf");

    let mut global = GlobalParams::new();
    global.bins = 16;
    global.bin_width_ns = 1.0;

    let mut writer = UimfWriter::create(&path, &global).unwrap();

    let mut ms1 = FrameParams::new(FrameType::Ms1);
    ms1.scans = 4;
    ms1.calibration_slope = 0.5;
    ms1.average_tof_length = 100_000.0;
    ms1.pressure_back = 4.0;
    ms1.pressure_units = Some(crate::params::PressureUnits::Torr);

    writer.insert_frame(1, &ms1).unwrap();
    writer.insert_frame(2, &ms1).unwrap();
    let mut ms2 = ms1.clone();
    ms2.frame_type = FrameType::Ms2;
    writer.insert_frame(3, &ms2).unwrap();

    // frame 1: scan 0 has bins 2 and 6; scan 1 has bin 2.
    writer
        .insert_scan(1, 0, &[0, 0, 5, 0, 0, 0, 7, 0, 0, 0, 0, 0, 0, 0, 0, 0])
        .unwrap();
    writer
        .insert_scan(1, 1, &[0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0])
        .unwrap();
    // frame 2: scan 0 has bin 2.
    writer
        .insert_scan(2, 0, &[0, 0, 11, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0])
        .unwrap();
    // frame 3 (MS2): scan 0 has bin 2; must stay out of MS1 queries.
    writer
        .insert_scan(3, 0, &[0, 0, 1000, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0])
        .unwrap();
    writer.close().unwrap();

    (dir, path)
}

#[test]
fn frame_out_of_range_is_rejected() {
    let (_dir, path) = two_frame_file();
    let mut reader = UimfReader::open(&path).unwrap();

    assert!(matches!(
        reader.get_frame_params(0),
        Err(UimfError::FrameOutOfRange { frame: 0, .. })
    ));
    assert!(matches!(
        reader.get_frame_params(99),
        Err(UimfError::FrameOutOfRange { frame: 99, .. })
    ));
}

#[test]
fn frame_params_are_cached() {
    let (_dir, path) = two_frame_file();
    let mut reader = UimfReader::open(&path).unwrap();

    let first = reader.get_frame_params(1).unwrap().clone();
    let second = reader.get_frame_params(1).unwrap().clone();
    assert_eq!(first, second);
    assert!(reader.frame_cache.contains_key(&1));
}

#[test]
fn frame_numbers_split_by_type() {
    let (_dir, path) = two_frame_file();
    let mut reader = UimfReader::open(&path).unwrap();

    assert_eq!(reader.frame_numbers(FrameType::Ms1).unwrap(), vec![1, 2]);
    assert_eq!(reader.frame_numbers(FrameType::Ms2).unwrap(), vec![3]);
    assert!(reader.frame_numbers(FrameType::Calibration).unwrap().is_empty());
}

#[test]
fn frame_scans_report_totals_and_drift_times() {
    let (_dir, path) = two_frame_file();
    let mut reader = UimfReader::open(&path).unwrap();

    let scans = reader.get_frame_scans(1).unwrap();
    assert_eq!(scans.len(), 2);
    assert_eq!(scans[0].scan, 0);
    assert_eq!(scans[0].non_zero_count, 2);
    assert_eq!(scans[0].bpi, 7.0);
    assert_eq!(scans[0].tic, 12.0);

    // scan 1: raw drift = 100000 ns * 1 / 1e6 = 0.1 ms; 4.0 torr back
    // pressure makes the normalized value equal the raw one.
    assert!((scans[1].drift_time_raw - 0.1).abs() < 1e-12);
    assert!((scans[1].drift_time - 0.1).abs() < 1e-12);
}

#[test]
fn spectrum_sums_frames_and_scans() {
    let (_dir, path) = two_frame_file();
    let mut reader = UimfReader::open(&path).unwrap();

    let (mzs, intensities) = reader.get_spectrum(1..=2, FrameType::Ms1, 0..=3).unwrap();
    // bin 2: 5 + 3 + 11 = 19; bin 6: 7. MS2 frame 3 excluded.
    assert_eq!(intensities, vec![19, 7]);
    assert_eq!(mzs.len(), 2);
    assert!((mzs[0] - (0.5f64 * 0.002).powi(2)).abs() < 1e-15);
    assert!((mzs[1] - 9.0e-6).abs() < 1e-15);
}

#[test]
fn spectrum_scan_window_restricts_sum() {
    let (_dir, path) = two_frame_file();
    let mut reader = UimfReader::open(&path).unwrap();

    let (_, intensities) = reader.get_spectrum(1..=1, FrameType::Ms1, 1..=1).unwrap();
    assert_eq!(intensities, vec![3]);
}

#[test]
fn spectrum_cache_entry_is_reused() {
    let (_dir, path) = two_frame_file();
    let mut reader = UimfReader::open(&path).unwrap();

    let first = reader.get_spectrum(1..=2, FrameType::Ms1, 0..=3).unwrap();
    let key = CacheKey {
        start_frame: 1,
        end_frame: 2,
        frame_type: FrameType::Ms1,
    };
    assert!(reader.spectrum_cache.get(key).is_some());
    let second = reader.get_spectrum(1..=2, FrameType::Ms1, 0..=3).unwrap();
    assert_eq!(first, second);
}

#[test]
fn spectrum_bin_window_filters_bins() {
    let (_dir, path) = two_frame_file();
    let mut reader = UimfReader::open(&path).unwrap();

    let (_, intensities) = reader
        .get_spectrum_in_bin_range(1..=1, FrameType::Ms1, 0..=3, 5..=10)
        .unwrap();
    assert_eq!(intensities, vec![7]);
}

#[test]
fn intensity_block_is_dense() {
    let (_dir, path) = two_frame_file();
    let mut reader = UimfReader::open(&path).unwrap();

    let block = reader
        .get_intensity_block(1..=2, FrameType::Ms1, 0..=1, 0..=7)
        .unwrap();
    assert_eq!(block.len(), 2); // frames 1..=2
    assert_eq!(block[0].len(), 2); // scans 0..=1
    assert_eq!(block[0][0].len(), 8); // bins 0..=7
    assert_eq!(block[0][0][2], 5);
    assert_eq!(block[0][0][6], 7);
    assert_eq!(block[0][1][2], 3);
    assert_eq!(block[1][0][2], 11);
    assert_eq!(block[1][1][2], 0);
}

#[test]
fn tic_reports_zero_for_missing_scan_positions() {
    let (_dir, path) = two_frame_file();
    let mut reader = UimfReader::open(&path).unwrap();

    let tic = reader.get_tic(FrameType::Ms1, 1..=1, 0..=3).unwrap();
    assert_eq!(tic, vec![12.0, 3.0, 0.0, 0.0]);
}

#[test]
fn bpi_by_frame_takes_the_maximum_scan() {
    let (_dir, path) = two_frame_file();
    let mut reader = UimfReader::open(&path).unwrap();

    let bpi = reader.get_bpi_by_frame(FrameType::Ms1).unwrap();
    assert_eq!(bpi.get(&1), Some(&7.0));
    assert_eq!(bpi.get(&2), Some(&11.0));
    assert!(!bpi.contains_key(&3));
}

#[test]
fn xic_without_bin_centric_tables_fails() {
    let (_dir, path) = two_frame_file();
    let mut reader = UimfReader::open(&path).unwrap();

    assert!(matches!(
        reader.get_xic_in_bin_range(2..=2, None, None, FrameType::Ms1),
        Err(UimfError::BinCentricMissing)
    ));
}

#[test]
fn get_scan_distinguishes_missing_from_corrupt() {
    let (_dir, path) = two_frame_file();
    let mut reader = UimfReader::open(&path).unwrap();

    assert_eq!(reader.get_scan(1, 0).unwrap(), vec![(2, 5), (6, 7)]);
    assert!(matches!(
        reader.get_scan(1, 3),
        Err(UimfError::ScanNotFound { frame: 1, scan: 3 })
    ));
}

#[test]
fn corrupt_blob_is_skipped_in_aggregates_but_surfaced_directly() {
    let (_dir, path) = two_frame_file();

    // Truncate frame 1 scan 0's BLOB mid-stream.
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "UPDATE Frame_Scans SET intensities = x'0400' WHERE frame_num = 1 AND scan_num = 0",
            [],
        )
        .unwrap();
    }

    let mut reader = UimfReader::open(&path).unwrap();
    assert!(matches!(
        reader.get_scan(1, 0),
        Err(UimfError::CorruptScan { frame: 1, scan: 0 })
    ));

    // The aggregate keeps going with the intact scans.
    let (_, intensities) = reader.get_spectrum(1..=2, FrameType::Ms1, 0..=3).unwrap();
    assert_eq!(intensities, vec![14]); // 3 + 11 at bin 2
}
