//! Write-then-read round trips through real files.

use tempfile::tempdir;

use uimf::params::{FrameParams, FrameType, GlobalParams, ParamValue};
use uimf::reader::UimfReader;
use uimf::writer::UimfWriter;

fn small_global() -> GlobalParams {
    let mut global = GlobalParams::new();
    global.bins = 10;
    global.bin_width_ns = 1.0;
    global.tof_correction_time = 0.0;
    global.instrument_name = "roundtrip-ims".to_string();
    global
}

fn calibrated_frame(scans: i32, slope: f64) -> FrameParams {
    let mut frame = FrameParams::new(FrameType::Ms1);
    frame.scans = scans;
    frame.calibration_slope = slope;
    frame.calibration_intercept = 0.0;
    frame
}

/// One frame, one scan: TIC, scan summary, and BPI m/z must match the
/// values derived at insert time.
#[test]
fn single_scan_acquisition_reads_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("single.uimf");

    let mut writer = UimfWriter::create(&path, &small_global()).unwrap();
    writer.insert_frame(1, &calibrated_frame(3, 0.5)).unwrap();
    writer
        .insert_scan(1, 0, &[0, 0, 5, 0, 0, 0, 7, 0, 2, 0])
        .unwrap();
    writer.close().unwrap();

    let mut reader = UimfReader::open(&path).unwrap();

    let tic = reader.get_tic(FrameType::Ms1, 1..=1, 0..=0).unwrap();
    assert_eq!(tic, vec![14.0]);

    let scans = reader.get_frame_scans(1).unwrap();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].scan, 0);
    assert_eq!(scans[0].non_zero_count, 3);
    assert_eq!(scans[0].bpi, 7.0);
    assert_eq!(scans[0].tic, 14.0);
    // bin 6 at slope 0.5: (0.5 * (6 * 1.0/1000 - 0))^2
    assert!((scans[0].bpi_mz - 9.0e-6).abs() < 1e-18);
}

/// Writing, closing, reopening, and reading returns exactly the inserted
/// scans in their original order.
#[test]
fn scans_survive_reopen_unchanged() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reopen.uimf");

    let dense: Vec<Vec<i32>> = vec![
        vec![0, 4, 0, 0, 9, 0, 0, 0, 0, 0],
        vec![1, 0, 0, 0, 0, 0, 0, 0, 0, 2],
        vec![0, 0, 0, 7, 7, 7, 0, 0, 0, 0],
    ];

    {
        let mut writer = UimfWriter::create(&path, &small_global()).unwrap();
        writer.insert_frame(1, &calibrated_frame(3, 0.5)).unwrap();
        for (scan, intensities) in dense.iter().enumerate() {
            writer.insert_scan(1, scan as i32, intensities).unwrap();
        }
        writer.close().unwrap();
    }

    let mut reader = UimfReader::open(&path).unwrap();
    let scans = reader.get_frame_scans(1).unwrap();
    assert_eq!(
        scans.iter().map(|s| s.scan).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );

    for (scan, intensities) in dense.iter().enumerate() {
        let expected: Vec<(i32, i32)> = intensities
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > 0)
            .map(|(bin, &v)| (bin as i32, v))
            .collect();
        assert_eq!(reader.get_scan(1, scan as i32).unwrap(), expected);
    }
}

/// A scan of pure zeros inserts nothing: it is absent from the frame's
/// listing and reports zero TIC at its position.
#[test]
fn zero_scan_leaves_no_row() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("zeros.uimf");

    let mut writer = UimfWriter::create(&path, &small_global()).unwrap();
    writer.insert_frame(1, &calibrated_frame(2, 0.5)).unwrap();
    writer.insert_scan(1, 0, &[0; 10]).unwrap();
    writer
        .insert_scan(1, 1, &[0, 0, 6, 0, 0, 0, 0, 0, 0, 0])
        .unwrap();
    writer.close().unwrap();

    let mut reader = UimfReader::open(&path).unwrap();
    let scans = reader.get_frame_scans(1).unwrap();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].scan, 1);

    let tic = reader.get_tic(FrameType::Ms1, 1..=1, 0..=1).unwrap();
    assert_eq!(tic, vec![0.0, 6.0]);
}

/// Every (param_id, frame, value) triple written comes back, including ids
/// this library does not know.
#[test]
fn parameters_are_preserved_verbatim() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("params.uimf");

    let mut frame = calibrated_frame(7, 0.35);
    frame.accumulations = 18;
    frame.duration_seconds = 0.95;
    frame.mass_error_c2 = -3.5e-10;
    frame.extra.insert(777, ParamValue::F64(12.5));
    frame
        .extra
        .insert(778, ParamValue::Text("unrecognized".to_string()));

    {
        let mut writer = UimfWriter::create(&path, &small_global()).unwrap();
        writer.insert_frame(1, &frame).unwrap();
        writer.close().unwrap();
    }

    let mut reader = UimfReader::open(&path).unwrap();
    let read_back = reader.get_frame_params(1).unwrap();
    assert_eq!(*read_back, frame);
}

/// Re-opening a file for write appends without disturbing prior contents.
#[test]
fn append_session_extends_the_dataset() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("append.uimf");

    {
        let mut writer = UimfWriter::create(&path, &small_global()).unwrap();
        writer.insert_frame(1, &calibrated_frame(2, 0.5)).unwrap();
        writer
            .insert_scan(1, 0, &[0, 8, 0, 0, 0, 0, 0, 0, 0, 0])
            .unwrap();
        writer.close().unwrap();
    }
    {
        let mut writer = UimfWriter::open(&path).unwrap();
        writer.insert_frame(2, &calibrated_frame(2, 0.5)).unwrap();
        writer
            .insert_scan(2, 0, &[0, 0, 0, 4, 0, 0, 0, 0, 0, 0])
            .unwrap();
        writer.close().unwrap();
    }

    let mut reader = UimfReader::open(&path).unwrap();
    assert_eq!(reader.num_frames(), 2);
    assert_eq!(reader.get_scan(1, 0).unwrap(), vec![(1, 8)]);
    assert_eq!(reader.get_scan(2, 0).unwrap(), vec![(3, 4)]);

    // Each write session appended its own Version_Info row.
    let conn = rusqlite::Connection::open(&path).unwrap();
    let sessions: i64 = conn
        .query_row("SELECT COUNT(*) FROM Version_Info", [], |row| row.get(0))
        .unwrap();
    assert_eq!(sessions, 2);
}

/// Spectrum m/z values follow the calibration identity for every reported
/// bin.
#[test]
fn spectrum_mzs_follow_the_calibration_identity() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calibration.uimf");

    let mut frame = calibrated_frame(1, 0.37);
    frame.calibration_intercept = 0.004;
    frame.mass_error_a2 = 2.0e-6;
    frame.mass_error_b2 = -1.0e-9;

    let mut writer = UimfWriter::create(&path, &small_global()).unwrap();
    writer.insert_frame(1, &frame).unwrap();
    writer
        .insert_scan(1, 0, &[0, 3, 0, 5, 0, 0, 0, 0, 1, 0])
        .unwrap();
    writer.close().unwrap();

    let mut reader = UimfReader::open(&path).unwrap();
    let (mzs, intensities) = reader.get_spectrum(1..=1, FrameType::Ms1, 0..=0).unwrap();
    assert_eq!(intensities, vec![3, 5, 1]);

    for (&mz, bin) in mzs.iter().zip([1.0f64, 3.0, 8.0]) {
        let t: f64 = bin * 1.0 / 1000.0;
        let residual = 2.0e-6 * t + -1.0e-9 * t.powi(3);
        let expected = (0.37 * (t - 0.004)).powi(2) + residual;
        assert!((mz - expected).abs() < 1e-15);
    }
}

/// Recalibrating shifts what the reader reports without rewriting scans.
#[test]
fn recalibration_changes_reported_mzs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("recal.uimf");

    let mut writer = UimfWriter::create(&path, &small_global()).unwrap();
    writer.insert_frame(1, &calibrated_frame(1, 0.5)).unwrap();
    writer
        .insert_scan(1, 0, &[0, 0, 0, 0, 0, 0, 7, 0, 0, 0])
        .unwrap();
    writer.update_calibration(1, 1.0, 0.0).unwrap();
    writer.close().unwrap();

    let mut reader = UimfReader::open(&path).unwrap();
    let (mzs, _) = reader.get_spectrum(1..=1, FrameType::Ms1, 0..=0).unwrap();
    assert!((mzs[0] - (1.0f64 * 0.006).powi(2)).abs() < 1e-15);
}
