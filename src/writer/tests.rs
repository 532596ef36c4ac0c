use tempfile::tempdir;

use super::*;
use crate::params::{FrameParams, FrameType, GlobalParams, ParamValue};

fn global_fixture() -> GlobalParams {
    let mut global = GlobalParams::new();
    global.bins = 16;
    global.bin_width_ns = 1.0;
    global.instrument_name = "test-ims".to_string();
    global
}

fn ms1_frame() -> FrameParams {
    let mut frame = FrameParams::new(FrameType::Ms1);
    frame.scans = 4;
    frame.calibration_slope = 0.5;
    frame.calibration_intercept = 0.0;
    frame
}

#[test]
fn insert_scan_records_derived_totals() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("totals.uimf");

    let mut writer = UimfWriter::create(&path, &global_fixture()).unwrap();
    writer.insert_frame(1, &ms1_frame()).unwrap();
    writer
        .insert_scan(1, 0, &[0, 0, 5, 0, 0, 0, 7, 0, 2, 0, 0, 0, 0, 0, 0, 0])
        .unwrap();
    writer.close().unwrap();

    let conn = Connection::open(&path).unwrap();
    let (non_zero, bpi, bpi_mz, tic): (i32, i64, f64, i64) = conn
        .query_row(
            "SELECT non_zero_count, bpi, bpi_mz, tic FROM Frame_Scans
             WHERE frame_num = 1 AND scan_num = 0",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .unwrap();

    assert_eq!(non_zero, 3);
    assert_eq!(bpi, 7);
    assert_eq!(tic, 14);
    // bin 6 at slope 0.5, bin width 1 ns: (0.5 * 0.006)^2
    assert!((bpi_mz - 9.0e-6).abs() < 1e-18);
}

#[test]
fn all_zero_scan_is_dropped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("zeros.uimf");

    let mut writer = UimfWriter::create(&path, &global_fixture()).unwrap();
    writer.insert_frame(1, &ms1_frame()).unwrap();
    writer.insert_scan(1, 0, &[0; 16]).unwrap();
    writer.close().unwrap();

    let conn = Connection::open(&path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM Frame_Scans", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn sparse_and_dense_inserts_store_identical_blobs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sparse.uimf");

    let mut writer = UimfWriter::create(&path, &global_fixture()).unwrap();
    writer.insert_frame(1, &ms1_frame()).unwrap();
    writer
        .insert_scan(1, 0, &[0, 0, 5, 0, 0, 0, 7, 0, 2, 0, 0, 0, 0, 0, 0, 0])
        .unwrap();
    writer
        .insert_scan_sparse(1, 1, &[(2, 5), (6, 7), (8, 2)])
        .unwrap();
    writer.close().unwrap();

    let conn = Connection::open(&path).unwrap();
    let blob = |scan: i32| -> Vec<u8> {
        conn.query_row(
            "SELECT intensities FROM Frame_Scans WHERE frame_num = 1 AND scan_num = ?1",
            [scan],
            |row| row.get(0),
        )
        .unwrap()
    };
    assert_eq!(blob(0), blob(1));
}

#[test]
fn inserting_frames_grows_num_frames() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("grow.uimf");

    let mut writer = UimfWriter::create(&path, &global_fixture()).unwrap();
    writer.insert_frame(1, &ms1_frame()).unwrap();
    writer.insert_frame(3, &ms1_frame()).unwrap();
    assert_eq!(writer.global_params().num_frames, 3);
    writer.close().unwrap();

    let conn = Connection::open(&path).unwrap();
    let stored: String = conn
        .query_row(
            "SELECT param_value FROM Global_Params WHERE param_id = ?1",
            [GlobalParamKey::NumFrames.id()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored, "3");
}

#[test]
fn insert_frame_is_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idem.uimf");

    let mut writer = UimfWriter::create(&path, &global_fixture()).unwrap();
    let mut frame = ms1_frame();
    writer.insert_frame(1, &frame).unwrap();
    frame.accumulations = 18;
    writer.insert_frame(1, &frame).unwrap();
    writer.close().unwrap();

    let conn = Connection::open(&path).unwrap();
    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM Frame_Params WHERE frame_num = 1 AND param_id = ?1",
            [FrameParamKey::Accumulations.id()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(rows, 1);
    let stored: String = conn
        .query_row(
            "SELECT param_value FROM Frame_Params WHERE frame_num = 1 AND param_id = ?1",
            [FrameParamKey::Accumulations.id()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored, "18");
}

#[test]
fn scan_for_unknown_frame_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("noframe.uimf");

    let mut writer = UimfWriter::create(&path, &global_fixture()).unwrap();
    let err = writer.insert_scan(5, 0, &[1, 2, 3]).unwrap_err();
    assert!(matches!(err, UimfError::FrameOutOfRange { frame: 5, .. }));
}

#[test]
fn negative_intensities_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("negative.uimf");

    let mut writer = UimfWriter::create(&path, &global_fixture()).unwrap();
    writer.insert_frame(1, &ms1_frame()).unwrap();
    assert!(matches!(
        writer.insert_scan(1, 0, &[0, -4, 1]),
        Err(UimfError::Codec(_))
    ));
}

#[test]
fn drop_without_commit_rolls_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rollback.uimf");

    {
        let mut writer = UimfWriter::create(&path, &global_fixture()).unwrap();
        writer.insert_frame(1, &ms1_frame()).unwrap();
        writer.insert_scan(1, 0, &[0, 9, 0, 0]).unwrap();
        // Dropped without close(): the open transaction must roll back.
    }

    let conn = Connection::open(&path).unwrap();
    let scans: i64 = conn
        .query_row("SELECT COUNT(*) FROM Frame_Scans", [], |row| row.get(0))
        .unwrap();
    assert_eq!(scans, 0);
}

#[test]
fn flush_persists_and_keeps_writing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("flush.uimf");

    let mut writer = UimfWriter::create(&path, &global_fixture()).unwrap();
    writer.insert_frame(1, &ms1_frame()).unwrap();
    writer.insert_scan(1, 0, &[0, 9, 0, 0]).unwrap();
    writer.flush().unwrap();
    writer.insert_scan(1, 1, &[0, 0, 3, 0]).unwrap();
    drop(writer); // second scan uncommitted

    let conn = Connection::open(&path).unwrap();
    let scans: i64 = conn
        .query_row("SELECT COUNT(*) FROM Frame_Scans", [], |row| row.get(0))
        .unwrap();
    assert_eq!(scans, 1);
}

#[test]
fn update_calibration_replaces_both_params() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("recal.uimf");

    let mut writer = UimfWriter::create(&path, &global_fixture()).unwrap();
    writer.insert_frame(1, &ms1_frame()).unwrap();
    writer.update_calibration(1, 0.42, 0.007).unwrap();
    writer.close().unwrap();

    let conn = Connection::open(&path).unwrap();
    let value = |id: i32| -> String {
        conn.query_row(
            "SELECT param_value FROM Frame_Params WHERE frame_num = 1 AND param_id = ?1",
            [id],
            |row| row.get(0),
        )
        .unwrap()
    };
    assert_eq!(value(FrameParamKey::CalibrationSlope.id()), "0.42");
    assert_eq!(value(FrameParamKey::CalibrationIntercept.id()), "0.007");
}

#[test]
fn delete_frame_removes_scans_and_params() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("delete.uimf");

    let mut writer = UimfWriter::create(&path, &global_fixture()).unwrap();
    writer.insert_frame(1, &ms1_frame()).unwrap();
    writer.insert_frame(2, &ms1_frame()).unwrap();
    writer.insert_scan(1, 0, &[0, 9, 0, 0]).unwrap();
    writer.insert_scan(2, 0, &[0, 5, 0, 0]).unwrap();
    writer.delete_frame(1, true).unwrap();
    assert_eq!(writer.global_params().num_frames, 1);
    writer.close().unwrap();

    let conn = Connection::open(&path).unwrap();
    let scans: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM Frame_Scans WHERE frame_num = 1",
            [],
            |row| row.get(0),
        )
        .unwrap();
    let params: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM Frame_Params WHERE frame_num = 1",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!((scans, params), (0, 0));
}

#[test]
fn delete_scans_of_type_targets_only_that_type() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bytype.uimf");

    let mut writer = UimfWriter::create(&path, &global_fixture()).unwrap();
    writer.insert_frame(1, &ms1_frame()).unwrap();
    let mut ms2 = ms1_frame();
    ms2.frame_type = FrameType::Ms2;
    writer.insert_frame(2, &ms2).unwrap();
    writer.insert_scan(1, 0, &[0, 9, 0, 0]).unwrap();
    writer.insert_scan(2, 0, &[0, 5, 0, 0]).unwrap();
    writer.delete_scans_of_type(FrameType::Ms2, false).unwrap();
    writer.close().unwrap();

    let conn = Connection::open(&path).unwrap();
    let frames: Vec<i32> = conn
        .prepare("SELECT DISTINCT frame_num FROM Frame_Scans ORDER BY frame_num")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(frames, vec![1]);
}

#[test]
fn single_param_upserts_reach_storage_and_caches() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("put.uimf");

    let mut writer = UimfWriter::create(&path, &global_fixture()).unwrap();
    writer.insert_frame(1, &ms1_frame()).unwrap();
    writer
        .put_frame_param(1, FrameParamKey::Accumulations, ParamValue::I32(24))
        .unwrap();
    writer
        .put_global_param(GlobalParamKey::TimeOffset, ParamValue::I32(5))
        .unwrap();
    assert_eq!(writer.global_params().time_offset, 5);
    writer.close().unwrap();

    let conn = Connection::open(&path).unwrap();
    let accumulations: String = conn
        .query_row(
            "SELECT param_value FROM Frame_Params WHERE frame_num = 1 AND param_id = ?1",
            [FrameParamKey::Accumulations.id()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(accumulations, "24");
    let offset: String = conn
        .query_row(
            "SELECT param_value FROM Global_Params WHERE param_id = ?1",
            [GlobalParamKey::TimeOffset.id()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(offset, "5");
}

#[test]
fn unknown_extra_param_round_trips_through_writer() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("extra.uimf");

    let mut writer = UimfWriter::create(&path, &global_fixture()).unwrap();
    let mut frame = ms1_frame();
    frame.extra.insert(901, ParamValue::Text("vendor-x".to_string()));
    writer.insert_frame(1, &frame).unwrap();
    writer.close().unwrap();

    let conn = Connection::open(&path).unwrap();
    let stored: String = conn
        .query_row(
            "SELECT param_value FROM Frame_Params WHERE frame_num = 1 AND param_id = 901",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored, "vendor-x");
    // And the key definition was registered for it.
    let name: String = conn
        .query_row(
            "SELECT param_name FROM Frame_Param_Keys WHERE param_id = 901",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(name, "Param901");
}
