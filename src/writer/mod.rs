//! # UIMF Writer Module
//!
//! Transactional writer for UIMF datasets.
//!
//! ## Design
//!
//! 1. **One Outer Transaction**: a transaction is begun when the file is
//!    opened and every insert lands inside it. [`UimfWriter::flush`]
//!    commits and immediately re-begins, bounding the work lost on crash.
//!
//! 2. **Derived Statistics at Insert Time**: TIC, BPI, and the BPI m/z are
//!    computed while encoding the scan, so the stored summary columns are
//!    always consistent with the BLOB.
//!
//! 3. **Idempotent Metadata**: frame and global parameters are upserts
//!    keyed by `(frame, param_id)`; re-inserting a frame simply refreshes
//!    its values.
//!
//! Dropping an unflushed writer rolls the open transaction back.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::bin_centric::BinCentricBuilder;
use crate::calibration::MzCalibrator;
use crate::codec::{encode_scan, encode_scan_sparse, ScanTotals};
use crate::error::UimfError;
use crate::events::EventSink;
use crate::params::{
    FrameParamKey, FrameParams, FrameType, GlobalParamKey, GlobalParams, ParamDataType,
    ParamValue,
};
use crate::schema;

#[cfg(test)]
mod tests;

/// Writer handle for a UIMF dataset.
///
/// A writer is exclusive: concurrent writers to one file are undefined
/// behavior and SQLite's locking will reject the second one. All calls must
/// be issued serially from one thread.
pub struct UimfWriter {
    conn: Connection,
    global: GlobalParams,
    frame_cache: HashMap<i32, FrameParams>,
    key_types: HashMap<i32, ParamDataType>,
    registered_keys: HashSet<i32>,
    in_transaction: bool,
}

impl UimfWriter {
    /// Create a new dataset at `path` with the given global parameters.
    ///
    /// Builds the schema, appends a `Version_Info` row, persists `global`,
    /// and begins the outer transaction.
    pub fn create<P: AsRef<Path>>(path: P, global: &GlobalParams) -> Result<Self, UimfError> {
        let conn = Connection::open(path)?;
        schema::create_core_tables(&conn)?;
        schema::write_version_info(&conn)?;
        schema::write_global_params(&conn, global)?;

        let mut writer = Self {
            conn,
            global: global.clone(),
            frame_cache: HashMap::new(),
            key_types: HashMap::new(),
            registered_keys: HashSet::new(),
            in_transaction: false,
        };
        writer.begin()?;
        Ok(writer)
    }

    /// Open an existing dataset for appending.
    ///
    /// A file carrying only the legacy wide tables is up-converted in
    /// place; the legacy tables are kept so old readers continue to work.
    /// Fails with [`UimfError::InconsistentFrameTypes`] when the file mixes
    /// the two MS1 labels.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, UimfError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        // Reject mixed labelling before touching anything.
        schema::determine_ms1_label(&conn)?;

        if !schema::table_exists(&conn, "Frame_Params")? {
            if !schema::table_exists(&conn, "Frame_Parameters")? {
                return Err(UimfError::MissingTable("Frame_Params".to_string()));
            }
            schema::upconvert_legacy(&conn)?;
        } else {
            schema::create_core_tables(&conn)?;
        }
        schema::write_version_info(&conn)?;

        let entries = schema::read_global_entries(&conn)?;
        if entries.is_empty() {
            return Err(UimfError::MissingTable("Global_Params".to_string()));
        }
        let global = GlobalParams::from_entries(entries)?;
        let key_types = schema::load_frame_key_types(&conn)?;

        let mut writer = Self {
            conn,
            global,
            frame_cache: HashMap::new(),
            key_types,
            registered_keys: HashSet::new(),
            in_transaction: false,
        };
        writer.begin()?;
        Ok(writer)
    }

    /// The cached global parameters.
    pub fn global_params(&self) -> &GlobalParams {
        &self.global
    }

    /// Controlled update of the dataset-wide parameters.
    pub fn update_global_params(&mut self, global: &GlobalParams) -> Result<(), UimfError> {
        self.ensure_transaction()?;
        schema::write_global_params(&self.conn, global)?;
        self.global = global.clone();
        Ok(())
    }

    /// Insert (or refresh) every parameter of one frame.
    ///
    /// Idempotent: each `(frame, param_id)` pair is an upsert. Growing the
    /// dataset past the recorded frame count updates `NumFrames`.
    pub fn insert_frame(&mut self, frame: i32, params: &FrameParams) -> Result<(), UimfError> {
        self.ensure_transaction()?;

        for (id, value) in params.to_entries() {
            self.register_key(id, &value)?;
            schema::put_frame_param(&self.conn, frame, id, &value)?;
        }
        self.frame_cache.insert(frame, params.clone());

        if frame > self.global.num_frames {
            self.global.num_frames = frame;
            let key = GlobalParamKey::NumFrames;
            schema::put_global_param(
                &self.conn,
                key.id(),
                key.name(),
                key.data_type(),
                key.description(),
                &ParamValue::I32(frame),
            )?;
        }
        Ok(())
    }

    /// Insert one scan from a dense intensity vector indexed by bin.
    ///
    /// The frame's parameters must already be inserted. A vector with no
    /// positive entry inserts nothing and is not an error; negative
    /// intensities fail with [`crate::codec::CodecError::InvalidIntensity`].
    pub fn insert_scan(
        &mut self,
        frame: i32,
        scan: i32,
        intensities: &[i32],
    ) -> Result<(), UimfError> {
        let (blob, totals) = encode_scan(intensities)?;
        self.insert_encoded_scan(frame, scan, blob, totals)
    }

    /// Insert one scan from strictly positive `(bin, intensity)` pairs
    /// sorted by bin.
    ///
    /// Produces the same BLOB as [`insert_scan`](Self::insert_scan) over
    /// the densified input.
    pub fn insert_scan_sparse(
        &mut self,
        frame: i32,
        scan: i32,
        pairs: &[(i32, i32)],
    ) -> Result<(), UimfError> {
        // Unit offset aligns the sparse leading skip with the dense walk.
        let (blob, totals) = encode_scan_sparse(pairs, 1)?;
        self.insert_encoded_scan(frame, scan, blob, totals)
    }

    fn insert_encoded_scan(
        &mut self,
        frame: i32,
        scan: i32,
        blob: Vec<u8>,
        totals: ScanTotals,
    ) -> Result<(), UimfError> {
        if totals.non_zero_count == 0 {
            return Ok(());
        }
        self.ensure_transaction()?;

        let frame_params = self.frame_params(frame)?;
        let calibrator = MzCalibrator::new(&frame_params, &self.global);
        let bpi_mz = calibrator.bin_to_mz(totals.bpi_bin as f64);

        self.conn.execute(
            "INSERT INTO Frame_Scans
                 (frame_num, scan_num, non_zero_count, bpi, bpi_mz, tic, intensities)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (frame_num, scan_num) DO UPDATE SET
                 non_zero_count = excluded.non_zero_count,
                 bpi = excluded.bpi,
                 bpi_mz = excluded.bpi_mz,
                 tic = excluded.tic,
                 intensities = excluded.intensities",
            rusqlite::params![
                frame,
                scan,
                totals.non_zero_count,
                totals.bpi as i64,
                bpi_mz,
                totals.tic,
                blob
            ],
        )?;
        Ok(())
    }

    /// Upsert a single frame parameter.
    ///
    /// Registers the key definition on first use in this file.
    pub fn put_frame_param(
        &mut self,
        frame: i32,
        key: FrameParamKey,
        value: ParamValue,
    ) -> Result<(), UimfError> {
        self.ensure_transaction()?;
        self.register_key(key.id(), &value)?;
        schema::put_frame_param(&self.conn, frame, key.id(), &value)?;
        if let Some(cached) = self.frame_cache.get_mut(&frame) {
            cached.set(key, value)?;
        }
        Ok(())
    }

    /// Upsert a single global parameter, refreshing the cached view.
    pub fn put_global_param(
        &mut self,
        key: GlobalParamKey,
        value: ParamValue,
    ) -> Result<(), UimfError> {
        self.ensure_transaction()?;
        schema::put_global_param(
            &self.conn,
            key.id(),
            key.name(),
            key.data_type(),
            key.description(),
            &value,
        )?;
        self.global.set(key, value)?;
        Ok(())
    }

    /// Remove a frame's scans and parameters.
    ///
    /// With `decrement_frame_count` the recorded `NumFrames` is reduced by
    /// one (never below zero).
    pub fn delete_frame(
        &mut self,
        frame: i32,
        decrement_frame_count: bool,
    ) -> Result<(), UimfError> {
        self.ensure_transaction()?;
        self.conn
            .execute("DELETE FROM Frame_Scans WHERE frame_num = ?1", [frame])?;
        self.conn
            .execute("DELETE FROM Frame_Params WHERE frame_num = ?1", [frame])?;
        self.frame_cache.remove(&frame);

        if decrement_frame_count && self.global.num_frames > 0 {
            self.global.num_frames -= 1;
            let key = GlobalParamKey::NumFrames;
            schema::put_global_param(
                &self.conn,
                key.id(),
                key.name(),
                key.data_type(),
                key.description(),
                &ParamValue::I32(self.global.num_frames),
            )?;
        }
        Ok(())
    }

    /// Remove the scans of every frame of the given type.
    ///
    /// With `remove_frame_params` the frames' parameter rows go too.
    pub fn delete_scans_of_type(
        &mut self,
        frame_type: FrameType,
        remove_frame_params: bool,
    ) -> Result<(), UimfError> {
        self.ensure_transaction()?;
        let frames = self.frames_of_type(frame_type)?;
        for frame in frames {
            self.conn
                .execute("DELETE FROM Frame_Scans WHERE frame_num = ?1", [frame])?;
            if remove_frame_params {
                self.conn
                    .execute("DELETE FROM Frame_Params WHERE frame_num = ?1", [frame])?;
                self.frame_cache.remove(&frame);
            }
        }
        Ok(())
    }

    /// Replace one frame's calibration slope and intercept.
    ///
    /// Readers recompute bin/m-z conversions from the stored parameters on
    /// their next query.
    pub fn update_calibration(
        &mut self,
        frame: i32,
        slope: f64,
        intercept: f64,
    ) -> Result<(), UimfError> {
        self.ensure_transaction()?;
        for (key, value) in [
            (FrameParamKey::CalibrationSlope, slope),
            (FrameParamKey::CalibrationIntercept, intercept),
        ] {
            self.register_key(key.id(), &ParamValue::F64(value))?;
            schema::put_frame_param(&self.conn, frame, key.id(), &ParamValue::F64(value))?;
        }
        if let Some(cached) = self.frame_cache.get_mut(&frame) {
            cached.calibration_slope = slope;
            cached.calibration_intercept = intercept;
        }
        Ok(())
    }

    /// Apply one calibration to every frame in the file.
    pub fn update_calibration_all(&mut self, slope: f64, intercept: f64) -> Result<(), UimfError> {
        let frames = self.all_frames()?;
        for frame in frames {
            self.update_calibration(frame, slope, intercept)?;
        }
        Ok(())
    }

    /// Build the bin-centric secondary index over the current contents.
    ///
    /// The open transaction is committed first; the builder runs its own.
    /// `working_dir` hosts the temporary partition store and defaults to
    /// the system temp directory. Progress is reported through `sink`.
    pub fn add_bin_centric_tables(
        &mut self,
        working_dir: Option<&Path>,
        sink: &dyn EventSink,
    ) -> Result<(), UimfError> {
        self.commit()?;
        let builder = BinCentricBuilder::new(&self.global);
        builder.build(&self.conn, working_dir, sink)?;
        self.begin()
    }

    /// Commit the open transaction and immediately begin the next one.
    pub fn flush(&mut self) -> Result<(), UimfError> {
        self.commit()?;
        self.begin()
    }

    /// Reclaim free pages after deletions.
    ///
    /// Commits outstanding work first and blocks until the rebuild
    /// finishes.
    pub fn vacuum(&mut self) -> Result<(), UimfError> {
        self.commit()?;
        self.conn.execute_batch("VACUUM")?;
        self.begin()
    }

    /// Commit the open transaction. Later inserts begin a new one lazily.
    pub fn commit(&mut self) -> Result<(), UimfError> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    /// Commit outstanding work and close the file.
    pub fn close(mut self) -> Result<(), UimfError> {
        self.commit()
    }

    fn begin(&mut self) -> Result<(), UimfError> {
        self.conn.execute_batch("BEGIN")?;
        self.in_transaction = true;
        Ok(())
    }

    fn ensure_transaction(&mut self) -> Result<(), UimfError> {
        if !self.in_transaction {
            self.begin()?;
        }
        Ok(())
    }

    fn register_key(&mut self, id: i32, value: &ParamValue) -> Result<(), UimfError> {
        if !self.registered_keys.insert(id) {
            return Ok(());
        }
        match FrameParamKey::from_id(id) {
            Some(key) => {
                schema::ensure_frame_param_key(
                    &self.conn,
                    key.id(),
                    key.name(),
                    key.data_type(),
                    key.description(),
                )?;
                self.key_types.insert(id, key.data_type());
            }
            None => {
                // Carry a file's unrecognized parameter forward under its
                // existing definition when there is one.
                if !self.key_types.contains_key(&id) {
                    schema::ensure_frame_param_key(
                        &self.conn,
                        id,
                        &format!("Param{id}"),
                        value.data_type(),
                        "",
                    )?;
                    self.key_types.insert(id, value.data_type());
                }
            }
        }
        Ok(())
    }

    fn frame_params(&mut self, frame: i32) -> Result<FrameParams, UimfError> {
        if let Some(params) = self.frame_cache.get(&frame) {
            return Ok(params.clone());
        }
        let entries = schema::read_frame_entries(&self.conn, frame, &self.key_types)?;
        if entries.is_empty() {
            return Err(UimfError::FrameOutOfRange {
                frame,
                num_frames: self.global.num_frames,
            });
        }
        let params = FrameParams::from_entries(entries)?;
        self.frame_cache.insert(frame, params.clone());
        Ok(params)
    }

    fn frames_of_type(&self, frame_type: FrameType) -> Result<Vec<i32>, UimfError> {
        let mut stmt = self.conn.prepare(
            "SELECT frame_num, param_value FROM Frame_Params
             WHERE param_id = ?1 ORDER BY frame_num",
        )?;
        let rows = stmt.query_map([FrameParamKey::FrameType.id()], |row| {
            Ok((row.get::<_, i32>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut frames = Vec::new();
        for row in rows {
            let (frame, text) = row?;
            let Ok(stored) = text.trim().parse::<i32>() else {
                continue;
            };
            if FrameType::from_stored(stored).map(|t| t == frame_type).unwrap_or(false) {
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    fn all_frames(&self) -> Result<Vec<i32>, UimfError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT frame_num FROM Frame_Params ORDER BY frame_num")?;
        let rows = stmt.query_map([], |row| row.get::<_, i32>(0))?;
        let mut frames = Vec::new();
        for frame in rows {
            frames.push(frame?);
        }
        Ok(frames)
    }
}

impl Drop for UimfWriter {
    fn drop(&mut self) {
        if self.in_transaction {
            if let Err(err) = self.conn.execute_batch("ROLLBACK") {
                log::warn!("rollback on drop failed: {err}");
            }
        }
    }
}
