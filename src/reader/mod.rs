//! # UIMF Reader Module
//!
//! Query engine for UIMF datasets: spectra summed over frame/scan windows,
//! per-scan listings with drift times, TIC/BPI chromatograms, dense
//! intensity blocks for heat maps, and extracted-ion chromatograms through
//! the bin-centric index.
//!
//! ## Example
//!
//! ```rust,no_run
//! use uimf::params::FrameType;
//! use uimf::reader::{ToleranceKind, UimfReader};
//!
//! let mut reader = UimfReader::open("run.uimf")?;
//!
//! // Sum MS1 intensities over frames 10..=20, all 360 scans.
//! let (mzs, intensities) =
//!     reader.get_spectrum(10..=20, FrameType::Ms1, 0..=359)?;
//!
//! // Chromatogram at 623.31 m/z, 25 ppm.
//! let xic = reader.get_xic(623.31, 25.0, ToleranceKind::Ppm, None, None, FrameType::Ms1)?;
//! # let _ = (mzs, intensities, xic);
//! # Ok::<(), uimf::UimfError>(())
//! ```
//!
//! ## Caching
//!
//! Global and frame parameters are cached after first read. Spectrum
//! queries share per-frame-range caches with LRU eviction (soft cap 10
//! entries, hard cap 750 MB estimated; see [`SpectrumCacheConfig`]).
//!
//! ## Corruption tolerance
//!
//! A scan BLOB that fails to decode, or that decodes to bins beyond the
//! dataset's bin count, is skipped with one warning per frame; aggregate
//! queries keep going. The single-scan accessor surfaces
//! [`UimfError::CorruptScan`] instead. A negative stored scan number is
//! always an error: it marks integer overflow in legacy acquisition
//! software, not data.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::RangeInclusive;
use std::path::Path;
use std::rc::Rc;

use rusqlite::{Connection, OpenFlags, OptionalExtension};

use crate::bin_centric::{self, decode_bin_blob};
use crate::calibration::MzCalibrator;
use crate::codec::decode_scan;
use crate::error::UimfError;
use crate::params::{
    FrameParamKey, FrameParams, FrameType, GlobalParams, ParamDataType, PressureUnits,
};
use crate::schema::{self, LegacyFrameSchema};

mod cache;

#[cfg(test)]
mod tests;

pub use cache::SpectrumCacheConfig;

use cache::{CacheEntry, CacheKey, SpectrumCache};

/// Pressure values whose first non-zero samples average above this are
/// taken to be millitorr when the file does not declare a unit.
const MILLITORR_INFERENCE_THRESHOLD: f64 = 100.0;
const PRESSURE_INFERENCE_SAMPLES: usize = 25;

/// Summary of one stored IMS scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanInfo {
    /// Scan number within the frame
    pub scan: i32,
    /// Number of non-zero bins in the scan
    pub non_zero_count: i32,
    /// Base peak intensity
    pub bpi: f64,
    /// m/z of the base peak
    pub bpi_mz: f64,
    /// Total ion current
    pub tic: f64,
    /// Drift time in milliseconds, pressure-normalized when a drift
    /// pressure is recorded
    pub drift_time: f64,
    /// Drift time in milliseconds without pressure normalization
    pub drift_time_raw: f64,
}

/// How an XIC tolerance is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceKind {
    /// Parts-per-million of the target m/z
    Ppm,
    /// Absolute half-width in thomson
    Thomson,
}

/// One point of an extracted-ion chromatogram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XicPoint {
    /// Zero-based index of the frame within the requested frame type
    pub frame_index: i32,
    /// Stored frame number
    pub frame: i32,
    /// Scan number within the frame
    pub scan: i32,
    /// Summed intensity over the m/z window
    pub intensity: i64,
}

/// Reader handle for a UIMF dataset.
///
/// Multiple readers may share one file. A reader must be driven from one
/// thread at a time; its caches are private to it.
pub struct UimfReader {
    conn: Connection,
    global: GlobalParams,
    key_types: HashMap<i32, ParamDataType>,
    legacy_frames: Option<LegacyFrameSchema>,
    has_frame_params: bool,
    frame_cache: HashMap<i32, FrameParams>,
    frame_sets: Option<HashMap<FrameType, Vec<i32>>>,
    spectrum_cache: SpectrumCache,
    inferred_pressure_units: Option<PressureUnits>,
    warned_unknown_params: HashSet<i32>,
    warned_frames: HashSet<i32>,
}

impl UimfReader {
    /// Open a dataset read-only with the default cache bounds.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, UimfError> {
        Self::open_with_cache(path, SpectrumCacheConfig::default())
    }

    /// Open a dataset read-only with explicit spectrum-cache bounds.
    ///
    /// Accepts current-layout and legacy-only files. Fails with
    /// [`UimfError::InconsistentFrameTypes`] when the file mixes the two
    /// MS1 labels, and with [`UimfError::MissingTable`] when required
    /// tables are absent.
    pub fn open_with_cache<P: AsRef<Path>>(
        path: P,
        cache_config: SpectrumCacheConfig,
    ) -> Result<Self, UimfError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        if !schema::table_exists(&conn, "Frame_Scans")? {
            return Err(UimfError::MissingTable("Frame_Scans".to_string()));
        }
        schema::determine_ms1_label(&conn)?;

        let global = if schema::table_exists(&conn, "Global_Params")? {
            GlobalParams::from_entries(schema::read_global_entries(&conn)?)?
        } else if schema::table_exists(&conn, "Global_Parameters")? {
            GlobalParams::from_entries(schema::read_legacy_global_entries(&conn)?)?
        } else {
            return Err(UimfError::MissingTable("Global_Params".to_string()));
        };

        let has_frame_params = schema::table_exists(&conn, "Frame_Params")?;
        let key_types = schema::load_frame_key_types(&conn)?;
        let legacy_frames = if has_frame_params {
            None
        } else {
            let probed = LegacyFrameSchema::probe(&conn)?;
            if probed.is_none() {
                return Err(UimfError::MissingTable("Frame_Params".to_string()));
            }
            probed
        };

        Ok(Self {
            conn,
            global,
            key_types,
            legacy_frames,
            has_frame_params,
            frame_cache: HashMap::new(),
            frame_sets: None,
            spectrum_cache: SpectrumCache::new(cache_config),
            inferred_pressure_units: None,
            warned_unknown_params: HashSet::new(),
            warned_frames: HashSet::new(),
        })
    }

    /// The dataset-wide parameters, read once at open.
    pub fn get_global_params(&mut self) -> Result<&GlobalParams, UimfError> {
        Ok(&self.global)
    }

    /// Number of frames recorded in the global parameters.
    pub fn num_frames(&self) -> i32 {
        self.global.num_frames
    }

    /// One frame's parameters, cached after the first read.
    pub fn get_frame_params(&mut self, frame: i32) -> Result<&FrameParams, UimfError> {
        self.check_frame(frame)?;
        if !self.frame_cache.contains_key(&frame) {
            let params = self.load_frame_params(frame)?;
            self.frame_cache.insert(frame, params);
        }
        Ok(self
            .frame_cache
            .get(&frame)
            .expect("frame params cached above"))
    }

    /// Frame numbers of the given type, ascending.
    pub fn frame_numbers(&mut self, frame_type: FrameType) -> Result<Vec<i32>, UimfError> {
        Ok(self.frame_set(frame_type)?.to_vec())
    }

    /// True when the file carries the bin-centric secondary index.
    pub fn has_bin_centric_tables(&self) -> Result<bool, UimfError> {
        Ok(schema::has_bin_centric_tables(&self.conn)?)
    }

    // -----------------------------------------------------------------------
    // Scan listings
    // -----------------------------------------------------------------------

    /// Summaries of every scan stored for `frame`, in scan order.
    ///
    /// Drift times come from the frame's average TOF length; the
    /// normalized form uses the first non-zero of `PressureBack`,
    /// `RearIonFunnelPressure`, `IonFunnelTrapPressure`, converted from
    /// millitorr when the file declares (or its magnitudes imply) that
    /// unit.
    pub fn get_frame_scans(&mut self, frame: i32) -> Result<Vec<ScanInfo>, UimfError> {
        self.check_frame(frame)?;
        let params = self.get_frame_params(frame)?.clone();
        let average_tof_length = params.average_tof_length;
        let pressure_torr = self.drift_pressure_torr(&params)?;

        let mut stmt = self.conn.prepare(
            "SELECT scan_num, non_zero_count, bpi, bpi_mz, tic FROM Frame_Scans
             WHERE frame_num = ?1 ORDER BY scan_num",
        )?;
        let rows = stmt.query_map([frame], |row| {
            Ok((
                row.get::<_, i32>(0)?,
                row.get::<_, i32>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
            ))
        })?;

        let mut scans = Vec::new();
        for row in rows {
            let (scan, non_zero_count, bpi, bpi_mz, tic) = row?;
            if scan < 0 {
                return Err(UimfError::CorruptScan { frame, scan });
            }
            let drift_time_raw = average_tof_length * scan as f64 / 1e6;
            let drift_time = match pressure_torr {
                Some(torr) => drift_time_raw * (4.0 / torr),
                None => drift_time_raw,
            };
            scans.push(ScanInfo {
                scan,
                non_zero_count,
                bpi,
                bpi_mz,
                tic,
                drift_time,
                drift_time_raw,
            });
        }
        Ok(scans)
    }

    /// Decode a single stored scan to `(bin, intensity)` pairs.
    ///
    /// Unlike the aggregate queries this surfaces a malformed BLOB as
    /// [`UimfError::CorruptScan`] and a missing row as
    /// [`UimfError::ScanNotFound`].
    pub fn get_scan(&mut self, frame: i32, scan: i32) -> Result<Vec<(i32, i32)>, UimfError> {
        self.check_frame(frame)?;
        let blob: Option<Option<Vec<u8>>> = self
            .conn
            .query_row(
                "SELECT intensities FROM Frame_Scans
                 WHERE frame_num = ?1 AND scan_num = ?2",
                [frame, scan],
                |row| row.get(0),
            )
            .optional()?;
        let Some(blob) = blob else {
            return Err(UimfError::ScanNotFound { frame, scan });
        };
        if scan < 0 {
            return Err(UimfError::CorruptScan { frame, scan });
        }

        let pairs = decode_scan(blob.as_deref().unwrap_or(&[]))
            .map_err(|_| UimfError::CorruptScan { frame, scan })?;
        Ok(self.filter_bins(frame, pairs))
    }

    // -----------------------------------------------------------------------
    // Spectrum queries
    // -----------------------------------------------------------------------

    /// Sum intensities over a frame/scan window.
    ///
    /// Returns parallel `(mz, intensity)` vectors holding only non-zero
    /// bins, ascending in m/z. Bin to m/z conversion uses the calibration
    /// of the first requested frame of the requested type.
    pub fn get_spectrum(
        &mut self,
        frame_range: RangeInclusive<i32>,
        frame_type: FrameType,
        scan_range: RangeInclusive<i32>,
    ) -> Result<(Vec<f64>, Vec<i64>), UimfError> {
        self.spectrum_in_bin_window(frame_range, frame_type, scan_range, None)
    }

    /// [`get_spectrum`](Self::get_spectrum) restricted to a bin window.
    pub fn get_spectrum_in_bin_range(
        &mut self,
        frame_range: RangeInclusive<i32>,
        frame_type: FrameType,
        scan_range: RangeInclusive<i32>,
        bin_range: RangeInclusive<i32>,
    ) -> Result<(Vec<f64>, Vec<i64>), UimfError> {
        self.spectrum_in_bin_window(frame_range, frame_type, scan_range, Some(bin_range))
    }

    /// [`get_spectrum`](Self::get_spectrum) restricted to an m/z window.
    ///
    /// The window is inverted to bin bounds with the first requested
    /// frame's calibration.
    pub fn get_spectrum_in_mz_range(
        &mut self,
        frame_range: RangeInclusive<i32>,
        frame_type: FrameType,
        scan_range: RangeInclusive<i32>,
        mz_range: RangeInclusive<f64>,
    ) -> Result<(Vec<f64>, Vec<i64>), UimfError> {
        let calibrator = self.window_calibrator(&frame_range, frame_type)?;
        let bin_range = match calibrator {
            Some(cal) => match (cal.mz_to_bin(*mz_range.start()), cal.mz_to_bin(*mz_range.end())) {
                (Some(lo), Some(hi)) => {
                    let lo = (lo.floor() as i32).max(0);
                    let hi = (hi.ceil() as i32).min(self.global.bins + 1);
                    Some(lo..=hi)
                }
                _ => None,
            },
            None => None,
        };
        let Some(bin_range) = bin_range else {
            log::warn!("m/z window requested but the frame calibration is undefined");
            return Ok((Vec::new(), Vec::new()));
        };
        self.spectrum_in_bin_window(frame_range, frame_type, scan_range, Some(bin_range))
    }

    fn spectrum_in_bin_window(
        &mut self,
        frame_range: RangeInclusive<i32>,
        frame_type: FrameType,
        scan_range: RangeInclusive<i32>,
        bin_range: Option<RangeInclusive<i32>>,
    ) -> Result<(Vec<f64>, Vec<i64>), UimfError> {
        self.check_frame_range(&frame_range)?;
        let entry = self.spectrum_entry(&frame_range, frame_type)?;
        let sums = Self::sum_over_scans(&entry, &scan_range);

        let calibrator = self.window_calibrator(&frame_range, frame_type)?;
        let mut mzs = Vec::with_capacity(sums.len());
        let mut intensities = Vec::with_capacity(sums.len());
        for (bin, intensity) in sums {
            if intensity == 0 {
                continue;
            }
            if let Some(range) = &bin_range {
                if !range.contains(&bin) {
                    continue;
                }
            }
            let mz = calibrator
                .map(|cal| cal.bin_to_mz(bin as f64))
                .unwrap_or(0.0);
            mzs.push(mz);
            intensities.push(intensity);
        }
        Ok((mzs, intensities))
    }

    /// Dense `[frame][scan][bin]` intensity block for heat maps.
    ///
    /// Every frame of the inclusive range contributes a plane; frames of a
    /// different type stay zero.
    pub fn get_intensity_block(
        &mut self,
        frame_range: RangeInclusive<i32>,
        frame_type: FrameType,
        scan_range: RangeInclusive<i32>,
        bin_range: RangeInclusive<i32>,
    ) -> Result<Vec<Vec<Vec<i32>>>, UimfError> {
        self.check_frame_range(&frame_range)?;
        let scan_count = (*scan_range.end() - *scan_range.start() + 1).max(0) as usize;
        let bin_count = (*bin_range.end() - *bin_range.start() + 1).max(0) as usize;
        let matching: HashSet<i32> = self.frame_set(frame_type)?.iter().copied().collect();

        let mut block = Vec::new();
        for frame in frame_range {
            let mut plane = vec![vec![0i32; bin_count]; scan_count];
            if matching.contains(&frame) {
                for (scan, pairs) in self.decoded_scans(frame)? {
                    if !scan_range.contains(&scan) {
                        continue;
                    }
                    let scan_slot = (scan - *scan_range.start()) as usize;
                    for (bin, intensity) in pairs {
                        if bin_range.contains(&bin) {
                            let bin_slot = (bin - *bin_range.start()) as usize;
                            plane[scan_slot][bin_slot] += intensity;
                        }
                    }
                }
            }
            block.push(plane);
        }
        Ok(block)
    }

    // -----------------------------------------------------------------------
    // TIC / BPI
    // -----------------------------------------------------------------------

    /// Per-scan TIC values over the window, flattened in `(frame, scan)`
    /// order. Scan positions with no stored row report 0.
    pub fn get_tic(
        &mut self,
        frame_type: FrameType,
        frame_range: RangeInclusive<i32>,
        scan_range: RangeInclusive<i32>,
    ) -> Result<Vec<f64>, UimfError> {
        self.scan_column(frame_type, frame_range, scan_range, "tic")
    }

    /// Per-scan BPI values over the window, flattened in `(frame, scan)`
    /// order.
    pub fn get_bpi(
        &mut self,
        frame_type: FrameType,
        frame_range: RangeInclusive<i32>,
        scan_range: RangeInclusive<i32>,
    ) -> Result<Vec<f64>, UimfError> {
        self.scan_column(frame_type, frame_range, scan_range, "bpi")
    }

    /// Whole-frame TIC per frame of the given type.
    pub fn get_tic_by_frame(
        &mut self,
        frame_type: FrameType,
    ) -> Result<BTreeMap<i32, f64>, UimfError> {
        self.frame_aggregate(frame_type, "SUM(tic)")
    }

    /// Whole-frame BPI (maximum scan BPI) per frame of the given type.
    pub fn get_bpi_by_frame(
        &mut self,
        frame_type: FrameType,
    ) -> Result<BTreeMap<i32, f64>, UimfError> {
        self.frame_aggregate(frame_type, "MAX(bpi)")
    }

    // -----------------------------------------------------------------------
    // XIC
    // -----------------------------------------------------------------------

    /// Extracted-ion chromatogram at `target_mz` over the bin-centric
    /// index.
    ///
    /// Requires [`has_bin_centric_tables`](Self::has_bin_centric_tables);
    /// fails with [`UimfError::BinCentricMissing`] otherwise. `None`
    /// ranges mean the whole file.
    pub fn get_xic(
        &mut self,
        target_mz: f64,
        tolerance: f64,
        tolerance_kind: ToleranceKind,
        frame_range: Option<RangeInclusive<i32>>,
        scan_range: Option<RangeInclusive<i32>>,
        frame_type: FrameType,
    ) -> Result<Vec<XicPoint>, UimfError> {
        let frames = self.frame_set(frame_type)?.to_vec();
        let Some(&first) = frames.first() else {
            return Ok(Vec::new());
        };
        let params = self.get_frame_params(first)?.clone();
        let calibrator = MzCalibrator::new(&params, &self.global);

        let half_width = match tolerance_kind {
            ToleranceKind::Ppm => target_mz * tolerance / 1e6,
            ToleranceKind::Thomson => tolerance,
        };
        let bounds = (
            calibrator.mz_to_bin(target_mz - half_width),
            calibrator.mz_to_bin(target_mz + half_width),
        );
        let (Some(lower), Some(upper)) = bounds else {
            log::warn!("XIC requested but frame {first} has no defined calibration");
            return Ok(Vec::new());
        };
        let lower_bin = (lower.floor() as i32).max(0);
        let upper_bin = (upper.ceil() as i32).min(self.global.bins + 1);

        self.get_xic_in_bin_range(lower_bin..=upper_bin, frame_range, scan_range, frame_type)
    }

    /// Extracted-ion chromatogram over an explicit bin window.
    pub fn get_xic_in_bin_range(
        &mut self,
        bin_range: RangeInclusive<i32>,
        frame_range: Option<RangeInclusive<i32>>,
        scan_range: Option<RangeInclusive<i32>>,
        frame_type: FrameType,
    ) -> Result<Vec<XicPoint>, UimfError> {
        if !schema::has_bin_centric_tables(&self.conn)? {
            return Err(UimfError::BinCentricMissing);
        }

        let frames = self.frame_set(frame_type)?.to_vec();
        let frame_index: HashMap<i32, i32> = frames
            .iter()
            .enumerate()
            .map(|(index, &frame)| (frame, index as i32))
            .collect();
        let scans_per_frame = bin_centric::ims_scans_per_frame(&self.conn)?;

        let mut aggregated: BTreeMap<(i32, i32), i64> = BTreeMap::new();
        {
            let mut stmt = self
                .conn
                .prepare("SELECT intensities FROM Bin_Intensities WHERE mz_bin = ?1")?;
            for bin in bin_range {
                let blob: Option<Vec<u8>> = stmt
                    .query_row([bin], |row| row.get(0))
                    .optional()?;
                let Some(blob) = blob else { continue };
                for entry in decode_bin_blob(&blob, scans_per_frame)
                    .map_err(UimfError::Codec)?
                {
                    if !frame_index.contains_key(&entry.frame) {
                        continue;
                    }
                    if let Some(range) = &frame_range {
                        if !range.contains(&entry.frame) {
                            continue;
                        }
                    }
                    if let Some(range) = &scan_range {
                        if !range.contains(&entry.scan) {
                            continue;
                        }
                    }
                    *aggregated.entry((entry.frame, entry.scan)).or_insert(0) +=
                        entry.intensity as i64;
                }
            }
        }

        Ok(aggregated
            .into_iter()
            .map(|((frame, scan), intensity)| XicPoint {
                frame_index: frame_index[&frame],
                frame,
                scan,
                intensity,
            })
            .collect())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn check_frame(&self, frame: i32) -> Result<(), UimfError> {
        if frame < 1 || frame > self.global.num_frames {
            return Err(UimfError::FrameOutOfRange {
                frame,
                num_frames: self.global.num_frames,
            });
        }
        Ok(())
    }

    fn check_frame_range(&self, range: &RangeInclusive<i32>) -> Result<(), UimfError> {
        self.check_frame(*range.start())?;
        self.check_frame(*range.end())
    }

    fn load_frame_params(&mut self, frame: i32) -> Result<FrameParams, UimfError> {
        let entries = if self.has_frame_params {
            schema::read_frame_entries(&self.conn, frame, &self.key_types)?
        } else {
            Vec::new()
        };
        let entries = if entries.is_empty() {
            match &self.legacy_frames {
                Some(legacy) => legacy
                    .read_frame(&self.conn, frame, &self.global.date_started)?
                    .unwrap_or_default(),
                None => Vec::new(),
            }
        } else {
            entries
        };
        if entries.is_empty() {
            return Err(UimfError::FrameOutOfRange {
                frame,
                num_frames: self.global.num_frames,
            });
        }

        let params = FrameParams::from_entries(entries)?;
        for &id in params.extra.keys() {
            if FrameParamKey::from_id(id).is_none() && self.warned_unknown_params.insert(id) {
                log::warn!("unknown frame parameter id {id}; value preserved untyped");
            }
        }
        Ok(params)
    }

    fn frame_set(&mut self, frame_type: FrameType) -> Result<&[i32], UimfError> {
        if self.frame_sets.is_none() {
            let mut sets: HashMap<FrameType, Vec<i32>> = HashMap::new();

            let rows: Vec<(i32, i32)> = if self.has_frame_params {
                let mut stmt = self.conn.prepare(
                    "SELECT frame_num, param_value FROM Frame_Params
                     WHERE param_id = ?1 ORDER BY frame_num",
                )?;
                let mapped = stmt.query_map([FrameParamKey::FrameType.id()], |row| {
                    Ok((row.get::<_, i32>(0)?, row.get::<_, String>(1)?))
                })?;
                let mut rows = Vec::new();
                for row in mapped {
                    let (frame, text) = row?;
                    if let Ok(stored) = text.trim().parse::<i32>() {
                        rows.push((frame, stored));
                    }
                }
                rows
            } else {
                let mut stmt = self
                    .conn
                    .prepare("SELECT FrameNum, FrameType FROM Frame_Parameters ORDER BY FrameNum")?;
                let mapped = stmt.query_map([], |row| {
                    Ok((row.get::<_, i32>(0)?, row.get::<_, i64>(1)? as i32))
                })?;
                let mut rows = Vec::new();
                for row in mapped {
                    rows.push(row?);
                }
                rows
            };

            for (frame, stored) in rows {
                match FrameType::from_stored(stored) {
                    Ok(kind) => sets.entry(kind).or_default().push(frame),
                    Err(_) => log::warn!("frame {frame} has undefined frame type {stored}"),
                }
            }
            self.frame_sets = Some(sets);
        }

        Ok(self
            .frame_sets
            .as_ref()
            .and_then(|sets| sets.get(&frame_type))
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    /// Calibrator of the first frame of `frame_type` inside `frame_range`.
    fn window_calibrator(
        &mut self,
        frame_range: &RangeInclusive<i32>,
        frame_type: FrameType,
    ) -> Result<Option<MzCalibrator>, UimfError> {
        let first = self
            .frame_set(frame_type)?
            .iter()
            .copied()
            .find(|frame| frame_range.contains(frame));
        let Some(frame) = first else {
            return Ok(None);
        };
        let params = self.get_frame_params(frame)?.clone();
        let calibrator = MzCalibrator::new(&params, &self.global);
        Ok(calibrator.is_defined().then_some(calibrator))
    }

    /// Decode every scan of one frame, skipping corrupt rows with one
    /// warning per frame.
    fn decoded_scans(&mut self, frame: i32) -> Result<Vec<(i32, Vec<(i32, i32)>)>, UimfError> {
        let raw: Vec<(i32, Option<Vec<u8>>)> = {
            let mut stmt = self.conn.prepare(
                "SELECT scan_num, intensities FROM Frame_Scans
                 WHERE frame_num = ?1 ORDER BY scan_num",
            )?;
            let mapped = stmt.query_map([frame], |row| {
                Ok((row.get::<_, i32>(0)?, row.get::<_, Option<Vec<u8>>>(1)?))
            })?;
            let mut rows = Vec::new();
            for row in mapped {
                rows.push(row?);
            }
            rows
        };

        let mut scans = Vec::with_capacity(raw.len());
        for (scan, blob) in raw {
            if scan < 0 {
                return Err(UimfError::CorruptScan { frame, scan });
            }
            match decode_scan(blob.as_deref().unwrap_or(&[])) {
                Ok(pairs) => scans.push((scan, self.filter_bins(frame, pairs))),
                Err(err) => {
                    if self.warned_frames.insert(frame) {
                        log::warn!("frame {frame} scan {scan}: skipping corrupt scan ({err})");
                    }
                }
            }
        }
        Ok(scans)
    }

    /// Drop decoded bins beyond the dataset's bin count, warning once per
    /// frame. Old acquisition software occasionally wrote one bin past the
    /// end.
    fn filter_bins(&mut self, frame: i32, pairs: Vec<(i32, i32)>) -> Vec<(i32, i32)> {
        let limit = self.global.bins + 1;
        let mut kept = Vec::with_capacity(pairs.len());
        for (bin, intensity) in pairs {
            if bin < 0 || bin > limit {
                if self.warned_frames.insert(frame) {
                    log::warn!(
                        "frame {frame}: decoded bin {bin} outside 0..={limit}; skipping sample"
                    );
                }
                continue;
            }
            kept.push((bin, intensity));
        }
        kept
    }

    fn spectrum_entry(
        &mut self,
        frame_range: &RangeInclusive<i32>,
        frame_type: FrameType,
    ) -> Result<Rc<CacheEntry>, UimfError> {
        let key = CacheKey {
            start_frame: *frame_range.start(),
            end_frame: *frame_range.end(),
            frame_type,
        };
        if let Some(entry) = self.spectrum_cache.get(key) {
            return Ok(entry);
        }

        let frames: Vec<i32> = self
            .frame_set(frame_type)?
            .iter()
            .copied()
            .filter(|frame| frame_range.contains(frame))
            .collect();

        let mut entry = CacheEntry::default();
        for frame in frames {
            for (scan, pairs) in self.decoded_scans(frame)? {
                let scan_bins = entry.per_scan.entry(scan).or_default();
                for (bin, intensity) in pairs {
                    *scan_bins.entry(bin).or_insert(0) += intensity as i64;
                    *entry.summed.entry(bin).or_insert(0) += intensity as i64;
                }
            }
        }
        Ok(self.spectrum_cache.insert(key, entry))
    }

    fn sum_over_scans(
        entry: &CacheEntry,
        scan_range: &RangeInclusive<i32>,
    ) -> BTreeMap<i32, i64> {
        let covers_all = entry
            .per_scan
            .keys()
            .all(|scan| scan_range.contains(scan));
        if covers_all {
            return entry.summed.clone();
        }

        let mut sums = BTreeMap::new();
        for (_, bins) in entry.per_scan.range(scan_range.clone()) {
            for (&bin, &intensity) in bins {
                *sums.entry(bin).or_insert(0) += intensity;
            }
        }
        sums
    }

    fn scan_column(
        &mut self,
        frame_type: FrameType,
        frame_range: RangeInclusive<i32>,
        scan_range: RangeInclusive<i32>,
        column: &str,
    ) -> Result<Vec<f64>, UimfError> {
        self.check_frame_range(&frame_range)?;
        let frames: Vec<i32> = self
            .frame_set(frame_type)?
            .iter()
            .copied()
            .filter(|frame| frame_range.contains(frame))
            .collect();

        let scan_count = (*scan_range.end() - *scan_range.start() + 1).max(0) as usize;
        let mut values = Vec::with_capacity(frames.len() * scan_count);
        let sql = format!(
            "SELECT scan_num, {column} FROM Frame_Scans
             WHERE frame_num = ?1 AND scan_num BETWEEN ?2 AND ?3
             ORDER BY scan_num"
        );

        for frame in frames {
            let mut per_scan: HashMap<i32, f64> = HashMap::new();
            {
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(
                    [frame, *scan_range.start(), *scan_range.end()],
                    |row| Ok((row.get::<_, i32>(0)?, row.get::<_, f64>(1)?)),
                )?;
                for row in rows {
                    let (scan, value) = row?;
                    per_scan.insert(scan, value);
                }
            }
            for scan in scan_range.clone() {
                values.push(per_scan.get(&scan).copied().unwrap_or(0.0));
            }
        }
        Ok(values)
    }

    fn frame_aggregate(
        &mut self,
        frame_type: FrameType,
        aggregate: &str,
    ) -> Result<BTreeMap<i32, f64>, UimfError> {
        let frames: HashSet<i32> = self.frame_set(frame_type)?.iter().copied().collect();
        let sql = format!(
            "SELECT frame_num, {aggregate} FROM Frame_Scans GROUP BY frame_num ORDER BY frame_num"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i32>(0)?, row.get::<_, Option<f64>>(1)?))
        })?;

        let mut result = BTreeMap::new();
        for row in rows {
            let (frame, value) = row?;
            if frames.contains(&frame) {
                result.insert(frame, value.unwrap_or(0.0));
            }
        }
        Ok(result)
    }

    /// Drift pressure in torr for one frame, if any pressure is recorded.
    fn drift_pressure_torr(&mut self, params: &FrameParams) -> Result<Option<f64>, UimfError> {
        let raw = [
            params.pressure_back,
            params.rear_ion_funnel_pressure,
            params.ion_funnel_trap_pressure,
        ]
        .into_iter()
        .find(|&p| p != 0.0);
        let Some(raw) = raw else {
            return Ok(None);
        };

        let units = match params.pressure_units {
            Some(units) => units,
            None => self.infer_pressure_units()?,
        };
        Ok(Some(match units {
            PressureUnits::Torr => raw,
            PressureUnits::MilliTorr => raw / 1000.0,
        }))
    }

    /// Infer the pressure unit from the first non-zero samples when no
    /// frame declares one.
    fn infer_pressure_units(&mut self) -> Result<PressureUnits, UimfError> {
        if let Some(units) = self.inferred_pressure_units {
            return Ok(units);
        }

        let mut samples = Vec::new();
        for frame in 1..=self.global.num_frames {
            let (declared, pressure) = {
                let Ok(params) = self.get_frame_params(frame) else {
                    continue;
                };
                let pressure = [
                    params.pressure_back,
                    params.rear_ion_funnel_pressure,
                    params.ion_funnel_trap_pressure,
                ]
                .into_iter()
                .find(|&p| p != 0.0);
                (params.pressure_units, pressure)
            };
            if let Some(declared) = declared {
                self.inferred_pressure_units = Some(declared);
                return Ok(declared);
            }
            if let Some(pressure) = pressure {
                samples.push(pressure);
            }
            if samples.len() >= PRESSURE_INFERENCE_SAMPLES {
                break;
            }
        }

        let units = if !samples.is_empty()
            && samples.iter().sum::<f64>() / samples.len() as f64 > MILLITORR_INFERENCE_THRESHOLD
        {
            PressureUnits::MilliTorr
        } else {
            PressureUnits::Torr
        };
        self.inferred_pressure_units = Some(units);
        Ok(units)
    }
}
