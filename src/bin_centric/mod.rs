//! # Bin-Centric Builder
//!
//! Transposes the frame/scan-centric `Frame_Scans` data into
//! `Bin_Intensities`: one BLOB per TOF bin indexing every non-zero
//! occurrence of that bin across the dataset. The transposed index lets
//! extracted-ion chromatograms touch only the handful of bins inside the
//! m/z window instead of every scan in the file.
//!
//! ## Protocol
//!
//! Three phases, weighted 37 / 30 / 33 in the progress reports:
//!
//! 1. **Spray**: every scan is decoded once and its `(bin, frame, scan,
//!    intensity)` tuples appended to a sidecar database partitioned into
//!    groups of 200 adjacent bins. SQLite's random-write locality is poor;
//!    the partitions turn the transpose into sequential appends.
//! 2. **Index**: each partition gets a `(bin, frame, scan)` index.
//! 3. **Transpose**: each bin's rows are read in `(frame, scan)` order,
//!    run-length zero encoded over the linear address
//!    `frame * ims_scans_per_frame + scan`, and written to
//!    `Bin_Intensities`. These BLOBs carry no secondary compression.
//!
//! The sidecar is deleted on success; a failed deletion is logged and
//! non-fatal. Readers never observe the sidecar or the partition size.

use std::collections::HashSet;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use rusqlite::Connection;

use crate::codec::{decode_scan, CodecError};
use crate::error::UimfError;
use crate::events::EventSink;
use crate::params::{FrameParamKey, GlobalParams};
use crate::schema;


/// Bins per partition table in the sidecar store. A tuning parameter, not
/// a format constant.
const PARTITION_SIZE: i32 = 200;

const SPRAY_WEIGHT: f64 = 37.0;
const INDEX_WEIGHT: f64 = 30.0;
const TRANSPOSE_WEIGHT: f64 = 33.0;

/// One decoded occurrence in a bin-centric BLOB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinEntry {
    /// Frame number (1-based, as stored)
    pub frame: i32,
    /// IMS scan number within the frame
    pub scan: i32,
    /// Summed intensity at this bin for that scan
    pub intensity: i32,
}

/// Builder for the bin-centric secondary index
pub struct BinCentricBuilder<'a> {
    global: &'a GlobalParams,
}

impl<'a> BinCentricBuilder<'a> {
    /// A builder for a dataset with the given global parameters.
    pub fn new(global: &'a GlobalParams) -> Self {
        Self { global }
    }

    /// Build `Bin_Intensities` over everything currently in `Frame_Scans`.
    ///
    /// Any existing bin-centric table is replaced. The sidecar partition
    /// store lives in `working_dir` (system temp directory when `None`).
    pub fn build(
        &self,
        conn: &Connection,
        working_dir: Option<&Path>,
        sink: &dyn EventSink,
    ) -> Result<(), UimfError> {
        let scans_per_frame = ims_scans_per_frame(conn)?;

        let default_dir = std::env::temp_dir();
        let dir = working_dir.unwrap_or(default_dir.as_path());
        let temp = tempfile::Builder::new()
            .prefix("uimf_bin_centric_")
            .suffix(".sqlite")
            .tempfile_in(dir)?;
        let sidecar = Connection::open(temp.path())?;
        // Scratch store; contents never outlive the build.
        sidecar.pragma_update(None, "journal_mode", "OFF")?;
        sidecar.pragma_update(None, "synchronous", "OFF")?;

        sink.message("building bin-centric tables");
        let partitions = self.spray(conn, &sidecar, sink)?;
        self.index_partitions(&sidecar, &partitions, sink)?;
        self.transpose(conn, &sidecar, &partitions, scans_per_frame, sink)?;

        drop(sidecar);
        if let Err(err) = temp.close() {
            log::warn!("could not remove bin-centric working file: {err}");
        }
        sink.progress(100.0, "bin-centric tables complete");
        Ok(())
    }

    /// Phase 1: decode every scan once, appending tuples to partition
    /// tables inside a single sidecar transaction.
    fn spray(
        &self,
        conn: &Connection,
        sidecar: &Connection,
        sink: &dyn EventSink,
    ) -> Result<HashSet<i32>, UimfError> {
        let total_scans: i64 =
            conn.query_row("SELECT COUNT(*) FROM Frame_Scans", [], |row| row.get(0))?;

        let mut partitions = HashSet::new();
        let mut warned_frames = HashSet::new();
        let mut done = 0i64;

        sidecar.execute_batch("BEGIN")?;
        {
            let mut stmt = conn.prepare(
                "SELECT frame_num, scan_num, intensities FROM Frame_Scans
                 ORDER BY frame_num, scan_num",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i32>(0)?,
                    row.get::<_, i32>(1)?,
                    row.get::<_, Option<Vec<u8>>>(2)?,
                ))
            })?;

            for row in rows {
                let (frame, scan, blob) = row?;
                let pairs = match decode_scan(blob.as_deref().unwrap_or(&[])) {
                    Ok(pairs) => pairs,
                    Err(err) => {
                        if warned_frames.insert(frame) {
                            log::warn!("frame {frame} scan {scan}: skipping corrupt scan ({err})");
                            sink.error("corrupt-scan", &format!("frame {frame}, scan {scan}"));
                        }
                        continue;
                    }
                };

                for (bin, intensity) in pairs {
                    if bin < 0 || bin > self.global.bins + 1 {
                        if warned_frames.insert(frame) {
                            log::warn!(
                                "frame {frame} scan {scan}: bin {bin} outside 0..={} bins; skipping",
                                self.global.bins
                            );
                        }
                        continue;
                    }
                    let partition = (bin / PARTITION_SIZE) * PARTITION_SIZE;
                    if partitions.insert(partition) {
                        sidecar.execute_batch(&format!(
                            "CREATE TABLE Partition_{partition} (
                                 mz_bin INTEGER NOT NULL,
                                 frame_num INTEGER NOT NULL,
                                 scan_num INTEGER NOT NULL,
                                 intensity INTEGER NOT NULL)"
                        ))?;
                    }
                    let mut insert = sidecar.prepare_cached(&format!(
                        "INSERT INTO Partition_{partition} VALUES (?1, ?2, ?3, ?4)"
                    ))?;
                    insert.execute(rusqlite::params![bin, frame, scan, intensity])?;
                }

                done += 1;
                if total_scans > 0 && done % 64 == 0 {
                    sink.progress(
                        SPRAY_WEIGHT * done as f64 / total_scans as f64,
                        "spraying intensities into partitions",
                    );
                }
            }
        }
        sidecar.execute_batch("COMMIT")?;
        sink.progress(SPRAY_WEIGHT, "spraying intensities into partitions");
        Ok(partitions)
    }

    /// Phase 2: index each partition on `(bin, frame, scan)`.
    fn index_partitions(
        &self,
        sidecar: &Connection,
        partitions: &HashSet<i32>,
        sink: &dyn EventSink,
    ) -> Result<(), UimfError> {
        let mut ordered: Vec<i32> = partitions.iter().copied().collect();
        ordered.sort_unstable();

        for (done, partition) in ordered.iter().enumerate() {
            sidecar.execute_batch(&format!(
                "CREATE INDEX ix_Partition_{partition}
                     ON Partition_{partition} (mz_bin, frame_num, scan_num)"
            ))?;
            sink.progress(
                SPRAY_WEIGHT + INDEX_WEIGHT * (done + 1) as f64 / ordered.len() as f64,
                "indexing partitions",
            );
        }
        if ordered.is_empty() {
            sink.progress(SPRAY_WEIGHT + INDEX_WEIGHT, "indexing partitions");
        }
        Ok(())
    }

    /// Phase 3: per-bin transpose into `Bin_Intensities`.
    fn transpose(
        &self,
        conn: &Connection,
        sidecar: &Connection,
        partitions: &HashSet<i32>,
        scans_per_frame: i32,
        sink: &dyn EventSink,
    ) -> Result<(), UimfError> {
        conn.execute_batch(
            "DROP TABLE IF EXISTS Bin_Intensities;
             CREATE TABLE Bin_Intensities (
                 mz_bin INTEGER NOT NULL,
                 intensities BLOB NOT NULL);
             BEGIN",
        )?;

        let bin_count = self.global.bins;
        let mut insert =
            conn.prepare("INSERT INTO Bin_Intensities (mz_bin, intensities) VALUES (?1, ?2)")?;

        for bin in 0..=bin_count {
            let partition = (bin / PARTITION_SIZE) * PARTITION_SIZE;
            if !partitions.contains(&partition) {
                continue;
            }

            let mut select = sidecar.prepare_cached(&format!(
                "SELECT frame_num, scan_num, intensity FROM Partition_{partition}
                 WHERE mz_bin = ?1 ORDER BY frame_num, scan_num"
            ))?;
            let rows = select.query_map([bin], |row| {
                Ok(BinEntry {
                    frame: row.get(0)?,
                    scan: row.get(1)?,
                    intensity: row.get(2)?,
                })
            })?;

            let mut entries = Vec::new();
            for entry in rows {
                entries.push(entry?);
            }
            if entries.is_empty() {
                continue;
            }

            insert.execute(rusqlite::params![
                bin,
                encode_bin_entries(&entries, scans_per_frame)
            ])?;

            if bin % 256 == 0 {
                sink.progress(
                    SPRAY_WEIGHT
                        + INDEX_WEIGHT
                        + TRANSPOSE_WEIGHT * (bin + 1) as f64 / (bin_count + 1) as f64,
                    "writing bin-centric records",
                );
            }
        }
        drop(insert);

        conn.execute_batch(
            "COMMIT;
             CREATE UNIQUE INDEX IF NOT EXISTS ix_BinIntensities
                 ON Bin_Intensities (mz_bin)",
        )?;
        Ok(())
    }
}

/// Linear address span of one frame, shared by the builder and the XIC
/// decoder: the maximum per-frame scan count recorded in the file.
pub(crate) fn ims_scans_per_frame(conn: &Connection) -> Result<i32, UimfError> {
    let from_params: Option<i32> = conn
        .query_row(
            "SELECT MAX(CAST(param_value AS INTEGER)) FROM Frame_Params WHERE param_id = ?1",
            [FrameParamKey::Scans.id()],
            |row| row.get(0),
        )
        .unwrap_or(None);
    if let Some(scans) = from_params {
        return Ok(scans.max(1));
    }

    if schema::table_exists(conn, "Frame_Parameters")? {
        let from_legacy: Option<i32> = conn
            .query_row("SELECT MAX(Scans) FROM Frame_Parameters", [], |row| row.get(0))
            .unwrap_or(None);
        if let Some(scans) = from_legacy {
            return Ok(scans.max(1));
        }
    }
    Ok(1)
}

/// Encode one bin's occurrences over the linear frame/scan address space.
///
/// `previous_address` starts at 0; the skip `-(address - previous - 1)` is
/// emitted only when positive, then the intensity. Little-endian int32, no
/// byte compression.
pub fn encode_bin_entries(entries: &[BinEntry], scans_per_frame: i32) -> Vec<u8> {
    let mut words = Vec::with_capacity(entries.len() * 2);
    let mut previous = 0i64;
    for entry in entries {
        let address = entry.frame as i64 * scans_per_frame as i64 + entry.scan as i64;
        let skip = address - previous - 1;
        if skip > 0 {
            words.push(-(skip as i32));
        }
        words.push(entry.intensity);
        previous = address;
    }
    let mut bytes = vec![0u8; words.len() * 4];
    LittleEndian::write_i32_into(&words, &mut bytes);
    bytes
}

/// Decode a bin-centric BLOB back to its occurrences.
///
/// The cursor is incremented before each stored intensity, and the linear
/// address decomposes as `frame = cursor / scans_per_frame`,
/// `scan = cursor % scans_per_frame`.
pub fn decode_bin_blob(blob: &[u8], scans_per_frame: i32) -> Result<Vec<BinEntry>, CodecError> {
    if blob.len() % 4 != 0 {
        return Err(CodecError::MisalignedPayload(blob.len()));
    }
    let mut entries = Vec::with_capacity(blob.len() / 8);
    let mut cursor = 0i64;
    let span = scans_per_frame.max(1) as i64;

    for word in blob.chunks_exact(4) {
        let value = LittleEndian::read_i32(word);
        if value < 0 {
            cursor += (-value) as i64;
        } else if value > 0 {
            cursor += 1;
            entries.push(BinEntry {
                frame: (cursor / span) as i32,
                scan: (cursor % span) as i32,
                intensity: value,
            });
        }
    }
    Ok(entries)
}
