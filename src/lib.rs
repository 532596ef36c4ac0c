//! # uimf - Unified Ion Mobility File Library
//!
//! `uimf` reads and writes UIMF datasets: a SQLite-backed container format
//! for ion-mobility time-of-flight mass spectrometry. Intensity data is
//! organized by LC frame and IMS scan, alongside per-frame and global
//! acquisition metadata.
//!
//! ## Key Features
//!
//! - **Single-File Datasets**: Everything lives in one SQLite database, so
//!   files are portable and inspectable with ordinary SQLite tooling.
//!
//! - **Compact Intensity Storage**: Per-scan sparse intensity vectors are
//!   run-length zero encoded and byte-compressed; decoding reproduces the
//!   input exactly.
//!
//! - **Typed Extensible Metadata**: Frame and global acquisition parameters
//!   are stored as a key/value layer with stable numeric ids and attached
//!   scalar types, with a migration path from the legacy wide-table layout.
//!
//! - **Fast Chromatogram Queries**: An optional bin-centric secondary index
//!   answers extracted-ion chromatograms without scanning the whole
//!   frame/scan-centric table.
//!
//! ## Quick Start - Writing
//!
//! ```rust,no_run
//! use uimf::params::{FrameParams, FrameType, GlobalParams};
//! use uimf::writer::UimfWriter;
//!
//! let mut global = GlobalParams::new();
//! global.bins = 148_000;
//! global.bin_width_ns = 0.25;
//! global.num_frames = 1;
//!
//! let mut writer = UimfWriter::create("run.uimf", &global)?;
//!
//! let mut frame = FrameParams::new(FrameType::Ms1);
//! frame.scans = 360;
//! frame.calibration_slope = 0.35;
//! frame.calibration_intercept = 0.03;
//! writer.insert_frame(1, &frame)?;
//!
//! let mut intensities = vec![0; 148_000];
//! intensities[62_500] = 120;
//! writer.insert_scan(1, 0, &intensities)?;
//!
//! writer.commit()?;
//! # Ok::<(), uimf::UimfError>(())
//! ```
//!
//! ## Quick Start - Reading
//!
//! ```rust,no_run
//! use uimf::params::FrameType;
//! use uimf::reader::UimfReader;
//!
//! let mut reader = UimfReader::open("run.uimf")?;
//!
//! let global = reader.get_global_params()?.clone();
//! println!("{} frames of {} bins", global.num_frames, global.bins);
//!
//! let (mzs, intensities) =
//!     reader.get_spectrum(1..=1, FrameType::Ms1, 0..=359)?;
//! println!("{} non-zero channels", mzs.len());
//! # Ok::<(), uimf::UimfError>(())
//! ```
//!
//! ## Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`codec`]: run-length zero encoding and the byte-level compressor used
//!   for the per-scan intensity BLOBs
//! - [`params`]: typed frame/global parameter model with the legacy-table
//!   adapter
//! - [`schema`]: table and index creation, schema versioning, migration
//! - [`writer`]: transactional dataset writer
//! - [`reader`]: spectrum / chromatogram / heat-map query engine
//! - [`bin_centric`]: builder for the transposed bin-centric index
//! - [`events`]: caller-supplied progress and warning sinks
//!
//! ## Concurrency
//!
//! A handle must be driven from one thread at a time. Multiple readers may
//! share a file; writers are exclusive. Concurrent writers to a single file
//! are undefined behavior and the library relies on SQLite's single-writer
//! locking to reject them.

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
// Allow some patterns common in scientific code
#![allow(clippy::too_many_arguments)]

pub mod bin_centric;
pub mod calibration;
pub mod codec;
mod error;
pub mod events;
pub mod params;
pub mod reader;
pub mod schema;
pub mod writer;

pub use error::UimfError;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::bin_centric::BinCentricBuilder;
    pub use crate::calibration::MzCalibrator;
    pub use crate::codec::{decode_scan, encode_scan, encode_scan_sparse, CodecError, ScanTotals};
    pub use crate::error::UimfError;
    pub use crate::events::{ConsoleSink, EventSink, NullSink};
    pub use crate::params::{
        FrameParamKey, FrameParams, FrameType, GlobalParamKey, GlobalParams, ParamDataType,
        ParamError, ParamValue, PressureUnits,
    };
    pub use crate::reader::{ScanInfo, SpectrumCacheConfig, ToleranceKind, UimfReader, XicPoint};
    pub use crate::writer::UimfWriter;
}
