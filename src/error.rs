use crate::codec::CodecError;
use crate::params::ParamError;

/// Errors surfaced by readers, writers, and the bin-centric builder
#[derive(Debug, thiserror::Error)]
pub enum UimfError {
    /// Underlying SQLite I/O, schema, or transaction error
    #[error("storage fault: {0}")]
    Storage(#[from] rusqlite::Error),

    /// I/O error outside the database (sidecar files, working directories)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Intensity codec error
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Parameter model error
    #[error("parameter error: {0}")]
    Param(#[from] ParamError),

    /// A scan BLOB failed to decompress or decoded to out-of-range bins
    #[error("corrupt scan: frame {frame}, scan {scan}")]
    CorruptScan {
        /// Frame number of the offending scan
        frame: i32,
        /// Scan number of the offending scan
        scan: i32,
    },

    /// Requested frame lies outside `[1, num_frames]`
    #[error("frame {frame} out of range [1, {num_frames}]")]
    FrameOutOfRange {
        /// The requested frame number
        frame: i32,
        /// The number of frames recorded in the global parameters
        num_frames: i32,
    },

    /// Requested scan does not exist in the requested frame
    #[error("scan {scan} not found in frame {frame}")]
    ScanNotFound {
        /// Frame number searched
        frame: i32,
        /// Scan number requested
        scan: i32,
    },

    /// The file mixes frame_type 0 and 1 for MS1 frames
    #[error("file stores MS1 frames as both frame_type 0 and 1")]
    InconsistentFrameTypes,

    /// An XIC was requested but the file has no Bin_Intensities table
    #[error("bin-centric tables missing; run add_bin_centric_tables first")]
    BinCentricMissing,

    /// The file is missing required tables and cannot be opened
    #[error("not a UIMF file: missing table {0}")]
    MissingTable(String),
}
