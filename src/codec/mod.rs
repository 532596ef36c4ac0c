//! # Intensity Codec
//!
//! Encoding pipeline for the per-scan intensity BLOBs stored in
//! `Frame_Scans`:
//!
//! 1. Run-length zero encode the sparse intensity vector into a signed
//!    32-bit stream: negative words are zero-run skips, positive words are
//!    intensities.
//! 2. Pack the stream little-endian into bytes.
//! 3. Compress the bytes with the LZF variant whose bit-exact output is
//!    part of the file format ([`lzf`]).
//!
//! Decoding inverts the pipeline. Round-trip identity is the central
//! correctness property: decoding an encoded vector yields exactly its
//! non-zero `(bin, intensity)` pairs in ascending bin order.
//!
//! TIC, BPI, the BPI bin, and the non-zero count are computed as a side
//! effect of encoding so the writer never walks a scan twice.
//!
//! The codec is pure and reentrant; it holds no reference to any file.

pub mod lzf;
mod rlz;

#[cfg(test)]
mod tests;

pub use rlz::{decode_scan, encode_scan, encode_scan_sparse, ScanTotals};

/// Errors from the intensity codec
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Writer input contained a negative intensity
    #[error("negative intensity {value} at bin {bin}")]
    InvalidIntensity {
        /// Bin index of the offending value
        bin: i32,
        /// The negative intensity encountered
        value: i32,
    },

    /// Compressed stream ended mid-token or the length prefix disagrees
    /// with the decompressed payload
    #[error("compressed stream truncated")]
    Truncated,

    /// A back-reference pointed before the start of the output
    #[error("back-reference offset {offset} exceeds {produced} bytes produced")]
    BadBackReference {
        /// Offset encoded in the back-reference
        offset: usize,
        /// Bytes of output produced when the reference was read
        produced: usize,
    },

    /// Decompressed payload is not a whole number of 32-bit words
    #[error("decoded payload length {0} is not a multiple of 4")]
    MisalignedPayload(usize),
}
